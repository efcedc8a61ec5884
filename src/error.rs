use crate::response::ScrobbleStatus;
use thiserror::Error;

/// Error types for scrobble submission.
///
/// Only conditions that stop a submission before it reaches Last.fm, or
/// programmer errors, are reported through this enum. A submission that was
/// sent but rejected (network failure, bad session, remote validation) comes
/// back as a non-successful [`ScrobbleResponse`](crate::ScrobbleResponse)
/// instead, so the caller can decide whether to retry through the cache.
///
/// # Error Handling Examples
///
/// ```rust,no_run
/// use lastfm_scrobble::{CachingScrobbler, QuotaScrobbler, Scrobble, ScrobbleError, Scrobbler};
///
/// async fn submit<D: Scrobbler, C: CachingScrobbler>(gate: &QuotaScrobbler<D, C>, scrobble: Scrobble) {
///     match gate.scrobble(scrobble, false).await {
///         Ok(response) if response.success() => println!("Scrobbled"),
///         Ok(response) => eprintln!("Last.fm rejected the scrobble: {:?}", response.status),
///         Err(ScrobbleError::QuotaExceeded { recent, max }) => {
///             eprintln!("Daily limit reached ({recent}/{max})");
///         }
///         Err(e) => eprintln!("Other error: {e}"),
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum ScrobbleError {
    /// A scrobble was constructed with invalid data.
    ///
    /// Raised at construction time (empty artist or track name), so an invalid
    /// scrobble never reaches a submitter.
    #[error("Invalid scrobble: {0}")]
    Validation(String),

    /// Submitting the batch would exceed the daily scrobble cap.
    ///
    /// Raised before any network call is made. Carries the number of scrobbles
    /// already submitted in the trailing window and the cap itself.
    #[error("Daily scrobble limit reached: {recent} of {max} scrobbles submitted in the last 24 hours")]
    QuotaExceeded {
        /// Scrobbles submitted in the trailing window
        recent: usize,
        /// Configured daily cap
        max: usize,
    },

    /// A submission was sent but not accepted.
    ///
    /// Submitters never return this themselves; it is produced by
    /// [`ScrobbleResponse::into_result`](crate::ScrobbleResponse::into_result).
    #[error("Scrobble submission failed ({status:?}): {message}")]
    SubmissionFailed {
        /// Status reported by the submitter
        status: ScrobbleStatus,
        /// Reason reported by the submitter
        message: String,
    },

    /// No authenticated session is available.
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    /// HTTP/network related errors.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication failures.
    ///
    /// Returned by [`LastFmScrobbler::authenticate`](crate::LastFmScrobbler::authenticate)
    /// when Last.fm refuses the credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Failed to parse Last.fm's response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Rate limiting from Last.fm.
    ///
    /// The `retry_after` field indicates how many seconds to wait before
    /// the next request attempt.
    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimit {
        /// Number of seconds to wait before retrying
        retry_after: u64,
    },

    /// The local scrobble cache could not be read or written.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
