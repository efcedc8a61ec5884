use crate::{Result, Scrobble, ScrobbleResponse};
use async_trait::async_trait;

/// A service that records scrobbles remotely.
///
/// Implementations report remote failures (network errors, rejected
/// sessions, rate limits) as a non-successful [`ScrobbleResponse`], and only
/// return `Err` for conditions that make the call itself invalid.
///
/// # Mocking Support
///
/// When the `mock` feature is enabled, this crate provides `MockScrobbler`
/// that implements this trait using the `mockall` library.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait(?Send)]
pub trait Scrobbler {
    /// Whether a usable session is established.
    fn is_authenticated(&self) -> bool;

    /// Submit a batch of scrobbles.
    async fn scrobble(&self, scrobbles: &[Scrobble]) -> Result<ScrobbleResponse>;
}

/// A scrobbler that keeps failed batches in a local cache for later.
///
/// When `mock` is enabled, `MockCachingScrobbler` is generated as well.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait(?Send)]
pub trait CachingScrobbler {
    /// Whether a usable session is established.
    fn is_authenticated(&self) -> bool;

    /// Submit a batch; if it fails, the batch is cached instead of lost and
    /// the response status is [`Cached`](crate::ScrobbleStatus::Cached).
    async fn scrobble(&self, scrobbles: &[Scrobble]) -> Result<ScrobbleResponse>;

    /// Everything currently held in the cache.
    async fn get_cached(&self) -> Result<Vec<Scrobble>>;

    /// Resubmit the cache, removing whatever Last.fm accepts.
    async fn send_cached(&self) -> Result<ScrobbleResponse>;
}
