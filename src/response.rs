use crate::{Result, ScrobbleError};
use serde::{Deserialize, Serialize};

/// Outcome reported by a submitter for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScrobbleStatus {
    /// Last.fm accepted the request
    Successful,
    /// Submission failed and the batch was stored in the local cache
    Cached,
    /// The request never produced a usable answer (network, HTTP or decoding failure)
    RequestFailed,
    /// The session or API key was rejected
    BadAuth,
    /// Last.fm is rate limiting this account or API key
    RateLimited,
    /// Last.fm is temporarily unavailable
    ServiceUnavailable,
    /// Last.fm rejected the request parameters
    InvalidParameters,
    /// Last.fm reported a generic backend failure
    OperationFailed,
    /// Error code not recognized
    Unknown,
}

impl ScrobbleStatus {
    /// Map a Last.fm API error code to a status.
    pub fn from_error_code(code: u32) -> Self {
        match code {
            4 | 9 | 10 | 14 | 26 => Self::BadAuth,
            29 => Self::RateLimited,
            11 | 16 => Self::ServiceUnavailable,
            6 | 7 | 13 => Self::InvalidParameters,
            8 => Self::OperationFailed,
            _ => Self::Unknown,
        }
    }
}

/// A scrobble that Last.fm received but chose not to record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredScrobble {
    pub artist: String,
    pub track: String,
    /// Last.fm ignore code (1 = artist ignored, 3 = timestamp too old, 5 = daily limit, ...)
    pub code: u32,
    pub message: String,
}

/// Result of handing a batch to a submitter.
///
/// A non-successful response is a normal return value, not an error: callers
/// inspect [`status`](Self::status) and decide whether to resubmit through the
/// cache. Use [`into_result`](Self::into_result) to turn a failure into a
/// [`ScrobbleError::SubmissionFailed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrobbleResponse {
    pub status: ScrobbleStatus,
    /// Scrobbles Last.fm recorded
    pub accepted: usize,
    /// Scrobbles Last.fm received but ignored
    pub ignored: Vec<IgnoredScrobble>,
    /// Human readable reason for a failure, if any
    pub message: Option<String>,
    /// Raw Last.fm error code, if the API returned one
    pub error_code: Option<u32>,
}

impl ScrobbleResponse {
    pub fn successful(accepted: usize, ignored: Vec<IgnoredScrobble>) -> Self {
        Self {
            status: ScrobbleStatus::Successful,
            accepted,
            ignored,
            message: None,
            error_code: None,
        }
    }

    pub fn failed(status: ScrobbleStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            accepted: 0,
            ignored: Vec::new(),
            message: Some(message.into()),
            error_code: None,
        }
    }

    /// Failure built from a Last.fm `{"error": code, "message": ...}` body.
    pub fn api_error(code: u32, message: impl Into<String>) -> Self {
        Self {
            error_code: Some(code),
            ..Self::failed(ScrobbleStatus::from_error_code(code), message)
        }
    }

    pub fn success(&self) -> bool {
        self.status == ScrobbleStatus::Successful
    }

    /// Number of scrobbles at the front of a `batch_len` batch that Last.fm
    /// already handled (accepted or ignored), even if the submission failed
    /// in a later request.
    pub fn processed(&self, batch_len: usize) -> usize {
        (self.accepted + self.ignored.len()).min(batch_len)
    }

    /// Merge the response of a later chunk of the same submission.
    ///
    /// Counts accumulate; the first failure wins the status.
    pub fn merge(&mut self, other: ScrobbleResponse) {
        let other_failed = !other.success();
        self.accepted += other.accepted;
        self.ignored.extend(other.ignored);
        if self.success() && other_failed {
            self.status = other.status;
            self.message = other.message;
            self.error_code = other.error_code;
        }
    }

    pub fn into_result(self) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(ScrobbleError::SubmissionFailed {
                status: self.status,
                message: self
                    .message
                    .unwrap_or_else(|| format!("{:?}", self.status)),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(ScrobbleStatus::from_error_code(9), ScrobbleStatus::BadAuth);
        assert_eq!(
            ScrobbleStatus::from_error_code(29),
            ScrobbleStatus::RateLimited
        );
        assert_eq!(
            ScrobbleStatus::from_error_code(16),
            ScrobbleStatus::ServiceUnavailable
        );
        assert_eq!(ScrobbleStatus::from_error_code(999), ScrobbleStatus::Unknown);
    }

    #[test]
    fn test_merge_keeps_first_failure() {
        let mut response = ScrobbleResponse::successful(50, Vec::new());
        response.merge(ScrobbleResponse::api_error(11, "Service Offline"));
        response.merge(ScrobbleResponse::api_error(9, "Invalid session key"));

        assert_eq!(response.accepted, 50);
        assert_eq!(response.status, ScrobbleStatus::ServiceUnavailable);
        assert_eq!(response.error_code, Some(11));
    }

    #[test]
    fn test_merge_collects_ignored() {
        let ignored = IgnoredScrobble {
            artist: "Artist".to_string(),
            track: "Track".to_string(),
            code: 3,
            message: "Timestamp too old".to_string(),
        };
        let mut response = ScrobbleResponse::successful(10, Vec::new());
        response.merge(ScrobbleResponse::successful(4, vec![ignored.clone()]));

        assert!(response.success());
        assert_eq!(response.accepted, 14);
        assert_eq!(response.ignored, vec![ignored]);
        assert_eq!(response.processed(20), 15);
    }

    #[test]
    fn test_processed_is_bounded() {
        assert_eq!(ScrobbleResponse::successful(70, Vec::new()).processed(50), 50);
        assert_eq!(
            ScrobbleResponse::failed(ScrobbleStatus::RequestFailed, "down").processed(50),
            0
        );
    }

    #[test]
    fn test_into_result() {
        assert!(ScrobbleResponse::successful(1, Vec::new())
            .into_result()
            .is_ok());

        match ScrobbleResponse::failed(ScrobbleStatus::RequestFailed, "timeout").into_result() {
            Err(ScrobbleError::SubmissionFailed { status, message }) => {
                assert_eq!(status, ScrobbleStatus::RequestFailed);
                assert_eq!(message, "timeout");
            }
            other => panic!("Expected submission failure, got: {other:?}"),
        }
    }
}
