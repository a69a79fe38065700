//! Error types for the fetch core.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single download attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The attempt exceeded its bounded wait.
    #[error("attempt timed out")]
    Timeout,
    /// Connection, DNS or protocol failure from the transport layer.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-2xx status surfaced when `keep_status_code` is off.
    #[error("unexpected HTTP status {0}")]
    HttpStatus(StatusCode),
    /// Any other failure while preparing or executing the request.
    #[error("{0}")]
    Unclassified(String),
}

impl FetchError {
    /// Whether the retry loop should attempt again after this error.
    ///
    /// Every kind the attempt can raise is retryable; pool exhaustion never
    /// surfaces here, it degrades to a direct connection inside the pool.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout
                | FetchError::Transport(_)
                | FetchError::HttpStatus(_)
                | FetchError::Unclassified(_)
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        // The transport's own deadline fires before the outer guard in the
        // normal case; fold both into the same timeout kind.
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(err)
        }
    }
}
