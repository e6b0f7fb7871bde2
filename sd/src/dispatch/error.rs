//! Dispatch error types

use std::time::Duration;

use thiserror::Error;

/// Why a transfer did not produce a response body
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("HTTP status {status}")]
    Status { status: u16 },
}

impl DispatchError {
    /// Check if the failure is likely transient
    ///
    /// The scheduler retries every failure while retries remain; this only
    /// colours the log line when a request is abandoned.
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::Network(_) => true,
            DispatchError::Timeout(_) => true,
            DispatchError::Status { status } => *status == 429 || *status >= 500,
        }
    }
}
