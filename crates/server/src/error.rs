//! Structured errors for the host adapter.
//!
//! Everything written back to the host carries a stable code.

use serde::Serialize;

/// Errors raised while talking to the host.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The event line could not be decoded.
    #[error("INVALID_INPUT: {0}")]
    InvalidEvent(String),

    /// The worker rejected the event.
    #[error(transparent)]
    Worker(#[from] swcache_core::Error),
}

impl HostError {
    pub fn code(&self) -> &'static str {
        match self {
            HostError::InvalidEvent(_) => "INVALID_INPUT",
            HostError::Worker(e) => e.code(),
        }
    }
}

/// Wire form of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl From<HostError> for ErrorBody {
    fn from(err: HostError) -> Self {
        ErrorBody { code: err.code(), message: err.to_string() }
    }
}
