//! Feed error types.

use cohort_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid book: {0}")]
    InvalidBook(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Handler {handler} failed: {reason}")]
    HandlerFailed { handler: String, reason: String },

    #[error("Handler {handler} panicked: {message}")]
    HandlerPanicked { handler: String, message: String },
}

impl From<CoreError> for FeedError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidBook(msg) => Self::InvalidBook(msg),
            other => Self::Provider(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

pub type FeedResult<T> = Result<T, FeedError>;

/// Error returned by a tick handler. Counted and logged by the feed, never propagated.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
