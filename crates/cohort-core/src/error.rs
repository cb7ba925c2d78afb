//! Error types for cohort-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid order book: {0}")]
    InvalidBook(String),

    #[error("Invalid parameter set {id}: {reason}")]
    InvalidParameterSet { id: String, reason: String },

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
