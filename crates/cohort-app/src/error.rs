//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter set: {0}")]
    ParameterSet(#[from] cohort_core::CoreError),

    #[error("Feed error: {0}")]
    Feed(#[from] cohort_feed::FeedError),

    #[error("Runner error: {0}")]
    Runner(#[from] cohort_runner::RunnerError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] cohort_telemetry::TelemetryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] cohort_persistence::PersistenceError),
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
