//! Runner error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("A run is already active: {run_id}")]
    AlreadyRunning { run_id: String },

    #[error("None of the requested parameter sets resolved: {requested:?}")]
    NoValidParameterSets { requested: Vec<String> },

    #[error("Invalid runner configuration: {0}")]
    InvalidConfig(String),
}

pub type RunnerResult<T> = Result<T, RunnerError>;
