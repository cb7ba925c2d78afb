//! Cohort parameter-set simulator application.
//!
//! Loads the TOML configuration, builds the order-book provider, result
//! store and runner, and drives one cohort run until it auto-stops or the
//! process is interrupted.

pub mod app;
pub mod config;
pub mod error;

pub use app::{Application, RunOptions};
pub use config::{AppConfig, ParameterSetConfig};
pub use error::{AppError, AppResult};
