//! Prometheus metrics and structured logging for the cohort simulator.
//!
//! - Prometheus counters for feed health, handler isolation and simulated activity
//! - Structured logging with tracing (JSON in production, pretty otherwise)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
