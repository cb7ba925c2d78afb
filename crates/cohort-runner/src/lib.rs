//! Cohort orchestration for parameter-set simulations.
//!
//! `SimulationRunner` owns one shared feed and one isolated executor per
//! parameter set for the lifetime of a run, and turns member metrics into a
//! ranked `CohortComparison`.

pub mod config;
pub mod error;
pub mod runner;
pub mod scoring;

pub use config::{RunnerConfig, MAX_PRICE_HISTORY_POINTS};
pub use error::{RunnerError, RunnerResult};
pub use runner::{LiveStatus, MemberStatus, SimulationRunner};
pub use scoring::{build_comparison, effective_points, member_result, rankings};
