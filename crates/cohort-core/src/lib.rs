//! Core domain types for the cohort simulation harness.
//!
//! This crate provides the plain data shared by every other crate:
//! - `Price`, `Size`: precision-safe numeric types
//! - `MarketTick`, `BookSnapshot`: order-book model produced by the feed
//! - `ParameterSet`, `SimConfig`: typed, validated quoting configurations
//! - `SimulatedOrder`, `OperationEntry`: per-member order and audit records
//! - `CohortComparison`, `MemberResult`: run results

pub mod decimal;
pub mod error;
pub mod operation;
pub mod order;
pub mod params;
pub mod report;
pub mod tick;

pub use decimal::{Price, Size, BPS_PER_UNIT};
pub use error::{CoreError, Result};
pub use operation::{OperationAction, OperationEntry, QuotingStatus};
pub use order::{CancelReason, OrderSide, SimulatedOrder};
pub use params::{FillSpreadModel, ParameterSet, ParameterSetProvider, SimConfig, StaticParameterSets};
pub use report::{
    CohortComparison, MemberResult, MetricsSummary, Rankings, Recommendation, RunMetadata,
    RunStatus,
};
pub use tick::{BookLevel, BookSnapshot, BookState, DepthSnapshot, MarketTick, TopOfBook};
