//! Per-parameter-set market-making simulation.
//!
//! Each cohort member is a `SimulationExecutor` that owns exactly one
//! `SimulationState`. Members never share mutable state.
//!
//! # Architecture
//!
//! ```text
//! SharedMarketFeed ──tick──▶ SimulationExecutor.on_tick()
//!                             ├─ volatility pause / resume
//!                             ├─ fill / cancel / rebalance / queue checks
//!                             ├─ placement (reduce-only at position cap)
//!                             └─ qualification → SimulationState.record_tick()
//! ```

pub mod executor;
pub mod metrics;
pub mod state;

pub use executor::SimulationExecutor;
pub use metrics::{SimulationMetrics, Tier, BOOSTED_TIER_PCT, STANDARD_TIER_PCT};
pub use state::{FillRecord, SimulationState, StateLimits, StateSnapshot};
