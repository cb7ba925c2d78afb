//! Run metadata, per-member results and the cohort comparison.
//!
//! These are the records the runner hands to a result store and to
//! dashboard readers. Everything here is plain serializable data.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::operation::QuotingStatus;
use crate::params::SimConfig;

/// Counter snapshot of one member with derived ratios filled in at read time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_ticks: u64,
    pub qualified_ticks: u64,
    pub fill_count: u64,
    pub simulated_pnl: Decimal,
    pub captured_spread_bps_total: Decimal,
    pub orders_placed: u64,
    pub orders_cancelled: u64,
    pub cancelled_distance: u64,
    pub cancelled_queue: u64,
    pub rebalance_count: u64,
    pub volatility_pause_count: u64,
    pub boosted_ticks: u64,
    pub standard_ticks: u64,
    pub basic_ticks: u64,

    // Derived on read.
    pub uptime_pct: Decimal,
    pub rolling_uptime_pct: Decimal,
    pub avg_captured_spread_bps: Decimal,
    pub boosted_time_pct: Decimal,
    pub standard_time_pct: Decimal,
    pub basic_time_pct: Decimal,

    pub position: Decimal,
    pub status: QuotingStatus,
}

/// Final (or live) result for one parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberResult {
    pub parameter_set_id: String,
    pub name: String,
    pub description: String,
    pub config: SimConfig,
    pub metrics: MetricsSummary,
    pub effective_points: Decimal,
}

/// Parameter-set ids ordered best-first under each metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rankings {
    pub by_effective_points: Vec<String>,
    pub by_pnl: Vec<String>,
    pub by_uptime: Vec<String>,
    pub by_fills: Vec<String>,
}

/// The configuration the comparison recommends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub parameter_set_id: String,
    pub name: String,
    pub effective_points: Decimal,
    pub reason: String,
}

/// Cross-member comparison for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortComparison {
    pub run_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: i64,
    /// Sorted by effective points, best first.
    pub members: Vec<MemberResult>,
    pub rankings: Rankings,
    pub recommendation: Option<Recommendation>,
}

impl CohortComparison {
    /// The result returned when there is nothing to compare.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Lifecycle status of a run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
}

/// Run metadata written at start and again at stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub symbol: String,
    pub parameter_set_ids: Vec<String>,
    pub duration_minutes: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
}
