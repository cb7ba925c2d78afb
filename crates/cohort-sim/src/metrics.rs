//! Per-member simulation counters.
//!
//! Raw counters are updated inside the state's critical section; ratios are
//! derived only when a summary is read.

use cohort_core::{MetricsSummary, QuotingStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Rolling uptime at or above this percentage counts as boosted time.
pub const BOOSTED_TIER_PCT: Decimal = Decimal::from_parts(70, 0, 0, false, 0);

/// Rolling uptime at or above this percentage counts as standard time.
pub const STANDARD_TIER_PCT: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Decimal places kept on derived percentages.
const PCT_DP: u32 = 4;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Liquidity-program tier of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Boosted,
    Standard,
    Basic,
}

impl Tier {
    /// Tier for a tick given the rolling uptime before it.
    ///
    /// Returns `None` when the tick earns no tier time (rolling uptime below
    /// the standard threshold and the tick itself unqualified).
    pub fn classify(rolling_uptime_pct: Decimal, is_qualified: bool) -> Option<Self> {
        if rolling_uptime_pct >= BOOSTED_TIER_PCT {
            Some(Self::Boosted)
        } else if rolling_uptime_pct >= STANDARD_TIER_PCT {
            Some(Self::Standard)
        } else if is_qualified {
            Some(Self::Basic)
        } else {
            None
        }
    }
}

/// Counters for one parameter set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationMetrics {
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
}

impl SimulationMetrics {
    pub fn record_tier(&mut self, tier: Tier) {
        match tier {
            Tier::Boosted => self.boosted_ticks += 1,
            Tier::Standard => self.standard_ticks += 1,
            Tier::Basic => self.basic_ticks += 1,
        }
    }

    /// Lifetime share of qualified ticks (0–100).
    pub fn uptime_pct(&self) -> Decimal {
        pct_of_total(self.qualified_ticks, self.total_ticks)
    }

    pub fn avg_captured_spread_bps(&self) -> Decimal {
        if self.fill_count == 0 {
            return Decimal::ZERO;
        }
        (self.captured_spread_bps_total / Decimal::from(self.fill_count)).round_dp(PCT_DP)
    }

    /// Build a read-side summary with derived ratios filled in.
    pub fn summary(
        &self,
        rolling_uptime_pct: Decimal,
        position: Decimal,
        status: QuotingStatus,
    ) -> MetricsSummary {
        MetricsSummary {
            total_ticks: self.total_ticks,
            qualified_ticks: self.qualified_ticks,
            fill_count: self.fill_count,
            simulated_pnl: self.simulated_pnl,
            captured_spread_bps_total: self.captured_spread_bps_total,
            orders_placed: self.orders_placed,
            orders_cancelled: self.orders_cancelled,
            cancelled_distance: self.cancelled_distance,
            cancelled_queue: self.cancelled_queue,
            rebalance_count: self.rebalance_count,
            volatility_pause_count: self.volatility_pause_count,
            boosted_ticks: self.boosted_ticks,
            standard_ticks: self.standard_ticks,
            basic_ticks: self.basic_ticks,
            uptime_pct: self.uptime_pct(),
            rolling_uptime_pct: rolling_uptime_pct.round_dp(PCT_DP),
            avg_captured_spread_bps: self.avg_captured_spread_bps(),
            boosted_time_pct: pct_of_total(self.boosted_ticks, self.total_ticks),
            standard_time_pct: pct_of_total(self.standard_ticks, self.total_ticks),
            basic_time_pct: pct_of_total(self.basic_ticks, self.total_ticks),
            position,
            status,
        }
    }
}

fn pct_of_total(part: u64, total: u64) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(part) / Decimal::from(total) * HUNDRED).round_dp(PCT_DP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(Tier::classify(dec!(70.0), false), Some(Tier::Boosted));
        assert_eq!(Tier::classify(dec!(69.9), false), Some(Tier::Standard));
        assert_eq!(Tier::classify(dec!(50.0), false), Some(Tier::Standard));
        assert_eq!(Tier::classify(dec!(49.9), true), Some(Tier::Basic));
        assert_eq!(Tier::classify(dec!(49.9), false), None);
    }

    #[test]
    fn test_summary_derives_ratios() {
        let metrics = SimulationMetrics {
            total_ticks: 8,
            qualified_ticks: 6,
            fill_count: 2,
            captured_spread_bps_total: dec!(15),
            boosted_ticks: 2,
            standard_ticks: 4,
            basic_ticks: 1,
            ..Default::default()
        };

        let summary = metrics.summary(dec!(62.5), dec!(0.01), QuotingStatus::Active);
        assert_eq!(summary.uptime_pct, dec!(75));
        assert_eq!(summary.avg_captured_spread_bps, dec!(7.5));
        assert_eq!(summary.boosted_time_pct, dec!(25));
        assert_eq!(summary.standard_time_pct, dec!(50));
        assert_eq!(summary.basic_time_pct, dec!(12.5));
        assert_eq!(summary.position, dec!(0.01));
    }

    #[test]
    fn test_empty_summary_is_zero() {
        let summary = SimulationMetrics::default().summary(
            Decimal::ZERO,
            Decimal::ZERO,
            QuotingStatus::Active,
        );
        assert_eq!(summary.uptime_pct, Decimal::ZERO);
        assert_eq!(summary.avg_captured_spread_bps, Decimal::ZERO);
    }
}
