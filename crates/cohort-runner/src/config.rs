//! Runner configuration.

use cohort_core::ParameterSet;
use cohort_feed::FeedConfig;
use cohort_sim::StateLimits;
use serde::{Deserialize, Serialize};

use crate::error::{RunnerError, RunnerResult};

/// Hard ceiling on price points kept per member for the volatility window.
pub const MAX_PRICE_HISTORY_POINTS: usize = 1_000_000;

/// Feed settings plus per-member buffer limits applied to every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub feed: FeedConfig,
    #[serde(default)]
    pub limits: StateLimits,
}

impl RunnerConfig {
    pub fn new(feed: FeedConfig) -> Self {
        Self {
            feed,
            limits: StateLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: StateLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn validate(&self) -> RunnerResult<()> {
        if self.feed.symbol.trim().is_empty() {
            return Err(RunnerError::InvalidConfig("feed symbol must not be empty".to_string()));
        }
        if self.feed.interval_ms == 0 {
            return Err(RunnerError::InvalidConfig(
                "feed interval_ms must be positive".to_string(),
            ));
        }
        if self.feed.depth_levels == 0 {
            return Err(RunnerError::InvalidConfig(
                "feed depth_levels must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Limits for one member, with the price history large enough to hold
    /// every tick of its volatility window at the feed interval.
    pub fn limits_for(&self, parameter_set: &ParameterSet) -> RunnerResult<StateLimits> {
        let interval_ms = self.feed.interval_ms.max(1);
        let window_ms = parameter_set
            .config
            .volatility_window_secs
            .saturating_mul(1000);
        let required = window_ms.div_ceil(interval_ms).saturating_add(1);

        if required > MAX_PRICE_HISTORY_POINTS as u64 {
            return Err(RunnerError::InvalidConfig(format!(
                "parameter set {}: volatility window of {}s needs {required} price points \
                 at {interval_ms}ms ticks, above the {MAX_PRICE_HISTORY_POINTS} limit",
                parameter_set.id, parameter_set.config.volatility_window_secs
            )));
        }

        let mut limits = self.limits;
        limits.price_history_capacity = limits.price_history_capacity.max(required as usize);
        Ok(limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use cohort_core::{Price, SimConfig};
    use cohort_sim::SimulationState;
    use rust_decimal_macros::dec;

    fn parameter_set(window_secs: u64) -> ParameterSet {
        let config = SimConfig {
            volatility_window_secs: window_secs,
            ..SimConfig::default()
        };
        ParameterSet::new("w", "W", "", config).unwrap()
    }

    #[test]
    fn test_default_window_keeps_configured_capacity() {
        let config = RunnerConfig::new(FeedConfig::new("BTC"));
        let limits = config.limits_for(&parameter_set(60)).unwrap();
        assert_eq!(limits.price_history_capacity, 6_000);
    }

    #[test]
    fn test_long_window_grows_price_history() {
        let config = RunnerConfig::new(FeedConfig::new("BTC"));
        let limits = config.limits_for(&parameter_set(900)).unwrap();
        assert_eq!(limits.price_history_capacity, 9_001);
        assert_eq!(limits.rolling_window_ticks, config.limits.rolling_window_ticks);
    }

    #[test]
    fn test_long_window_volatility_sees_whole_window() {
        let config = RunnerConfig::new(FeedConfig::new("BTC"));
        let ps = parameter_set(900);
        let state = SimulationState::new(ps.clone(), config.limits_for(&ps).unwrap());

        let t0 = Utc::now();
        state.update_price(Price::new(dec!(50000)), t0);
        for i in 1..=7_000i64 {
            state.update_price(Price::new(dec!(50600)), t0 + Duration::milliseconds(i * 100));
        }

        // 600 / ~50600 * 10000 ≈ 118.6bps, above the 50bps pause threshold
        let now = t0 + Duration::milliseconds(7_000 * 100);
        let volatility = state.volatility_bps(now);
        assert!(volatility > dec!(118) && volatility < dec!(119), "{volatility}");
    }

    #[test]
    fn test_unbounded_window_rejected() {
        let config = RunnerConfig::new(FeedConfig::new("BTC").with_interval_ms(1));
        let err = config.limits_for(&parameter_set(86_400)).unwrap_err();
        assert!(matches!(err, RunnerError::InvalidConfig(_)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = RunnerConfig::new(FeedConfig::new("BTC").with_interval_ms(0));
        assert!(matches!(config.validate(), Err(RunnerError::InvalidConfig(_))));
    }
}
