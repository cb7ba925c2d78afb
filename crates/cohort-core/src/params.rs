//! Parameter sets: the configurations a cohort compares.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::BPS_PER_UNIT;
use crate::error::{CoreError, Result};
use crate::Size;

/// How the captured spread of a simulated fill is approximated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillSpreadModel {
    /// Always credit the configured order distance, regardless of how far
    /// price actually traded through the resting order.
    #[default]
    ConfiguredDistance,
    /// Credit the resting order's distance from the mid at the fill tick.
    OrderDistanceAtFill,
}

/// Fully-merged quoting configuration for one parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Quote distance from mid (bps).
    #[serde(default = "default_order_distance_bps")]
    pub order_distance_bps: Decimal,

    /// Cancel when an order gets closer than this to mid (bps).
    #[serde(default = "default_cancel_distance_bps")]
    pub cancel_distance_bps: Decimal,

    /// Rebalance when an order drifts further than this from mid (bps).
    #[serde(default = "default_rebalance_distance_bps")]
    pub rebalance_distance_bps: Decimal,

    /// Cancel when more than this many levels are ahead of the order.
    /// 0 disables the queue check.
    #[serde(default)]
    pub queue_position_limit: u32,

    /// Simulated order quantity (base units).
    #[serde(default = "default_order_size")]
    pub order_size: Size,

    /// Absolute position at which only reducing orders are placed.
    #[serde(default = "default_max_position")]
    pub max_position: Size,

    /// Look-back window for the volatility pause (seconds).
    #[serde(default = "default_volatility_window_secs")]
    pub volatility_window_secs: u64,

    /// Pause quoting when range volatility exceeds this (bps).
    #[serde(default = "default_volatility_threshold_bps")]
    pub volatility_threshold_bps: Decimal,

    /// A resting order within this distance makes the tick qualified (bps).
    #[serde(default = "default_max_qualifying_distance_bps")]
    pub max_qualifying_distance_bps: Decimal,

    #[serde(default)]
    pub fill_spread_model: FillSpreadModel,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            order_distance_bps: default_order_distance_bps(),
            cancel_distance_bps: default_cancel_distance_bps(),
            rebalance_distance_bps: default_rebalance_distance_bps(),
            queue_position_limit: 0,
            order_size: default_order_size(),
            max_position: default_max_position(),
            volatility_window_secs: default_volatility_window_secs(),
            volatility_threshold_bps: default_volatility_threshold_bps(),
            max_qualifying_distance_bps: default_max_qualifying_distance_bps(),
            fill_spread_model: FillSpreadModel::default(),
        }
    }
}

fn default_order_distance_bps() -> Decimal {
    Decimal::new(8, 0)
}
fn default_cancel_distance_bps() -> Decimal {
    Decimal::new(4, 0)
}
fn default_rebalance_distance_bps() -> Decimal {
    Decimal::new(12, 0)
}
fn default_order_size() -> Size {
    Size::new(Decimal::new(1, 2)) // 0.01
}
fn default_max_position() -> Size {
    Size::new(Decimal::new(1, 1)) // 0.1
}
fn default_volatility_window_secs() -> u64 {
    60
}
fn default_volatility_threshold_bps() -> Decimal {
    Decimal::new(50, 0)
}
fn default_max_qualifying_distance_bps() -> Decimal {
    Decimal::new(10, 0)
}

impl SimConfig {
    /// Validate bounds once at load time.
    ///
    /// `id` is only used to label the error.
    pub fn validate(&self, id: &str) -> Result<()> {
        let invalid = |reason: String| CoreError::InvalidParameterSet {
            id: id.to_string(),
            reason,
        };

        let bps_fields = [
            ("order_distance_bps", self.order_distance_bps),
            ("cancel_distance_bps", self.cancel_distance_bps),
            ("rebalance_distance_bps", self.rebalance_distance_bps),
            ("volatility_threshold_bps", self.volatility_threshold_bps),
            ("max_qualifying_distance_bps", self.max_qualifying_distance_bps),
        ];
        for (name, value) in bps_fields {
            if value.is_sign_negative() || value > BPS_PER_UNIT {
                return Err(invalid(format!("{name} must be within [0, 10000], got {value}")));
            }
        }

        if self.order_distance_bps.is_zero() {
            return Err(invalid("order_distance_bps must be positive".to_string()));
        }
        if self.cancel_distance_bps >= self.order_distance_bps {
            return Err(invalid(format!(
                "cancel_distance_bps ({}) must be below order_distance_bps ({})",
                self.cancel_distance_bps, self.order_distance_bps
            )));
        }
        if self.rebalance_distance_bps < self.order_distance_bps {
            return Err(invalid(format!(
                "rebalance_distance_bps ({}) must be at least order_distance_bps ({})",
                self.rebalance_distance_bps, self.order_distance_bps
            )));
        }
        if !self.order_size.is_positive() {
            return Err(invalid(format!("order_size must be positive, got {}", self.order_size)));
        }
        if !self.max_position.is_positive() {
            return Err(invalid(format!(
                "max_position must be positive, got {}",
                self.max_position
            )));
        }
        if self.volatility_window_secs == 0 {
            return Err(invalid("volatility_window_secs must be non-zero".to_string()));
        }

        Ok(())
    }
}

/// Identity plus merged configuration. Immutable for the life of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub config: SimConfig,
}

impl ParameterSet {
    /// Build a parameter set, validating its configuration.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        config: SimConfig,
    ) -> Result<Self> {
        let id = id.into();
        config.validate(&id)?;
        Ok(Self {
            id,
            name: name.into(),
            description: description.into(),
            config,
        })
    }
}

/// Source of fully-merged parameter sets, resolved by id.
pub trait ParameterSetProvider: Send + Sync {
    /// Look up one parameter set.
    fn get(&self, id: &str) -> Option<ParameterSet>;

    /// All known parameter sets, ordered by id.
    fn list(&self) -> Vec<ParameterSet>;
}

/// In-memory provider over already-validated parameter sets.
#[derive(Debug, Clone, Default)]
pub struct StaticParameterSets {
    sets: BTreeMap<String, ParameterSet>,
}

impl StaticParameterSets {
    pub fn new(sets: impl IntoIterator<Item = ParameterSet>) -> Self {
        Self {
            sets: sets.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl ParameterSetProvider for StaticParameterSets {
    fn get(&self, id: &str) -> Option<ParameterSet> {
        self.sets.get(id).cloned()
    }

    fn list(&self) -> Vec<ParameterSet> {
        self.sets.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimConfig::default();
        assert!(config.validate("default").is_ok());
        assert_eq!(config.order_distance_bps, dec!(8));
        assert_eq!(config.cancel_distance_bps, dec!(4));
        assert_eq!(config.rebalance_distance_bps, dec!(12));
        assert_eq!(config.queue_position_limit, 0);
        assert_eq!(config.order_size, Size::new(dec!(0.01)));
        assert_eq!(config.fill_spread_model, FillSpreadModel::ConfiguredDistance);
    }

    #[test]
    fn test_cancel_must_be_inside_order_distance() {
        let config = SimConfig {
            cancel_distance_bps: dec!(8),
            ..SimConfig::default()
        };
        let err = config.validate("tight").unwrap_err();
        assert!(err.to_string().contains("cancel_distance_bps"));
    }

    #[test]
    fn test_negative_bps_rejected() {
        let config = SimConfig {
            volatility_threshold_bps: dec!(-1),
            ..SimConfig::default()
        };
        assert!(config.validate("neg").is_err());
    }

    #[test]
    fn test_non_positive_size_rejected() {
        let config = SimConfig {
            order_size: Size::ZERO,
            ..SimConfig::default()
        };
        assert!(ParameterSet::new("zero", "Zero", "", config).is_err());
    }

    #[test]
    fn test_config_serde_defaults() {
        let toml_str = r#"
order_distance_bps = "6"
fill_spread_model = "order_distance_at_fill"
"#;
        let config: SimConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.order_distance_bps, dec!(6));
        assert_eq!(config.rebalance_distance_bps, dec!(12));
        assert_eq!(config.fill_spread_model, FillSpreadModel::OrderDistanceAtFill);
    }

    #[test]
    fn test_static_provider_lookup() {
        let a = ParameterSet::new("a", "A", "", SimConfig::default()).unwrap();
        let b = ParameterSet::new("b", "B", "", SimConfig::default()).unwrap();
        let provider = StaticParameterSets::new(vec![b, a]);

        assert_eq!(provider.len(), 2);
        assert!(provider.get("a").is_some());
        assert!(provider.get("missing").is_none());
        let ids: Vec<String> = provider.list().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
