//! Application configuration.
//!
//! Loaded from a TOML file and layered with `COHORT__SECTION__KEY`
//! environment overrides. Parameter sets carry only the fields they change;
//! everything else comes from `[defaults]`.

use crate::error::{AppError, AppResult};
use cohort_core::{
    FillSpreadModel, ParameterSet, ParameterSetProvider, Size, SimConfig, StaticParameterSets,
};
use cohort_feed::FeedConfig;
use cohort_runner::RunnerConfig;
use cohort_sim::StateLimits;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "COHORT_CONFIG";

/// Prefix for per-key environment overrides (`COHORT__FEED__SYMBOL=ETH`).
pub const ENV_PREFIX: &str = "COHORT";

fn default_info_url() -> String {
    "https://api.hyperliquid.xyz/info".to_string()
}

fn default_symbol() -> String {
    "BTC".to_string()
}

fn default_interval_ms() -> u64 {
    100
}

fn default_depth_levels() -> usize {
    20
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_data_dir() -> String {
    "./data/cohort".to_string()
}

fn default_true() -> bool {
    true
}

/// Order-book source and polling cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSettings {
    /// Info endpoint polled for `l2Book` snapshots.
    #[serde(default = "default_info_url")]
    pub info_url: String,

    #[serde(default = "default_symbol")]
    pub symbol: String,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_depth_levels")]
    pub depth_levels: usize,

    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            info_url: default_info_url(),
            symbol: default_symbol(),
            interval_ms: default_interval_ms(),
            depth_levels: default_depth_levels(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl FeedSettings {
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            symbol: self.symbol.clone(),
            interval_ms: self.interval_ms,
            depth_levels: self.depth_levels,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Result persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding the JSON Lines files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// When false, nothing is written.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            enabled: true,
        }
    }
}

/// One configured parameter set. Unset fields inherit from `[defaults]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSetConfig {
    pub id: String,

    /// Display name. Falls back to the id.
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_distance_bps: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_distance_bps: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebalance_distance_bps: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_position_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_size: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_position: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatility_window_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatility_threshold_bps: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_qualifying_distance_bps: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_spread_model: Option<FillSpreadModel>,
}

impl ParameterSetConfig {
    /// Overlay this entry's overrides on `defaults`.
    pub fn merge(&self, defaults: &SimConfig) -> SimConfig {
        SimConfig {
            order_distance_bps: self.order_distance_bps.unwrap_or(defaults.order_distance_bps),
            cancel_distance_bps: self
                .cancel_distance_bps
                .unwrap_or(defaults.cancel_distance_bps),
            rebalance_distance_bps: self
                .rebalance_distance_bps
                .unwrap_or(defaults.rebalance_distance_bps),
            queue_position_limit: self
                .queue_position_limit
                .unwrap_or(defaults.queue_position_limit),
            order_size: self.order_size.unwrap_or(defaults.order_size),
            max_position: self.max_position.unwrap_or(defaults.max_position),
            volatility_window_secs: self
                .volatility_window_secs
                .unwrap_or(defaults.volatility_window_secs),
            volatility_threshold_bps: self
                .volatility_threshold_bps
                .unwrap_or(defaults.volatility_threshold_bps),
            max_qualifying_distance_bps: self
                .max_qualifying_distance_bps
                .unwrap_or(defaults.max_qualifying_distance_bps),
            fill_spread_model: self.fill_spread_model.unwrap_or(defaults.fill_spread_model),
        }
    }

    /// Merge and validate into an immutable parameter set.
    pub fn resolve(&self, defaults: &SimConfig) -> AppResult<ParameterSet> {
        let name = if self.name.is_empty() {
            self.id.clone()
        } else {
            self.name.clone()
        };
        Ok(ParameterSet::new(
            self.id.clone(),
            name,
            self.description.clone(),
            self.merge(defaults),
        )?)
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub feed: FeedSettings,

    /// Per-member buffer capacities.
    #[serde(default)]
    pub runner: StateLimits,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Base quoting configuration shared by every parameter set.
    #[serde(default)]
    pub defaults: SimConfig,

    #[serde(default)]
    pub parameter_sets: Vec<ParameterSetConfig>,
}

impl AppConfig {
    /// Load from `path`, then apply `COHORT__` environment overrides.
    pub fn load(path: &str) -> AppResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Toml))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without environment overrides.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check feed settings and that every parameter set resolves and fits
    /// the runner's price-history bounds.
    pub fn validate(&self) -> AppResult<()> {
        let runner = self.runner_config();
        runner.validate()?;
        self.defaults.validate("defaults")?;
        for parameter_set in self.parameter_sets()?.list() {
            runner.limits_for(&parameter_set)?;
        }
        Ok(())
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig::new(self.feed.feed_config()).with_limits(self.runner)
    }

    /// Merge every `[[parameter_sets]]` entry over `[defaults]` and validate it.
    ///
    /// Fails on the first invalid entry, a duplicate id, or an empty list.
    pub fn parameter_sets(&self) -> AppResult<StaticParameterSets> {
        if self.parameter_sets.is_empty() {
            return Err(AppError::Config("no parameter sets configured".to_string()));
        }

        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(self.parameter_sets.len());
        for entry in &self.parameter_sets {
            if entry.id.trim().is_empty() {
                return Err(AppError::Config("parameter set id must not be empty".to_string()));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate parameter set id: {}",
                    entry.id
                )));
            }
            resolved.push(entry.resolve(&self.defaults)?);
        }
        Ok(StaticParameterSets::new(resolved))
    }

    /// Configured ids in file order.
    pub fn parameter_set_ids(&self) -> Vec<String> {
        self.parameter_sets.iter().map(|p| p.id.clone()).collect()
    }
}
