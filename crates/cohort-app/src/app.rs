//! Main application orchestration.
//!
//! Wires the order-book provider, result store and runner together and
//! drives a single cohort run to completion.

use crate::config::AppConfig;
use crate::error::AppResult;
use cohort_core::CohortComparison;
use cohort_feed::{HttpBookProvider, OrderBookProvider};
use cohort_persistence::JsonLinesStore;
use cohort_runner::SimulationRunner;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often the run loop checks whether the runner stopped on its own.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Progress log interval while a run is active.
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// What to run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Parameter-set ids. Empty means every configured set.
    pub parameter_set_ids: Vec<String>,
    /// Auto-stop delay. Zero runs until interrupted.
    pub duration: Duration,
    pub run_id: Option<String>,
}

/// Main application.
pub struct Application {
    config: AppConfig,
    runner: Arc<SimulationRunner>,
}

impl Application {
    /// Create an application polling the configured HTTP info endpoint.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let provider =
            HttpBookProvider::new(config.feed.info_url.clone(), config.feed.request_timeout())?;
        Self::with_provider(config, Arc::new(provider))
    }

    /// Create an application over any order-book provider.
    pub fn with_provider(
        config: AppConfig,
        provider: Arc<dyn OrderBookProvider>,
    ) -> AppResult<Self> {
        let parameter_sets = Arc::new(config.parameter_sets()?);
        let mut runner = SimulationRunner::new(config.runner_config(), provider, parameter_sets);

        if config.persistence.enabled {
            let store = JsonLinesStore::open(&config.persistence.data_dir)?;
            info!(data_dir = %config.persistence.data_dir, "Result persistence enabled");
            runner = runner.with_store(Arc::new(store));
        } else {
            info!("Result persistence disabled");
        }

        Ok(Self {
            config,
            runner: Arc::new(runner),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn runner(&self) -> &Arc<SimulationRunner> {
        &self.runner
    }

    /// Run until the duration elapses or Ctrl-C is received.
    pub async fn run(&self, options: RunOptions) -> AppResult<CohortComparison> {
        self.run_until(options, shutdown_signal()).await
    }

    /// Run until the duration elapses or `shutdown` resolves.
    ///
    /// Returns the final comparison of this run.
    pub async fn run_until<F>(&self, options: RunOptions, shutdown: F) -> AppResult<CohortComparison>
    where
        F: Future<Output = ()>,
    {
        let ids = if options.parameter_set_ids.is_empty() {
            self.config.parameter_set_ids()
        } else {
            options.parameter_set_ids
        };

        let run_id = if options.duration.is_zero() {
            self.runner.start(&ids, 0, options.run_id).await?
        } else {
            self.runner
                .start_for(&ids, options.duration, options.run_id)
                .await?
        };

        let mut stop_poll = tokio::time::interval(STOP_POLL_INTERVAL);
        let mut status_log = tokio::time::interval(STATUS_LOG_INTERVAL);
        status_log.tick().await;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!(run_id = %run_id, "Shutdown signal received");
                    break;
                }
                _ = stop_poll.tick() => {
                    if self.runner.current_run_id().as_deref() != Some(run_id.as_str()) {
                        debug!(run_id = %run_id, "Run stopped on its own");
                        break;
                    }
                }
                _ = status_log.tick() => {
                    self.log_status();
                }
            }
        }

        // No-op when the run already auto-stopped.
        self.runner.stop().await;

        let comparison = self
            .runner
            .last_comparison()
            .filter(|c| c.run_id.as_deref() == Some(run_id.as_str()))
            .unwrap_or_default();
        log_comparison(&comparison);
        Ok(comparison)
    }

    fn log_status(&self) {
        let status = self.runner.live_status();
        if !status.running {
            return;
        }
        let ticks = status.feed.as_ref().map_or(0, |f| f.tick_count);
        info!(
            run_id = status.run_id.as_deref().unwrap_or(""),
            elapsed_secs = status.elapsed_secs,
            ticks,
            members = status.members.len(),
            "Run in progress"
        );
        for member in &status.members {
            debug!(
                parameter_set = %member.parameter_set_id,
                effective_points = %member.effective_points,
                pnl = %member.state.metrics.simulated_pnl,
                fills = member.state.metrics.fill_count,
                handler_errors = member.handler_errors,
                "Member status"
            );
        }
    }
}

fn log_comparison(comparison: &CohortComparison) {
    if comparison.is_empty() {
        warn!("Run produced no results");
        return;
    }
    for (rank, member) in comparison.members.iter().enumerate() {
        info!(
            rank = rank + 1,
            parameter_set = %member.parameter_set_id,
            effective_points = %member.effective_points,
            pnl = %member.metrics.simulated_pnl,
            uptime_pct = %member.metrics.uptime_pct,
            fills = member.metrics.fill_count,
            "Cohort ranking"
        );
    }
    if let Some(rec) = &comparison.recommendation {
        info!(
            parameter_set = %rec.parameter_set_id,
            reason = %rec.reason,
            "Recommended parameter set"
        );
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C, relying on run duration");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_core::RunStatus;
    use cohort_feed::{ladder_book, ScriptedBookProvider};
    use rust_decimal_macros::dec;

    fn config(data_dir: &str, enabled: bool) -> AppConfig {
        let content = format!(
            r#"
[feed]
symbol = "BTC"
interval_ms = 5

[persistence]
data_dir = "{data_dir}"
enabled = {enabled}

[[parameter_sets]]
id = "tight"
order_distance_bps = "5"
cancel_distance_bps = "2"
rebalance_distance_bps = "8"

[[parameter_sets]]
id = "base"
"#
        );
        AppConfig::from_toml_str(&content).unwrap()
    }

    fn provider() -> Arc<dyn OrderBookProvider> {
        let book = ladder_book("BTC", dec!(49999.5), dec!(50000.5), dec!(1), 5, dec!(1));
        Arc::new(ScriptedBookProvider::repeating(book))
    }

    #[tokio::test]
    async fn test_run_until_shutdown_persists_results() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let app = Application::with_provider(
            config(data_dir.to_str().unwrap(), true),
            provider(),
        )
        .unwrap();

        let options = RunOptions {
            run_id: Some("manual".to_string()),
            ..RunOptions::default()
        };
        let comparison = app
            .run_until(options, tokio::time::sleep(Duration::from_millis(100)))
            .await
            .unwrap();

        assert_eq!(comparison.run_id.as_deref(), Some("manual"));
        assert_eq!(comparison.members.len(), 2);
        assert!(!app.runner().is_running());

        let store = JsonLinesStore::open(&data_dir).unwrap();
        let runs = store.load_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Completed);
        assert_eq!(store.load_results("manual").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_run_stops_after_duration() {
        let app = Application::with_provider(config("unused", false), provider()).unwrap();

        let options = RunOptions {
            parameter_set_ids: vec!["base".to_string()],
            duration: Duration::from_millis(80),
            run_id: None,
        };
        let comparison = app
            .run_until(options, std::future::pending::<()>())
            .await
            .unwrap();

        assert_eq!(comparison.members.len(), 1);
        assert_eq!(comparison.members[0].parameter_set_id, "base");
        assert!(comparison.members[0].metrics.total_ticks > 0);
    }

    #[tokio::test]
    async fn test_unknown_ids_fail_to_start() {
        let app = Application::with_provider(config("unused", false), provider()).unwrap();

        let options = RunOptions {
            parameter_set_ids: vec!["missing".to_string()],
            ..RunOptions::default()
        };
        let result = app
            .run_until(options, std::future::pending::<()>())
            .await;
        assert!(result.is_err());
    }
}
