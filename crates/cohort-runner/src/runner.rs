//! Cohort orchestration.
//!
//! One run = one `SharedMarketFeed` plus one `SimulationExecutor` per
//! parameter set. `start`/`stop` are serialized by an async lifecycle lock
//! (`start` fails fast rather than waiting on it); the active run is published through an `RwLock<Option<Arc<RunContext>>>`
//! so status reads never wait on the lifecycle or the broadcast path.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cohort_core::{
    CohortComparison, MemberResult, OperationEntry, ParameterSet, ParameterSetProvider,
    RunMetadata, RunStatus,
};
use cohort_feed::{DynTickHandler, FeedStats, OrderBookProvider, SharedMarketFeed};
use cohort_persistence::{PersistenceResult, ResultStore};
use cohort_sim::{SimulationExecutor, StateSnapshot};
use cohort_telemetry::Metrics;
use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::RunnerConfig;
use crate::error::{RunnerError, RunnerResult};
use crate::scoring::{build_comparison, effective_points, member_result};

/// Live view of one member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberStatus {
    pub parameter_set_id: String,
    pub name: String,
    pub effective_points: Decimal,
    pub handler_errors: u64,
    pub state: StateSnapshot,
}

/// Live view of the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStatus {
    pub running: bool,
    pub run_id: Option<String>,
    pub symbol: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_minutes: u64,
    pub elapsed_secs: i64,
    pub feed: Option<FeedStats>,
    pub members: Vec<MemberStatus>,
}

impl LiveStatus {
    fn idle() -> Self {
        Self {
            running: false,
            run_id: None,
            symbol: None,
            started_at: None,
            duration_minutes: 0,
            elapsed_secs: 0,
            feed: None,
            members: Vec::new(),
        }
    }
}

struct RunContext {
    metadata: RunMetadata,
    feed: Arc<SharedMarketFeed>,
    members: Vec<Arc<SimulationExecutor>>,
    auto_stop: CancellationToken,
}

impl RunContext {
    fn run_id(&self) -> &str {
        &self.metadata.run_id
    }

    fn member_results(&self) -> Vec<MemberResult> {
        self.members
            .iter()
            .map(|m| member_result(m.parameter_set(), m.state().metrics()))
            .collect()
    }

    fn comparison(&self, ended_at: Option<DateTime<Utc>>) -> CohortComparison {
        build_comparison(
            Some(self.metadata.run_id.clone()),
            Some(self.metadata.started_at),
            ended_at,
            self.member_results(),
        )
    }
}

/// Runs cohorts of simulated market makers against one shared feed.
pub struct SimulationRunner {
    config: RunnerConfig,
    provider: Arc<dyn OrderBookProvider>,
    parameter_sets: Arc<dyn ParameterSetProvider>,
    store: Option<Arc<dyn ResultStore>>,
    lifecycle: tokio::sync::Mutex<()>,
    active: RwLock<Option<Arc<RunContext>>>,
    last: RwLock<Option<CohortComparison>>,
}

impl SimulationRunner {
    pub fn new(
        config: RunnerConfig,
        provider: Arc<dyn OrderBookProvider>,
        parameter_sets: Arc<dyn ParameterSetProvider>,
    ) -> Self {
        Self {
            config,
            provider,
            parameter_sets,
            store: None,
            lifecycle: tokio::sync::Mutex::new(()),
            active: RwLock::new(None),
            last: RwLock::new(None),
        }
    }

    /// Persist runs through `store`. Without a store nothing is written.
    pub fn with_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn active(&self) -> Option<Arc<RunContext>> {
        self.active.read().clone()
    }

    /// Start a run over `parameter_set_ids`.
    ///
    /// A `duration_minutes` of 0 runs until `stop()`. Returns the run id
    /// (a fresh UUID unless one is given).
    pub async fn start(
        self: &Arc<Self>,
        parameter_set_ids: &[String],
        duration_minutes: u64,
        run_id: Option<String>,
    ) -> RunnerResult<String> {
        let auto_stop = (duration_minutes > 0)
            .then(|| Duration::from_secs(duration_minutes.saturating_mul(60)));
        self.start_inner(parameter_set_ids, duration_minutes, auto_stop, run_id)
            .await
    }

    /// Like `start`, with the auto-stop delay given directly.
    pub async fn start_for(
        self: &Arc<Self>,
        parameter_set_ids: &[String],
        duration: Duration,
        run_id: Option<String>,
    ) -> RunnerResult<String> {
        let minutes = duration.as_secs().div_ceil(60);
        self.start_inner(parameter_set_ids, minutes, Some(duration), run_id)
            .await
    }

    async fn start_inner(
        self: &Arc<Self>,
        parameter_set_ids: &[String],
        duration_minutes: u64,
        auto_stop_after: Option<Duration>,
        run_id: Option<String>,
    ) -> RunnerResult<String> {
        // Fail fast instead of queueing behind an in-flight start or stop.
        let Ok(_guard) = self.lifecycle.try_lock() else {
            let run_id = self.current_run_id().unwrap_or_default();
            warn!(run_id = %run_id, "Start rejected: lifecycle change in progress");
            return Err(RunnerError::AlreadyRunning { run_id });
        };

        if let Some(ctx) = self.active() {
            warn!(run_id = ctx.run_id(), "Start rejected: run already active");
            return Err(RunnerError::AlreadyRunning {
                run_id: ctx.run_id().to_string(),
            });
        }

        let parameter_sets = self.resolve(parameter_set_ids);
        if parameter_sets.is_empty() {
            return Err(RunnerError::NoValidParameterSets {
                requested: parameter_set_ids.to_vec(),
            });
        }

        self.config.validate()?;
        let members = parameter_sets
            .into_iter()
            .map(|ps| {
                let limits = self.config.limits_for(&ps)?;
                Ok(Arc::new(SimulationExecutor::new(ps, limits)))
            })
            .collect::<RunnerResult<Vec<Arc<SimulationExecutor>>>>()?;

        let run_id = run_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let feed = Arc::new(SharedMarketFeed::new(
            self.config.feed.clone(),
            Arc::clone(&self.provider),
        ));

        // Every member must see the first tick.
        for member in &members {
            let handler: DynTickHandler = member.clone();
            feed.subscribe(handler);
        }
        feed.start();

        let metadata = RunMetadata {
            run_id: run_id.clone(),
            symbol: self.config.feed.symbol.clone(),
            parameter_set_ids: members
                .iter()
                .map(|m| m.parameter_set().id.clone())
                .collect(),
            duration_minutes,
            started_at: Utc::now(),
            ended_at: None,
            status: RunStatus::Running,
        };
        self.persist("run metadata", |store| store.save_run(&metadata));

        let ctx = Arc::new(RunContext {
            metadata,
            feed,
            members,
            auto_stop: CancellationToken::new(),
        });
        *self.active.write() = Some(Arc::clone(&ctx));
        Metrics::run_active(true, ctx.members.len());

        if let Some(delay) = auto_stop_after {
            self.schedule_auto_stop(&ctx, delay);
        }

        info!(
            run_id = %run_id,
            symbol = %ctx.metadata.symbol,
            members = ctx.members.len(),
            duration_minutes,
            "Cohort run started"
        );
        Ok(run_id)
    }

    /// Resolve ids in request order, skipping unknown ids and duplicates.
    fn resolve(&self, ids: &[String]) -> Vec<ParameterSet> {
        let mut resolved: Vec<ParameterSet> = Vec::with_capacity(ids.len());
        for id in ids {
            if resolved.iter().any(|ps| &ps.id == id) {
                continue;
            }
            match self.parameter_sets.get(id) {
                Some(ps) => resolved.push(ps),
                None => warn!(parameter_set = %id, "Unknown parameter set, skipping"),
            }
        }
        resolved
    }

    fn schedule_auto_stop(self: &Arc<Self>, ctx: &RunContext, delay: Duration) {
        let runner = Arc::clone(self);
        let token = ctx.auto_stop.clone();
        let run_id = ctx.run_id().to_string();

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    info!(run_id = %run_id, "Run duration elapsed, stopping");
                    runner.stop_run(Some(&run_id)).await;
                }
            }
        });
    }

    /// Stop the active run and return its comparison.
    ///
    /// Returns an empty comparison when nothing is running.
    pub async fn stop(&self) -> CohortComparison {
        self.stop_run(None).await
    }

    async fn stop_run(&self, expected_run_id: Option<&str>) -> CohortComparison {
        let _guard = self.lifecycle.lock().await;

        let Some(ctx) = self.active() else {
            return CohortComparison::empty();
        };
        if expected_run_id.is_some_and(|id| id != ctx.run_id()) {
            return CohortComparison::empty();
        }

        ctx.auto_stop.cancel();
        ctx.feed.stop().await;
        for member in &ctx.members {
            member.stop();
        }

        let ended_at = Utc::now();
        let comparison = ctx.comparison(Some(ended_at));
        let run_id = ctx.run_id();

        for result in &comparison.members {
            self.persist("member result", |store| store.save_result(run_id, result));
            Metrics::effective_points(
                &result.parameter_set_id,
                result.effective_points.to_f64().unwrap_or(0.0),
            );
        }
        for member in &ctx.members {
            let operations = member.state().operations(None);
            let id = member.parameter_set().id.as_str();
            self.persist("operation log", |store| {
                store.save_operations(run_id, id, &operations)
            });
        }
        self.persist("comparison", |store| store.save_comparison(&comparison));

        let metadata = RunMetadata {
            ended_at: Some(ended_at),
            status: RunStatus::Completed,
            ..ctx.metadata.clone()
        };
        self.persist("run metadata", |store| store.save_run(&metadata));

        *self.active.write() = None;
        *self.last.write() = Some(comparison.clone());
        Metrics::run_active(false, 0);

        let feed_stats = ctx.feed.stats();
        info!(
            run_id = %run_id,
            duration_secs = comparison.duration_secs,
            ticks = feed_stats.tick_count,
            fetch_errors = feed_stats.error_count,
            handler_errors = feed_stats.handler_error_count,
            recommended = comparison
                .recommendation
                .as_ref()
                .map_or("none", |r| r.parameter_set_id.as_str()),
            "Cohort run stopped"
        );
        comparison
    }

    fn persist(&self, what: &str, op: impl FnOnce(&dyn ResultStore) -> PersistenceResult<()>) {
        let Some(store) = self.store.as_deref() else {
            return;
        };
        if let Err(e) = op(store) {
            error!(what, error = %e, "Failed to persist, continuing");
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.read().is_some()
    }

    pub fn current_run_id(&self) -> Option<String> {
        self.active().map(|ctx| ctx.run_id().to_string())
    }

    pub fn live_status(&self) -> LiveStatus {
        let Some(ctx) = self.active() else {
            return LiveStatus::idle();
        };

        let handler_errors = ctx.feed.handler_errors();
        let members = ctx
            .members
            .iter()
            .map(|m| {
                let state = m.state().snapshot();
                let id = m.parameter_set().id.clone();
                MemberStatus {
                    effective_points: effective_points(&state.metrics),
                    handler_errors: handler_errors.get(&id).copied().unwrap_or(0),
                    name: m.parameter_set().name.clone(),
                    parameter_set_id: id,
                    state,
                }
            })
            .collect();

        LiveStatus {
            running: true,
            run_id: Some(ctx.run_id().to_string()),
            symbol: Some(ctx.metadata.symbol.clone()),
            started_at: Some(ctx.metadata.started_at),
            duration_minutes: ctx.metadata.duration_minutes,
            elapsed_secs: (Utc::now() - ctx.metadata.started_at).num_seconds().max(0),
            feed: Some(ctx.feed.stats()),
            members,
        }
    }

    /// Comparison of the active run so far. Empty when idle.
    pub fn live_comparison(&self) -> CohortComparison {
        match self.active() {
            Some(ctx) => {
                let comparison = ctx.comparison(Some(Utc::now()));
                for m in &comparison.members {
                    Metrics::effective_points(
                        &m.parameter_set_id,
                        m.effective_points.to_f64().unwrap_or(0.0),
                    );
                }
                comparison
            }
            None => CohortComparison::empty(),
        }
    }

    /// Final comparison of the most recently stopped run, including runs
    /// stopped by their duration elapsing.
    pub fn last_comparison(&self) -> Option<CohortComparison> {
        self.last.read().clone()
    }

    /// Latest `limit` operation-log entries of one member of the active run.
    pub fn operation_log(
        &self,
        parameter_set_id: &str,
        limit: Option<usize>,
    ) -> Option<Vec<OperationEntry>> {
        let ctx = self.active()?;
        ctx.members
            .iter()
            .find(|m| m.parameter_set().id == parameter_set_id)
            .map(|m| m.state().operations(limit))
    }
}
