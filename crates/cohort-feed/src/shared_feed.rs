//! Shared market feed: one poller, many subscribers.
//!
//! A single loop fetches the order book at a fixed interval, builds one
//! immutable `MarketTick` and hands the same `Arc` to every subscriber.
//! Subscribers run concurrently per tick and are supervised individually:
//! an error or a panic in one handler is counted and logged, never
//! propagated to the loop or to the other handlers.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cohort_core::{DepthSnapshot, MarketTick, OrderSide, Price};
use cohort_telemetry::Metrics;
use dashmap::DashMap;
use futures_util::future::join_all;
use futures_util::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{FeedError, FeedResult};
use crate::handler::DynTickHandler;
use crate::provider::OrderBookProvider;

/// Feed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Symbol to poll.
    pub symbol: String,

    /// Poll interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Levels requested per side.
    #[serde(default = "default_depth_levels")]
    pub depth_levels: usize,
}

fn default_interval_ms() -> u64 {
    100
}

fn default_depth_levels() -> usize {
    20
}

impl FeedConfig {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            interval_ms: default_interval_ms(),
            depth_levels: default_depth_levels(),
        }
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Poll period. An interval of 0 is treated as 1ms.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

/// Point-in-time feed statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedStats {
    pub symbol: String,
    pub tick_count: u64,
    pub error_count: u64,
    pub handler_error_count: u64,
    pub subscriber_count: usize,
    pub running: bool,
    pub elapsed_secs: f64,
    pub effective_rate_hz: f64,
}

struct LoopHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Polls one order-book source and broadcasts identical ticks to all subscribers.
pub struct SharedMarketFeed {
    config: FeedConfig,
    provider: Arc<dyn OrderBookProvider>,
    handlers: RwLock<Vec<DynTickHandler>>,
    current: RwLock<Option<Arc<MarketTick>>>,

    seq: AtomicU64,
    tick_count: AtomicU64,
    error_count: AtomicU64,
    handler_error_count: AtomicU64,
    handler_errors: DashMap<String, u64>,

    running: AtomicBool,
    started_at: Mutex<Option<Instant>>,
    stopped_at: Mutex<Option<Instant>>,
    loop_handle: Mutex<Option<LoopHandle>>,
}

impl SharedMarketFeed {
    pub fn new(config: FeedConfig, provider: Arc<dyn OrderBookProvider>) -> Self {
        Self {
            config,
            provider,
            handlers: RwLock::new(Vec::new()),
            current: RwLock::new(None),
            seq: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            handler_error_count: AtomicU64::new(0),
            handler_errors: DashMap::new(),
            running: AtomicBool::new(false),
            started_at: Mutex::new(None),
            stopped_at: Mutex::new(None),
            loop_handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Register a handler. A handler with the same id replaces the previous one.
    pub fn subscribe(&self, handler: DynTickHandler) {
        let mut handlers = self.handlers.write();
        handlers.retain(|h| h.id() != handler.id());
        debug!(symbol = %self.config.symbol, handler = handler.id(), "Subscribed");
        handlers.push(handler);
    }

    /// Remove a handler. Returns whether it was registered.
    pub fn unsubscribe(&self, handler_id: &str) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|h| h.id() != handler_id);
        before != handlers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the polling loop. No-op (with a warning) if already started.
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.loop_handle.lock();
        if slot.is_some() {
            warn!(symbol = %self.config.symbol, "Feed already started, ignoring start()");
            return;
        }

        let token = CancellationToken::new();
        let feed = Arc::clone(self);
        let loop_token = token.clone();

        self.running.store(true, Ordering::SeqCst);
        *self.started_at.lock() = Some(Instant::now());
        *self.stopped_at.lock() = None;

        let task = tokio::spawn(async move { feed.run_loop(loop_token).await });
        *slot = Some(LoopHandle { token, task });

        info!(
            symbol = %self.config.symbol,
            interval_ms = self.config.interval_ms,
            subscribers = self.subscriber_count(),
            "Shared feed started"
        );
    }

    /// Cancel the loop and wait for it to finish. Idempotent.
    ///
    /// No handler is invoked after this returns.
    pub async fn stop(&self) {
        let handle = self.loop_handle.lock().take();
        let Some(LoopHandle { token, task }) = handle else {
            return;
        };

        token.cancel();
        if let Err(e) = task.await {
            error!(symbol = %self.config.symbol, error = %e, "Feed loop terminated abnormally");
        }

        self.running.store(false, Ordering::SeqCst);
        *self.stopped_at.lock() = Some(Instant::now());

        let stats = self.stats();
        info!(
            symbol = %stats.symbol,
            ticks = stats.tick_count,
            fetch_errors = stats.error_count,
            handler_errors = stats.handler_error_count,
            rate_hz = stats.effective_rate_hz,
            "Shared feed stopped"
        );
    }

    async fn run_loop(&self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = interval.tick() => {}
            }

            // Failures are already counted and logged.
            let _ = self.poll_once().await;
        }
    }

    /// Fetch one snapshot and broadcast it.
    ///
    /// Fetch failures and unusable books are counted and returned; the tick
    /// is skipped. Handler failures are absorbed.
    pub async fn poll_once(&self) -> FeedResult<Arc<MarketTick>> {
        let symbol = self.config.symbol.as_str();

        let book = match self
            .provider
            .fetch_book(symbol, self.config.depth_levels)
            .await
        {
            Ok(book) => book,
            Err(e) => {
                self.record_fetch_error(&e);
                return Err(e);
            }
        };

        let seq = self.seq.load(Ordering::SeqCst) + 1;
        let tick = match MarketTick::from_book(seq, &book) {
            Ok(tick) => Arc::new(tick),
            Err(e) => {
                let e = FeedError::from(e);
                self.record_fetch_error(&e);
                return Err(e);
            }
        };
        self.seq.store(seq, Ordering::SeqCst);

        *self.current.write() = Some(Arc::clone(&tick));
        self.broadcast(Arc::clone(&tick)).await;
        self.tick_count.fetch_add(1, Ordering::SeqCst);
        Metrics::feed_tick(symbol);

        Ok(tick)
    }

    fn record_fetch_error(&self, e: &FeedError) {
        let count = self.error_count.fetch_add(1, Ordering::SeqCst) + 1;
        Metrics::feed_fetch_error(&self.config.symbol);
        warn!(symbol = %self.config.symbol, error = %e, error_count = count, "Tick skipped");
    }

    async fn broadcast(&self, tick: Arc<MarketTick>) {
        let handlers: Vec<DynTickHandler> = self.handlers.read().clone();
        if handlers.is_empty() {
            return;
        }

        let start = Instant::now();
        let deliveries = handlers.iter().map(|handler| {
            let tick = Arc::clone(&tick);
            // The whole call, including any synchronous prefix of on_tick, runs
            // inside catch_unwind.
            AssertUnwindSafe(async move { handler.on_tick(tick).await }).catch_unwind()
        });
        let outcomes = join_all(deliveries).await;

        for (handler, outcome) in handlers.iter().zip(outcomes) {
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => FeedError::HandlerFailed {
                    handler: handler.id().to_string(),
                    reason: e.to_string(),
                },
                Err(payload) => FeedError::HandlerPanicked {
                    handler: handler.id().to_string(),
                    message: panic_message(payload.as_ref()),
                },
            };
            self.record_handler_failure(handler.id(), &failure);
        }

        Metrics::broadcast_latency(
            &self.config.symbol,
            start.elapsed().as_secs_f64() * 1000.0,
        );
    }

    fn record_handler_failure(&self, handler_id: &str, failure: &FeedError) {
        self.handler_error_count.fetch_add(1, Ordering::SeqCst);
        *self
            .handler_errors
            .entry(handler_id.to_string())
            .or_insert(0) += 1;

        let kind = match failure {
            FeedError::HandlerPanicked { .. } => "panic",
            _ => "error",
        };
        Metrics::handler_error(handler_id, kind);
        error!(handler = handler_id, kind, error = %failure, "Tick handler failed");
    }

    /// Latest broadcast tick.
    pub fn current_tick(&self) -> Option<Arc<MarketTick>> {
        self.current.read().clone()
    }

    /// Depth snapshot of the latest tick.
    pub fn current_depth(&self) -> Option<DepthSnapshot> {
        self.current.read().as_ref().map(|t| t.depth.clone())
    }

    /// Queue rank of `price` on `side` in the latest tick's queue depth.
    pub fn queue_position(&self, side: OrderSide, price: Price) -> Option<usize> {
        self.current
            .read()
            .as_ref()
            .map(|t| t.queue_position(side, price))
    }

    /// Failure count per handler id.
    pub fn handler_errors(&self) -> HashMap<String, u64> {
        self.handler_errors
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }

    pub fn stats(&self) -> FeedStats {
        let tick_count = self.tick_count.load(Ordering::SeqCst);
        let started_at = *self.started_at.lock();
        let stopped_at = *self.stopped_at.lock();
        let elapsed_secs = match started_at {
            Some(started) => {
                let end = stopped_at.unwrap_or_else(Instant::now);
                end.saturating_duration_since(started).as_secs_f64()
            }
            None => 0.0,
        };
        let effective_rate_hz = if elapsed_secs > 0.0 {
            tick_count as f64 / elapsed_secs
        } else {
            0.0
        };

        FeedStats {
            symbol: self.config.symbol.clone(),
            tick_count,
            error_count: self.error_count.load(Ordering::SeqCst),
            handler_error_count: self.handler_error_count.load(Ordering::SeqCst),
            subscriber_count: self.subscriber_count(),
            running: self.is_running(),
            elapsed_secs,
            effective_rate_hz,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
