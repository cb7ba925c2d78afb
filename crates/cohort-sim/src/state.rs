//! Isolated, lock-protected simulation state for one parameter set.
//!
//! Every public operation is a single critical section over one
//! `parking_lot::Mutex`. Nothing here is shared with other members.

use std::collections::VecDeque;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cohort_core::{
    CancelReason, MetricsSummary, OperationEntry, OrderSide, ParameterSet, Price, QuotingStatus,
    SimulatedOrder, Size, BPS_PER_UNIT,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::metrics::{SimulationMetrics, Tier};

/// Upper bound on the volatility window (about 31 years).
const MAX_WINDOW_SECS: u64 = 1_000_000_000;

/// Capacities of the bounded buffers kept per member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLimits {
    /// Price points retained for the volatility window.
    #[serde(default = "default_price_history_capacity")]
    pub price_history_capacity: usize,

    /// Ticks in the rolling uptime window.
    #[serde(default = "default_rolling_window_ticks")]
    pub rolling_window_ticks: usize,

    #[serde(default = "default_fill_log_capacity")]
    pub fill_log_capacity: usize,

    #[serde(default = "default_operation_log_capacity")]
    pub operation_log_capacity: usize,
}

impl Default for StateLimits {
    fn default() -> Self {
        Self {
            price_history_capacity: default_price_history_capacity(),
            rolling_window_ticks: default_rolling_window_ticks(),
            fill_log_capacity: default_fill_log_capacity(),
            operation_log_capacity: default_operation_log_capacity(),
        }
    }
}

fn default_price_history_capacity() -> usize {
    6_000
}
fn default_rolling_window_ticks() -> usize {
    600
}
fn default_fill_log_capacity() -> usize {
    10_000
}
fn default_operation_log_capacity() -> usize {
    10_000
}

/// One simulated fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillRecord {
    pub timestamp: DateTime<Utc>,
    pub side: OrderSide,
    pub price: Price,
    pub size: Size,
    pub spread_bps: Decimal,
    pub pnl: Decimal,
    /// Position after this fill.
    pub position_after: Decimal,
}

/// Cheap copy of a member's state for readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub parameter_set_id: String,
    pub bid_order: Option<SimulatedOrder>,
    pub ask_order: Option<SimulatedOrder>,
    pub last_mid: Option<Price>,
    pub metrics: MetricsSummary,
}

#[derive(Debug, Default)]
struct StateInner {
    bid: Option<SimulatedOrder>,
    ask: Option<SimulatedOrder>,
    position: Decimal,
    price_history: VecDeque<(DateTime<Utc>, Price)>,
    fills: VecDeque<FillRecord>,
    metrics: SimulationMetrics,
    rolling: VecDeque<bool>,
    rolling_qualified: usize,
    operations: VecDeque<OperationEntry>,
    status: QuotingStatus,
}

impl StateInner {
    fn slot(&mut self, side: OrderSide) -> &mut Option<SimulatedOrder> {
        match side {
            OrderSide::Buy => &mut self.bid,
            OrderSide::Sell => &mut self.ask,
        }
    }

    fn cancel(&mut self, side: OrderSide, reason: CancelReason) -> Option<SimulatedOrder> {
        let order = self.slot(side).take()?;
        self.metrics.orders_cancelled += 1;
        match reason {
            CancelReason::Distance => self.metrics.cancelled_distance += 1,
            CancelReason::Queue => self.metrics.cancelled_queue += 1,
            _ => {}
        }
        Some(order)
    }

    fn fill(
        &mut self,
        side: OrderSide,
        price: Price,
        size: Size,
        spread_bps: Decimal,
        timestamp: DateTime<Utc>,
        fill_log_capacity: usize,
    ) -> FillRecord {
        let pnl = spread_bps / BPS_PER_UNIT * price.inner() * size.inner();
        self.position += side.signed(size);
        self.metrics.fill_count += 1;
        self.metrics.simulated_pnl += pnl;
        self.metrics.captured_spread_bps_total += spread_bps;

        let record = FillRecord {
            timestamp,
            side,
            price,
            size,
            spread_bps,
            pnl,
            position_after: self.position,
        };
        push_bounded(&mut self.fills, record.clone(), fill_log_capacity);
        record
    }

    fn rolling_uptime(&self) -> Decimal {
        if self.rolling.is_empty() {
            return Decimal::ZERO;
        }
        Decimal::from(self.rolling_qualified as u64) / Decimal::from(self.rolling.len() as u64)
    }
}

fn push_bounded<T>(buf: &mut VecDeque<T>, item: T, capacity: usize) {
    if capacity == 0 {
        return;
    }
    while buf.len() >= capacity {
        buf.pop_front();
    }
    buf.push_back(item);
}

/// State of one cohort member.
#[derive(Debug)]
pub struct SimulationState {
    parameter_set: ParameterSet,
    limits: StateLimits,
    inner: Mutex<StateInner>,
}

impl SimulationState {
    pub fn new(parameter_set: ParameterSet, limits: StateLimits) -> Self {
        Self {
            parameter_set,
            limits,
            inner: Mutex::new(StateInner::default()),
        }
    }

    pub fn parameter_set(&self) -> &ParameterSet {
        &self.parameter_set
    }

    pub fn id(&self) -> &str {
        &self.parameter_set.id
    }

    // === Price history ===

    /// Append a mid price and drop points older than the volatility window.
    pub fn update_price(&self, price: Price, timestamp: DateTime<Utc>) {
        let window = self.volatility_window();
        let mut inner = self.inner.lock();
        push_bounded(
            &mut inner.price_history,
            (timestamp, price),
            self.limits.price_history_capacity,
        );
        let cutoff = timestamp - window;
        while inner
            .price_history
            .front()
            .is_some_and(|(ts, _)| *ts < cutoff)
        {
            inner.price_history.pop_front();
        }
    }

    /// Range volatility over points no older than the window:
    /// (max − min) / average × 10,000. Zero with fewer than two points.
    pub fn volatility_bps(&self, now: DateTime<Utc>) -> Decimal {
        let cutoff = now - self.volatility_window();
        let inner = self.inner.lock();

        let mut count = 0u64;
        let mut sum = Decimal::ZERO;
        let mut max: Option<Decimal> = None;
        let mut min: Option<Decimal> = None;
        for (_, price) in inner.price_history.iter().filter(|(ts, _)| *ts >= cutoff) {
            let px = price.inner();
            count += 1;
            sum += px;
            max = Some(max.map_or(px, |m| m.max(px)));
            min = Some(min.map_or(px, |m| m.min(px)));
        }

        match (max, min) {
            (Some(max), Some(min)) if count >= 2 => {
                let avg = sum / Decimal::from(count);
                if avg.is_zero() {
                    Decimal::ZERO
                } else {
                    (max - min) / avg * BPS_PER_UNIT
                }
            }
            _ => Decimal::ZERO,
        }
    }

    fn volatility_window(&self) -> ChronoDuration {
        let secs = self
            .parameter_set
            .config
            .volatility_window_secs
            .min(MAX_WINDOW_SECS);
        ChronoDuration::seconds(secs as i64)
    }

    /// Last recorded mid.
    pub fn last_price(&self) -> Option<Price> {
        self.inner.lock().price_history.back().map(|(_, p)| *p)
    }

    // === Orders ===

    /// Rest `order` on its side, replacing any previous order there.
    pub fn set_order(&self, order: SimulatedOrder) -> Option<SimulatedOrder> {
        let mut inner = self.inner.lock();
        inner.metrics.orders_placed += 1;
        inner.slot(order.side).replace(order)
    }

    pub fn set_bid_order(&self, order: SimulatedOrder) -> Option<SimulatedOrder> {
        debug_assert_eq!(order.side, OrderSide::Buy);
        self.set_order(order)
    }

    pub fn set_ask_order(&self, order: SimulatedOrder) -> Option<SimulatedOrder> {
        debug_assert_eq!(order.side, OrderSide::Sell);
        self.set_order(order)
    }

    pub fn order(&self, side: OrderSide) -> Option<SimulatedOrder> {
        let inner = self.inner.lock();
        match side {
            OrderSide::Buy => inner.bid.clone(),
            OrderSide::Sell => inner.ask.clone(),
        }
    }

    pub fn bid_order(&self) -> Option<SimulatedOrder> {
        self.order(OrderSide::Buy)
    }

    pub fn ask_order(&self) -> Option<SimulatedOrder> {
        self.order(OrderSide::Sell)
    }

    /// Remove the order on `side`. Empty side is a no-op returning `None`.
    pub fn cancel_order(&self, side: OrderSide, reason: CancelReason) -> Option<SimulatedOrder> {
        self.inner.lock().cancel(side, reason)
    }

    pub fn cancel_bid_order(&self, reason: CancelReason) -> Option<SimulatedOrder> {
        self.cancel_order(OrderSide::Buy, reason)
    }

    pub fn cancel_ask_order(&self, reason: CancelReason) -> Option<SimulatedOrder> {
        self.cancel_order(OrderSide::Sell, reason)
    }

    /// Cancel both sides; returns whatever was resting.
    pub fn cancel_all_orders(&self, reason: CancelReason) -> Vec<SimulatedOrder> {
        let mut inner = self.inner.lock();
        [OrderSide::Buy, OrderSide::Sell]
            .into_iter()
            .filter_map(|side| inner.cancel(side, reason))
            .collect()
    }

    // === Events ===

    pub fn record_rebalance(&self) {
        self.inner.lock().metrics.rebalance_count += 1;
    }

    pub fn record_volatility_pause(&self) {
        self.inner.lock().metrics.volatility_pause_count += 1;
    }

    /// Book a fill: PnL += spread_bps / 10,000 × price × qty, position ± qty.
    pub fn simulate_fill(
        &self,
        side: OrderSide,
        price: Price,
        size: Size,
        spread_bps: Decimal,
        timestamp: DateTime<Utc>,
    ) -> FillRecord {
        self.inner.lock().fill(
            side,
            price,
            size,
            spread_bps,
            timestamp,
            self.limits.fill_log_capacity,
        )
    }

    /// Take the resting order on `side` and fill it at its own price and size.
    ///
    /// Fills are not cancellations and leave the cancel counters untouched.
    pub fn fill_resting_order(
        &self,
        side: OrderSide,
        spread_bps: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Option<(SimulatedOrder, FillRecord)> {
        let mut inner = self.inner.lock();
        let order = inner.slot(side).take()?;
        let record = inner.fill(
            side,
            order.price,
            order.size,
            spread_bps,
            timestamp,
            self.limits.fill_log_capacity,
        );
        Some((order, record))
    }

    pub fn position(&self) -> Decimal {
        self.inner.lock().position
    }

    pub fn fills(&self) -> Vec<FillRecord> {
        self.inner.lock().fills.iter().cloned().collect()
    }

    // === Uptime ===

    /// Count one tick and classify its tier from `rolling_uptime_pct`.
    pub fn record_tick(&self, is_qualified: bool, rolling_uptime_pct: Decimal) {
        let window = self.limits.rolling_window_ticks;
        let mut inner = self.inner.lock();

        inner.metrics.total_ticks += 1;
        if is_qualified {
            inner.metrics.qualified_ticks += 1;
        }

        if window > 0 {
            if inner.rolling.len() >= window {
                if let Some(true) = inner.rolling.pop_front() {
                    inner.rolling_qualified -= 1;
                }
            }
            inner.rolling.push_back(is_qualified);
            if is_qualified {
                inner.rolling_qualified += 1;
            }
        }

        if let Some(tier) = Tier::classify(rolling_uptime_pct, is_qualified) {
            inner.metrics.record_tier(tier);
        }
    }

    /// Qualified share of the rolling window (0–1).
    pub fn rolling_uptime(&self) -> Decimal {
        self.inner.lock().rolling_uptime()
    }

    /// Qualified share of the rolling window (0–100).
    pub fn rolling_uptime_pct(&self) -> Decimal {
        self.rolling_uptime() * Decimal::ONE_HUNDRED
    }

    // === Operation log and status ===

    pub fn record_operation(&self, entry: OperationEntry) {
        let capacity = self.limits.operation_log_capacity;
        push_bounded(&mut self.inner.lock().operations, entry, capacity);
    }

    /// The most recent `limit` entries, oldest first. `None` returns everything retained.
    pub fn operations(&self, limit: Option<usize>) -> Vec<OperationEntry> {
        let inner = self.inner.lock();
        let skip = limit.map_or(0, |l| inner.operations.len().saturating_sub(l));
        inner.operations.iter().skip(skip).cloned().collect()
    }

    pub fn status(&self) -> QuotingStatus {
        self.inner.lock().status
    }

    /// Set the quoting status, returning the previous one.
    pub fn set_status(&self, status: QuotingStatus) -> QuotingStatus {
        std::mem::replace(&mut self.inner.lock().status, status)
    }

    // === Reads ===

    pub fn metrics(&self) -> MetricsSummary {
        let inner = self.inner.lock();
        inner
            .metrics
            .summary(inner.rolling_uptime() * Decimal::ONE_HUNDRED, inner.position, inner.status)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.inner.lock();
        StateSnapshot {
            parameter_set_id: self.parameter_set.id.clone(),
            bid_order: inner.bid.clone(),
            ask_order: inner.ask.clone(),
            last_mid: inner.price_history.back().map(|(_, p)| *p),
            metrics: inner.metrics.summary(
                inner.rolling_uptime() * Decimal::ONE_HUNDRED,
                inner.position,
                inner.status,
            ),
        }
    }
}
