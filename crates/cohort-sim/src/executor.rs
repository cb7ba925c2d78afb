//! Per-member quoting and fill simulation.
//!
//! # Per-tick flow
//!
//! ```text
//! tick → price history → volatility
//!          ├─ above threshold: pause (cancel both once), tick unqualified
//!          └─ otherwise, per side:
//!               fill → too close (cancel) → too far (rebalance) → queue → keep
//!             then place missing sides, then qualify the tick
//! ```
//!
//! The executor only talks to its own `SimulationState`; it has no I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cohort_core::{
    CancelReason, FillSpreadModel, MarketTick, OperationAction, OperationEntry, OrderSide,
    ParameterSet, Price, QuotingStatus, SimulatedOrder,
};
use cohort_feed::{BoxFuture, HandlerError, TickHandler};
use cohort_telemetry::Metrics;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::state::{SimulationState, StateLimits};

/// Virtual market maker for one parameter set.
pub struct SimulationExecutor {
    state: Arc<SimulationState>,
    stopped: AtomicBool,
}

impl SimulationExecutor {
    pub fn new(parameter_set: ParameterSet, limits: StateLimits) -> Self {
        Self {
            state: Arc::new(SimulationState::new(parameter_set, limits)),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> &Arc<SimulationState> {
        &self.state
    }

    pub fn parameter_set(&self) -> &ParameterSet {
        self.state.parameter_set()
    }

    /// Stop reacting to ticks. State remains readable.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!(parameter_set = self.state.id(), "Executor stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Apply one tick.
    pub fn process_tick(&self, tick: &MarketTick) {
        if self.is_stopped() {
            return;
        }

        let config = &self.parameter_set().config;
        self.state.update_price(tick.mid_price, tick.timestamp);
        let volatility = self.state.volatility_bps(tick.timestamp);

        if volatility > config.volatility_threshold_bps {
            self.enter_pause(tick, volatility);
            let rolling = self.state.rolling_uptime_pct();
            self.state.record_tick(false, rolling);
            return;
        }

        if self.state.status() == QuotingStatus::VolatilityPaused {
            self.resume(tick, volatility);
        }

        for side in [OrderSide::Buy, OrderSide::Sell] {
            self.manage_side(side, tick);
        }
        self.place_orders(tick);

        let best_distance = self.best_distance_bps(tick.mid_price);
        let qualified = best_distance.is_some_and(|d| d <= config.max_qualifying_distance_bps);
        let rolling = self.state.rolling_uptime_pct();
        self.state.record_tick(qualified, rolling);
    }

    fn enter_pause(&self, tick: &MarketTick, volatility: Decimal) {
        if self.state.set_status(QuotingStatus::VolatilityPaused) == QuotingStatus::VolatilityPaused
        {
            return;
        }

        for order in self.state.cancel_all_orders(CancelReason::Volatility) {
            self.log_operation(
                tick,
                OperationAction::Cancel,
                Some(&order),
                format!("volatility {volatility:.2}bps"),
            );
        }
        self.state.record_volatility_pause();
        self.log_operation(
            tick,
            OperationAction::Pause,
            None,
            format!(
                "volatility {volatility:.2}bps > threshold {}bps",
                self.parameter_set().config.volatility_threshold_bps
            ),
        );
        Metrics::sim_volatility_pause(self.state.id());
        info!(
            parameter_set = self.state.id(),
            volatility_bps = %volatility.round_dp(2),
            mid = %tick.mid_price,
            "Quoting paused: volatility above threshold"
        );
    }

    fn resume(&self, tick: &MarketTick, volatility: Decimal) {
        self.state.set_status(QuotingStatus::Active);
        self.log_operation(
            tick,
            OperationAction::Resume,
            None,
            format!("volatility {volatility:.2}bps back within threshold"),
        );
        info!(
            parameter_set = self.state.id(),
            volatility_bps = %volatility.round_dp(2),
            "Quoting resumed"
        );
    }

    /// Resolve the resting order on `side`: fill, cancel, rebalance or keep.
    fn manage_side(&self, side: OrderSide, tick: &MarketTick) {
        let Some(order) = self.state.order(side) else {
            return;
        };
        let config = &self.parameter_set().config;
        let mid = tick.mid_price;

        let crossed = match side {
            OrderSide::Buy => tick.ask_price <= order.price,
            OrderSide::Sell => tick.bid_price >= order.price,
        };
        if crossed {
            let spread_bps = match config.fill_spread_model {
                FillSpreadModel::ConfiguredDistance => config.order_distance_bps,
                FillSpreadModel::OrderDistanceAtFill => order.distance_bps(mid),
            };
            if let Some((filled, record)) =
                self.state.fill_resting_order(side, spread_bps, tick.timestamp)
            {
                self.log_operation(
                    tick,
                    OperationAction::Fill,
                    Some(&filled),
                    format!(
                        "crossed at {}, captured {}bps",
                        opposite_touch(side, tick),
                        spread_bps.round_dp(2)
                    ),
                );
                Metrics::sim_fill(self.state.id(), &side.to_string());
                debug!(
                    parameter_set = self.state.id(),
                    side = %side,
                    price = %filled.price,
                    pnl = %record.pnl,
                    position = %record.position_after,
                    "Simulated fill"
                );
            }
            return;
        }

        let distance = order.distance_bps(mid);
        if distance < config.cancel_distance_bps {
            let detail = format!(
                "distance {}bps < cancel {}bps",
                distance.round_dp(2),
                config.cancel_distance_bps
            );
            self.cancel(side, tick, CancelReason::Distance, OperationAction::Cancel, detail);
            return;
        }

        if distance > config.rebalance_distance_bps {
            let detail = format!(
                "distance {}bps > rebalance {}bps",
                distance.round_dp(2),
                config.rebalance_distance_bps
            );
            self.cancel(side, tick, CancelReason::Rebalance, OperationAction::Rebalance, detail);
            self.state.record_rebalance();
            return;
        }

        if config.queue_position_limit > 0 {
            let rank = tick.queue_position(side, order.price);
            if rank > config.queue_position_limit as usize {
                let detail = format!(
                    "queue position {rank} > limit {}",
                    config.queue_position_limit
                );
                self.cancel(side, tick, CancelReason::Queue, OperationAction::Cancel, detail);
            }
        }
    }

    fn cancel(
        &self,
        side: OrderSide,
        tick: &MarketTick,
        reason: CancelReason,
        action: OperationAction,
        detail: String,
    ) {
        if let Some(order) = self.state.cancel_order(side, reason) {
            self.log_operation(tick, action, Some(&order), detail);
        }
    }

    fn place_orders(&self, tick: &MarketTick) {
        let config = &self.parameter_set().config;
        let position = self.state.position();

        if position.abs() >= config.max_position.inner() {
            let reducing = if position.is_sign_positive() {
                OrderSide::Sell
            } else {
                OrderSide::Buy
            };
            if self.state.order(reducing).is_none() {
                self.place(reducing, tick, format!("position {position} at cap, reduce only"));
            }
            return;
        }

        for side in [OrderSide::Buy, OrderSide::Sell] {
            if self.state.order(side).is_none() {
                self.place(
                    side,
                    tick,
                    format!("quote {}bps from mid", config.order_distance_bps),
                );
            }
        }
    }

    fn place(&self, side: OrderSide, tick: &MarketTick, reason: String) {
        let config = &self.parameter_set().config;
        let price = tick
            .mid_price
            .offset_bps(side.offset_sign() * config.order_distance_bps);
        let order = SimulatedOrder::new(
            side,
            price,
            config.order_size,
            tick.timestamp,
            tick.mid_price,
        );
        self.log_operation(tick, OperationAction::Place, Some(&order), reason);
        self.state.set_order(order);
    }

    /// Minimum distance from mid across resting orders.
    fn best_distance_bps(&self, mid: Price) -> Option<Decimal> {
        [self.state.bid_order(), self.state.ask_order()]
            .into_iter()
            .flatten()
            .map(|o| o.distance_bps(mid))
            .min()
    }

    fn log_operation(
        &self,
        tick: &MarketTick,
        action: OperationAction,
        order: Option<&SimulatedOrder>,
        reason: String,
    ) {
        self.state.record_operation(OperationEntry {
            timestamp: tick.timestamp,
            tick_seq: tick.seq,
            action,
            side: order.map(|o| o.side),
            order_price: order.map(|o| o.price),
            mid_price: tick.mid_price,
            distance_bps: order.map(|o| o.distance_bps(tick.mid_price)),
            reason,
            top_of_book: tick.top_of_book(),
        });
    }
}

fn opposite_touch(side: OrderSide, tick: &MarketTick) -> Price {
    match side {
        OrderSide::Buy => tick.ask_price,
        OrderSide::Sell => tick.bid_price,
    }
}

impl TickHandler for SimulationExecutor {
    fn id(&self) -> &str {
        self.state.id()
    }

    fn on_tick(&self, tick: Arc<MarketTick>) -> BoxFuture<'_, Result<(), HandlerError>> {
        Box::pin(async move {
            self.process_tick(&tick);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use cohort_core::{BookLevel, BookSnapshot, SimConfig, Size};
    use rust_decimal_macros::dec;

    /// Tick with best bid/ask half a unit either side of `mid` and `levels`
    /// levels one unit apart behind the touch.
    fn tick_at(seq: u64, mid: Decimal, ts: DateTime<Utc>, levels: usize) -> MarketTick {
        let half = dec!(0.5);
        let bids = (0..levels)
            .map(|i| BookLevel::new(Price::new(mid - half - Decimal::from(i)), Size::new(dec!(1))))
            .collect();
        let asks = (0..levels)
            .map(|i| BookLevel::new(Price::new(mid + half + Decimal::from(i)), Size::new(dec!(1))))
            .collect();
        let mut book = BookSnapshot::new("BTC", bids, asks);
        book.received_at = ts;
        MarketTick::from_book(seq, &book).unwrap()
    }

    fn tick_with_touch(seq: u64, bid: Decimal, ask: Decimal, ts: DateTime<Utc>) -> MarketTick {
        let mut book = BookSnapshot::new(
            "BTC",
            vec![BookLevel::new(Price::new(bid), Size::new(dec!(1)))],
            vec![BookLevel::new(Price::new(ask), Size::new(dec!(1)))],
        );
        book.received_at = ts;
        MarketTick::from_book(seq, &book).unwrap()
    }

    fn executor(config: SimConfig) -> SimulationExecutor {
        let ps = ParameterSet::new("test", "Test", "", config).unwrap();
        SimulationExecutor::new(ps, StateLimits::default())
    }

    #[test]
    fn test_first_tick_places_both_sides() {
        let exec = executor(SimConfig::default());
        let t0 = Utc::now();
        exec.process_tick(&tick_at(1, dec!(50000), t0, 1));

        let state = exec.state();
        assert_eq!(state.bid_order().unwrap().price.inner(), dec!(49960));
        assert_eq!(state.ask_order().unwrap().price.inner(), dec!(50040));

        let m = state.metrics();
        assert_eq!(m.orders_placed, 2);
        assert_eq!(m.total_ticks, 1);
        // 8bps <= 10bps qualifying distance
        assert_eq!(m.qualified_ticks, 1);
    }

    #[test]
    fn test_stable_market_keeps_single_order_per_side() {
        let exec = executor(SimConfig::default());
        let t0 = Utc::now();
        for seq in 1..=20u64 {
            let ts = t0 + Duration::milliseconds(seq as i64 * 100);
            exec.process_tick(&tick_at(seq, dec!(50000), ts, 1));
        }

        let m = exec.state().metrics();
        assert_eq!(m.orders_placed, 2);
        assert_eq!(m.orders_cancelled, 0);
        assert_eq!(m.qualified_ticks, 20);
    }

    #[test]
    fn test_unqualified_when_quotes_too_wide() {
        let exec = executor(SimConfig {
            max_qualifying_distance_bps: dec!(5),
            ..SimConfig::default()
        });
        exec.process_tick(&tick_at(1, dec!(50000), Utc::now(), 1));

        let m = exec.state().metrics();
        assert_eq!(m.qualified_ticks, 0);
        assert_eq!(m.total_ticks, 1);
    }

    #[test]
    fn test_volatility_pause_once_per_episode() {
        let exec = executor(SimConfig::default());
        let t0 = Utc::now();

        exec.process_tick(&tick_at(1, dec!(50000), t0, 1));
        assert!(exec.state().bid_order().is_some());

        // 500 / 50250 × 10000 ≈ 99.5bps > 50bps
        exec.process_tick(&tick_at(2, dec!(50500), t0 + Duration::seconds(1), 1));
        exec.process_tick(&tick_at(3, dec!(50510), t0 + Duration::seconds(2), 1));

        let state = exec.state();
        let m = state.metrics();
        assert_eq!(m.status, QuotingStatus::VolatilityPaused);
        assert_eq!(m.volatility_pause_count, 1);
        assert_eq!(m.orders_cancelled, 2);
        assert_eq!(m.orders_placed, 2);
        assert!(state.bid_order().is_none());
        assert!(state.ask_order().is_none());
        // Paused ticks are unqualified
        assert_eq!(m.qualified_ticks, 1);
        assert_eq!(m.total_ticks, 3);

        let actions: Vec<OperationAction> =
            state.operations(None).iter().map(|e| e.action).collect();
        assert_eq!(
            actions.iter().filter(|a| **a == OperationAction::Pause).count(),
            1
        );
    }

    #[test]
    fn test_resume_after_window_expires() {
        let exec = executor(SimConfig::default());
        let t0 = Utc::now();

        exec.process_tick(&tick_at(1, dec!(50000), t0, 1));
        exec.process_tick(&tick_at(2, dec!(50500), t0 + Duration::seconds(1), 1));
        assert_eq!(exec.state().status(), QuotingStatus::VolatilityPaused);

        // Earlier points are older than the 60s window
        exec.process_tick(&tick_at(3, dec!(50500), t0 + Duration::seconds(62), 1));

        let state = exec.state();
        assert_eq!(state.status(), QuotingStatus::Active);
        assert!(state.bid_order().is_some());
        assert!(state.ask_order().is_some());
        let last = state.operations(None);
        assert!(last.iter().any(|e| e.action == OperationAction::Resume));
    }

    #[test]
    fn test_buy_fill() {
        let exec = executor(SimConfig::default());
        let t0 = Utc::now();
        exec.process_tick(&tick_at(1, dec!(50000), t0, 1));

        // Best ask trades through the 49960 bid
        exec.process_tick(&tick_with_touch(2, dec!(49950), dec!(49960), t0 + Duration::seconds(1)));

        let state = exec.state();
        let m = state.metrics();
        assert_eq!(m.fill_count, 1);
        assert_eq!(state.position(), dec!(0.01));
        // 8 / 10000 × 49960 × 0.01
        assert_eq!(m.simulated_pnl, dec!(0.39968));
        assert_eq!(m.captured_spread_bps_total, dec!(8));

        let fills = state.fills();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price.inner(), dec!(49960));
    }

    #[test]
    fn test_fill_spread_model_order_distance() {
        let exec = executor(SimConfig {
            fill_spread_model: FillSpreadModel::OrderDistanceAtFill,
            ..SimConfig::default()
        });
        let t0 = Utc::now();
        exec.process_tick(&tick_at(1, dec!(50000), t0, 1));
        // Fill tick mid is 49954: the 49960 bid is only 6 / 49954 ≈ 1.2bps away
        exec.process_tick(&tick_with_touch(2, dec!(49950), dec!(49958), t0 + Duration::seconds(1)));

        let m = exec.state().metrics();
        assert_eq!(m.fill_count, 1);
        assert!(m.captured_spread_bps_total > dec!(1.2));
        assert!(m.captured_spread_bps_total < dec!(1.21));
    }

    #[test]
    fn test_rebalance_not_distance_cancel() {
        let exec = executor(SimConfig {
            volatility_threshold_bps: dec!(500),
            ..SimConfig::default()
        });
        let t0 = Utc::now();
        exec.process_tick(&tick_at(1, dec!(50000), t0, 1));
        assert_eq!(exec.state().bid_order().unwrap().price.inner(), dec!(49960));

        // Bid at 49960 is (50600 - 49960) / 50600 ≈ 126bps from the new mid
        exec.process_tick(&tick_at(2, dec!(50600), t0 + Duration::seconds(1), 1));

        let state = exec.state();
        let m = state.metrics();
        assert_eq!(m.rebalance_count, 1);
        assert_eq!(m.cancelled_distance, 0);
        // Fresh bid at 50600 × (1 - 8/10000)
        assert_eq!(state.bid_order().unwrap().price.inner(), dec!(50559.52));

        let rebalances: Vec<_> = state
            .operations(None)
            .into_iter()
            .filter(|e| e.action == OperationAction::Rebalance)
            .collect();
        assert_eq!(rebalances.len(), 1);
        assert_eq!(rebalances[0].side, Some(OrderSide::Buy));
    }

    #[test]
    fn test_distance_cancel_when_mid_approaches() {
        let exec = executor(SimConfig::default());
        let t0 = Utc::now();
        exec.process_tick(&tick_at(1, dec!(50000), t0, 1));

        // Bid at 49960 is 15 / 49975 ≈ 3bps from mid: inside the 4bps cancel distance
        exec.process_tick(&tick_at(2, dec!(49975), t0 + Duration::seconds(1), 1));

        let m = exec.state().metrics();
        assert_eq!(m.cancelled_distance, 1);
        assert_eq!(m.fill_count, 0);
        let bid = exec.state().bid_order().unwrap();
        assert_eq!(bid.price.inner(), dec!(49935.02));
    }

    #[test]
    fn test_queue_cancel() {
        let exec = executor(SimConfig {
            queue_position_limit: 1,
            ..SimConfig::default()
        });
        let t0 = Utc::now();
        exec.process_tick(&tick_at(1, dec!(50000), t0, 20));
        exec.process_tick(&tick_at(2, dec!(50000), t0 + Duration::seconds(1), 20));

        // Ten better levels on each side within the queue depth
        let m = exec.state().metrics();
        assert_eq!(m.cancelled_queue, 2);
        assert_eq!(m.orders_placed, 4);
    }

    #[test]
    fn test_queue_limit_zero_disables_check() {
        let exec = executor(SimConfig::default());
        let t0 = Utc::now();
        exec.process_tick(&tick_at(1, dec!(50000), t0, 20));
        exec.process_tick(&tick_at(2, dec!(50000), t0 + Duration::seconds(1), 20));
        assert_eq!(exec.state().metrics().cancelled_queue, 0);
    }

    #[test]
    fn test_position_cap_reduce_only() {
        let exec = executor(SimConfig {
            max_position: Size::new(dec!(0.01)),
            ..SimConfig::default()
        });
        let t0 = Utc::now();
        exec.process_tick(&tick_at(1, dec!(50000), t0, 1));
        exec.process_tick(&tick_with_touch(2, dec!(49950), dec!(49959), t0 + Duration::seconds(1)));

        let state = exec.state();
        assert_eq!(state.position(), dec!(0.01));
        assert!(state.bid_order().is_none());
        let ask = state.ask_order().unwrap();
        assert_eq!(ask.side, OrderSide::Sell);
    }

    #[test]
    fn test_short_position_cap_quotes_buy_only() {
        let exec = executor(SimConfig {
            max_position: Size::new(dec!(0.01)),
            ..SimConfig::default()
        });
        let t0 = Utc::now();
        exec.process_tick(&tick_at(1, dec!(50000), t0, 1));
        // Bid trades through the 50040 ask; mid 50045.5 leaves the old bid
        // about 17bps away, so it is rebalanced.
        exec.process_tick(&tick_with_touch(2, dec!(50041), dec!(50050), t0 + Duration::seconds(1)));

        let state = exec.state();
        assert_eq!(state.position(), dec!(-0.01));
        assert!(state.ask_order().is_none());
        let bid = state.bid_order().unwrap();
        assert_eq!(bid.side, OrderSide::Buy);
        assert_eq!(bid.price.inner(), dec!(50005.4636));
        assert_eq!(state.metrics().rebalance_count, 1);
    }

    #[test]
    fn test_stopped_executor_ignores_ticks() {
        let exec = executor(SimConfig::default());
        tokio_test::block_on(exec.on_tick(Arc::new(tick_at(1, dec!(50000), Utc::now(), 1))))
            .unwrap();
        exec.stop();
        tokio_test::block_on(exec.on_tick(Arc::new(tick_at(2, dec!(50000), Utc::now(), 1))))
            .unwrap();

        assert!(exec.is_stopped());
        assert_eq!(exec.state().metrics().total_ticks, 1);
    }
}
