//! Prometheus metrics for the cohort simulator.
//!
//! Provides observability for:
//! - Shared feed health (ticks, fetch errors, broadcast latency)
//! - Subscriber isolation (handler errors per member)
//! - Simulated quoting activity (fills, pauses)
//! - Run lifecycle and live scoring
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, register_int_gauge,
    CounterVec, Encoder, GaugeVec, HistogramVec, IntGauge, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Ticks broadcast by the shared feed.
pub static FEED_TICKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cohort_feed_ticks_total",
        "Total ticks broadcast by the shared feed",
        &["symbol"]
    )
    .unwrap()
});

/// Order-book fetch failures (tick skipped).
pub static FEED_FETCH_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cohort_feed_fetch_errors_total",
        "Total order-book fetch failures",
        &["symbol"]
    )
    .unwrap()
});

/// Time to deliver one tick to every subscriber.
pub static BROADCAST_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "cohort_broadcast_latency_ms",
        "Time to deliver one tick to all subscribers in milliseconds",
        &["symbol"],
        vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0]
    )
    .unwrap()
});

/// Subscriber handler failures.
/// Labels: handler (parameter set id), kind (error/panic)
pub static HANDLER_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cohort_handler_errors_total",
        "Total subscriber handler failures",
        &["handler", "kind"]
    )
    .unwrap()
});

/// Simulated fills.
pub static SIM_FILLS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cohort_sim_fills_total",
        "Total simulated fills",
        &["parameter_set", "side"]
    )
    .unwrap()
});

/// Volatility pause episodes.
pub static SIM_VOLATILITY_PAUSES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cohort_sim_volatility_pauses_total",
        "Total volatility pause episodes",
        &["parameter_set"]
    )
    .unwrap()
});

/// Live effective points per member.
pub static EFFECTIVE_POINTS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "cohort_effective_points",
        "Effective points of each cohort member",
        &["parameter_set"]
    )
    .unwrap()
});

/// Whether a run is active (1) or not (0).
pub static RUN_ACTIVE: Lazy<IntGauge> =
    Lazy::new(|| register_int_gauge!("cohort_run_active", "Run active (1=active)").unwrap());

/// Members in the active run.
pub static RUN_MEMBERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("cohort_run_members", "Number of members in the active run").unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record a broadcast tick.
    pub fn feed_tick(symbol: &str) {
        FEED_TICKS_TOTAL.with_label_values(&[symbol]).inc();
    }

    /// Record a skipped tick.
    pub fn feed_fetch_error(symbol: &str) {
        FEED_FETCH_ERRORS_TOTAL.with_label_values(&[symbol]).inc();
    }

    /// Record broadcast latency.
    pub fn broadcast_latency(symbol: &str, latency_ms: f64) {
        BROADCAST_LATENCY_MS
            .with_label_values(&[symbol])
            .observe(latency_ms);
    }

    /// Record a handler failure. `kind` is "error" or "panic".
    pub fn handler_error(handler: &str, kind: &str) {
        HANDLER_ERRORS_TOTAL
            .with_label_values(&[handler, kind])
            .inc();
    }

    /// Record a simulated fill.
    pub fn sim_fill(parameter_set: &str, side: &str) {
        SIM_FILLS_TOTAL
            .with_label_values(&[parameter_set, side])
            .inc();
    }

    /// Record a volatility pause episode.
    pub fn sim_volatility_pause(parameter_set: &str) {
        SIM_VOLATILITY_PAUSES_TOTAL
            .with_label_values(&[parameter_set])
            .inc();
    }

    /// Update a member's effective points.
    pub fn effective_points(parameter_set: &str, points: f64) {
        EFFECTIVE_POINTS
            .with_label_values(&[parameter_set])
            .set(points);
    }

    /// Mark run start/stop.
    pub fn run_active(active: bool, members: usize) {
        RUN_ACTIVE.set(i64::from(active));
        RUN_MEMBERS.set(if active { members as i64 } else { 0 });
    }

    /// Render all registered metrics in Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder
            .encode(&prometheus::gather(), &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_render() {
        Metrics::feed_tick("TEST");
        Metrics::handler_error("ps-test", "panic");
        Metrics::run_active(true, 3);

        let text = Metrics::gather_text().unwrap();
        assert!(text.contains("cohort_feed_ticks_total"));
        assert!(text.contains("cohort_handler_errors_total"));
        assert_eq!(RUN_MEMBERS.get(), 3);

        Metrics::run_active(false, 3);
        assert_eq!(RUN_MEMBERS.get(), 0);
    }
}
