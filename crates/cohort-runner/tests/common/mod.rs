//! Shared fixtures for runner integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cohort_core::{BookSnapshot, ParameterSet, SimConfig, StaticParameterSets};
use cohort_feed::{ladder_book, FeedConfig, ScriptedBookProvider};
use cohort_persistence::ResultStore;
use cohort_runner::{RunnerConfig, SimulationRunner};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const TICK_INTERVAL_MS: u64 = 5;

/// Book one unit wide around `mid`, ten levels per side.
pub fn book_at(mid: Decimal) -> BookSnapshot {
    ladder_book("BTC", mid - dec!(0.5), mid + dec!(0.5), dec!(1), 10, dec!(1))
}

/// Mid oscillating between 50,000 and 49,950 so resting quotes get filled.
pub fn oscillating_provider(cycles: usize) -> ScriptedBookProvider {
    let mut script = Vec::new();
    for _ in 0..cycles {
        for _ in 0..4 {
            script.push(Ok(book_at(dec!(50000))));
        }
        for _ in 0..4 {
            script.push(Ok(book_at(dec!(49950))));
        }
    }
    script.push(Ok(book_at(dec!(50000))));
    ScriptedBookProvider::new(script)
}

pub fn parameter_set(id: &str, order_distance_bps: Decimal) -> ParameterSet {
    let config = SimConfig {
        order_distance_bps,
        cancel_distance_bps: order_distance_bps / dec!(2),
        rebalance_distance_bps: order_distance_bps * dec!(3),
        ..SimConfig::default()
    };
    ParameterSet::new(id, id.to_uppercase(), format!("{order_distance_bps}bps quotes"), config)
        .unwrap()
}

pub fn cohort() -> StaticParameterSets {
    StaticParameterSets::new(vec![
        parameter_set("tight", dec!(4)),
        parameter_set("base", dec!(8)),
        parameter_set("wide", dec!(20)),
    ])
}

pub fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn build(provider: ScriptedBookProvider, sets: StaticParameterSets) -> SimulationRunner {
    let config = RunnerConfig::new(FeedConfig::new("BTC").with_interval_ms(TICK_INTERVAL_MS));
    SimulationRunner::new(config, Arc::new(provider), Arc::new(sets))
}

pub fn runner(provider: ScriptedBookProvider, sets: StaticParameterSets) -> Arc<SimulationRunner> {
    Arc::new(build(provider, sets))
}

pub fn runner_with_store(
    provider: ScriptedBookProvider,
    sets: StaticParameterSets,
    store: Arc<dyn ResultStore>,
) -> Arc<SimulationRunner> {
    Arc::new(build(provider, sets).with_store(store))
}

/// Wait until the active run's feed has broadcast at least `ticks` ticks.
pub async fn wait_for_ticks(runner: &SimulationRunner, ticks: u64) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let count = runner
                .live_status()
                .feed
                .map(|f| f.tick_count)
                .unwrap_or(0);
            if count >= ticks {
                return;
            }
            tokio::time::sleep(Duration::from_millis(TICK_INTERVAL_MS)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "feed should reach {ticks} ticks within timeout");
}
