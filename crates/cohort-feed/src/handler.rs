//! Tick consumer trait.

use std::sync::Arc;

use cohort_core::MarketTick;

use crate::error::HandlerError;
use crate::provider::BoxFuture;

/// Asynchronous consumer of broadcast ticks.
///
/// Every subscriber of a `SharedMarketFeed` receives the same `Arc<MarketTick>`.
/// Errors and panics are contained by the feed and never reach other handlers.
pub trait TickHandler: Send + Sync {
    /// Stable identifier used for unsubscribe and error accounting.
    fn id(&self) -> &str;

    /// Process one tick.
    fn on_tick(&self, tick: Arc<MarketTick>) -> BoxFuture<'_, Result<(), HandlerError>>;
}

/// Arc wrapper for TickHandler trait objects.
pub type DynTickHandler = Arc<dyn TickHandler>;
