//! Shared market-data feed for cohort simulations.
//!
//! Polls one order-book source and broadcasts identical, immutable ticks to
//! every subscribed handler, isolating handler failures from one another.

pub mod error;
pub mod handler;
pub mod provider;
pub mod shared_feed;

pub use error::{FeedError, FeedResult, HandlerError};
pub use handler::{DynTickHandler, TickHandler};
pub use provider::{
    ladder_book, parse_l2_book, BoxFuture, HttpBookProvider, OrderBookProvider,
    ScriptedBookProvider, DEFAULT_TIMEOUT,
};
pub use shared_feed::{FeedConfig, FeedStats, SharedMarketFeed};
