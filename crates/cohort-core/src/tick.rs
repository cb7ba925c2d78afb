//! Order-book snapshot and market tick types.
//!
//! A `BookSnapshot` is what an order-book provider returns; a `MarketTick`
//! is the immutable, derived view that the shared feed broadcasts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decimal::BPS_PER_UNIT;
use crate::error::{CoreError, Result};
use crate::{OrderSide, Price, Size};

/// Depth levels retained on each tick as a book snapshot.
pub const SNAPSHOT_DEPTH: usize = 20;

/// Depth levels used for queue-position estimation.
pub const QUEUE_DEPTH: usize = 10;

/// One price level of the order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub size: Size,
}

impl BookLevel {
    pub fn new(price: Price, size: Size) -> Self {
        Self { price, size }
    }
}

/// Raw order-book snapshot from a provider.
///
/// Bids are expected best-first (descending), asks best-first (ascending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub symbol: String,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub received_at: DateTime<Utc>,
}

/// Book state classification, used to reject unusable snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookState {
    Valid,
    NoBid,
    NoAsk,
    Empty,
    /// best bid >= best ask, or a non-positive price.
    Crossed,
}

impl fmt::Display for BookState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "VALID"),
            Self::NoBid => write!(f, "NO_BID"),
            Self::NoAsk => write!(f, "NO_ASK"),
            Self::Empty => write!(f, "EMPTY"),
            Self::Crossed => write!(f, "CROSSED"),
        }
    }
}

impl BookSnapshot {
    pub fn new(symbol: impl Into<String>, bids: Vec<BookLevel>, asks: Vec<BookLevel>) -> Self {
        Self {
            symbol: symbol.into(),
            bids,
            asks,
            received_at: Utc::now(),
        }
    }

    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    pub fn state(&self) -> BookState {
        let bid = self.best_bid().filter(|l| l.price.is_positive() && l.size.is_positive());
        let ask = self.best_ask().filter(|l| l.price.is_positive() && l.size.is_positive());
        match (bid, ask) {
            (None, None) => BookState::Empty,
            (Some(_), None) => BookState::NoAsk,
            (None, Some(_)) => BookState::NoBid,
            (Some(b), Some(a)) if b.price < a.price => BookState::Valid,
            _ => BookState::Crossed,
        }
    }
}

/// Bounded depth snapshot carried on every tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl DepthSnapshot {
    /// Levels for one side, best-first.
    pub fn side(&self, side: OrderSide) -> &[BookLevel] {
        match side {
            OrderSide::Buy => &self.bids,
            OrderSide::Sell => &self.asks,
        }
    }

    /// Queue rank of `price` on `side` within the top `depth` levels.
    ///
    /// Counts levels strictly better than `price` (higher bids, lower asks).
    /// A level at exactly `price` shares that rank.
    pub fn queue_position(&self, side: OrderSide, price: Price, depth: usize) -> usize {
        self.side(side)
            .iter()
            .take(depth)
            .filter(|level| match side {
                OrderSide::Buy => level.price > price,
                OrderSide::Sell => level.price < price,
            })
            .count()
    }
}

/// One broadcast unit of market data. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketTick {
    /// Monotonic sequence number within one feed.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub mid_price: Price,
    pub bid_price: Price,
    pub ask_price: Price,
    pub bid_qty: Size,
    pub ask_qty: Size,
    pub spread_bps: Decimal,
    /// Top `SNAPSHOT_DEPTH` levels per side.
    pub depth: DepthSnapshot,
}

impl MarketTick {
    /// Build a tick from a provider snapshot.
    ///
    /// mid = (best_bid + best_ask) / 2, spread_bps = (ask - bid) / mid × 10,000.
    pub fn from_book(seq: u64, book: &BookSnapshot) -> Result<Self> {
        let state = book.state();
        let (best_bid, best_ask) = match (book.best_bid(), book.best_ask()) {
            (Some(b), Some(a)) if state == BookState::Valid => (*b, *a),
            _ => {
                return Err(CoreError::InvalidBook(format!(
                    "{}: book state {state}",
                    book.symbol
                )))
            }
        };

        let mid = Price::midpoint(best_bid.price, best_ask.price);
        let spread_bps = (best_ask.price - best_bid.price).inner() / mid.inner() * BPS_PER_UNIT;

        Ok(Self {
            seq,
            timestamp: book.received_at,
            symbol: book.symbol.clone(),
            mid_price: mid,
            bid_price: best_bid.price,
            ask_price: best_ask.price,
            bid_qty: best_bid.size,
            ask_qty: best_ask.size,
            spread_bps,
            depth: DepthSnapshot {
                bids: book.bids.iter().take(SNAPSHOT_DEPTH).copied().collect(),
                asks: book.asks.iter().take(SNAPSHOT_DEPTH).copied().collect(),
            },
        })
    }

    /// Queue rank for a resting order at `price` using the top `QUEUE_DEPTH` levels.
    pub fn queue_position(&self, side: OrderSide, price: Price) -> usize {
        self.depth.queue_position(side, price, QUEUE_DEPTH)
    }

    /// Compact top-of-book view for operation-log entries.
    pub fn top_of_book(&self) -> TopOfBook {
        TopOfBook {
            bid_price: self.bid_price,
            bid_qty: self.bid_qty,
            ask_price: self.ask_price,
            ask_qty: self.ask_qty,
        }
    }
}

/// Top-of-book snapshot attached to audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopOfBook {
    pub bid_price: Price,
    pub bid_qty: Size,
    pub ask_price: Price,
    pub ask_qty: Size,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(px: Decimal, sz: Decimal) -> BookLevel {
        BookLevel::new(Price::new(px), Size::new(sz))
    }

    fn test_book() -> BookSnapshot {
        BookSnapshot::new(
            "BTC",
            vec![
                level(dec!(49995), dec!(1)),
                level(dec!(49990), dec!(2)),
                level(dec!(49980), dec!(3)),
            ],
            vec![
                level(dec!(50005), dec!(1)),
                level(dec!(50010), dec!(2)),
            ],
        )
    }

    #[test]
    fn test_tick_from_book() {
        let tick = MarketTick::from_book(1, &test_book()).unwrap();
        assert_eq!(tick.mid_price.inner(), dec!(50000));
        assert_eq!(tick.bid_price.inner(), dec!(49995));
        assert_eq!(tick.ask_price.inner(), dec!(50005));
        // (50005 - 49995) / 50000 * 10000 = 2 bps
        assert_eq!(tick.spread_bps, dec!(2));
        assert_eq!(tick.depth.bids.len(), 3);
    }

    #[test]
    fn test_depth_is_bounded() {
        let bids: Vec<BookLevel> = (0..30)
            .map(|i| level(dec!(49990) - Decimal::from(i), dec!(1)))
            .collect();
        let asks: Vec<BookLevel> = (0..30)
            .map(|i| level(dec!(50010) + Decimal::from(i), dec!(1)))
            .collect();
        let tick = MarketTick::from_book(1, &BookSnapshot::new("BTC", bids, asks)).unwrap();
        assert_eq!(tick.depth.bids.len(), SNAPSHOT_DEPTH);
        assert_eq!(tick.depth.asks.len(), SNAPSHOT_DEPTH);
    }

    #[test]
    fn test_crossed_book_rejected() {
        let book = BookSnapshot::new(
            "BTC",
            vec![level(dec!(50010), dec!(1))],
            vec![level(dec!(50000), dec!(1))],
        );
        assert_eq!(book.state(), BookState::Crossed);
        assert!(MarketTick::from_book(1, &book).is_err());
    }

    #[test]
    fn test_empty_side_rejected() {
        let book = BookSnapshot::new("BTC", vec![], vec![level(dec!(50000), dec!(1))]);
        assert_eq!(book.state(), BookState::NoBid);
        assert!(MarketTick::from_book(1, &book).is_err());
    }

    #[test]
    fn test_queue_position_counts_strictly_better() {
        let tick = MarketTick::from_book(1, &test_book()).unwrap();
        // Two bid levels above 49985
        assert_eq!(tick.queue_position(OrderSide::Buy, Price::new(dec!(49985))), 2);
        // Tie with 49990 shares its rank (one level strictly better)
        assert_eq!(tick.queue_position(OrderSide::Buy, Price::new(dec!(49990))), 1);
        // Ask at 50010 has one strictly better ask
        assert_eq!(tick.queue_position(OrderSide::Sell, Price::new(dec!(50010))), 1);
        // Improving the best price gives rank 0
        assert_eq!(tick.queue_position(OrderSide::Sell, Price::new(dec!(50001))), 0);
    }
}
