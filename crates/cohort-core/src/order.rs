//! Order side and simulated order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Price, Size};

/// Order side: buy (bid) or sell (ask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Signed quantity for position accounting (+qty buy, -qty sell).
    pub fn signed(&self, qty: Size) -> Decimal {
        match self {
            Self::Buy => qty.inner(),
            Self::Sell => -qty.inner(),
        }
    }

    /// Quote offset direction: bids sit below mid, asks above.
    pub fn offset_sign(&self) -> Decimal {
        match self {
            Self::Buy => Decimal::NEGATIVE_ONE,
            Self::Sell => Decimal::ONE,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// A resting order that exists only inside one member's simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedOrder {
    pub side: OrderSide,
    pub price: Price,
    pub size: Size,
    pub created_at: DateTime<Utc>,
    /// Distance from mid at placement (bps).
    pub distance_at_creation_bps: Decimal,
}

impl SimulatedOrder {
    pub fn new(
        side: OrderSide,
        price: Price,
        size: Size,
        created_at: DateTime<Utc>,
        mid: Price,
    ) -> Self {
        Self {
            side,
            price,
            size,
            created_at,
            distance_at_creation_bps: price.distance_bps(mid),
        }
    }

    /// Current distance from `mid` in basis points.
    pub fn distance_bps(&self, mid: Price) -> Decimal {
        self.price.distance_bps(mid)
    }
}

/// Why a simulated order left the book without filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// Too close to mid.
    Distance,
    /// Too far back in the book queue.
    Queue,
    /// Drifted too far from mid; will be re-placed.
    Rebalance,
    /// Pulled because the market became too volatile.
    Volatility,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Distance => "distance",
            Self::Queue => "queue",
            Self::Rebalance => "rebalance",
            Self::Volatility => "volatility",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_signed_qty() {
        let qty = Size::new(dec!(0.01));
        assert_eq!(OrderSide::Buy.signed(qty), dec!(0.01));
        assert_eq!(OrderSide::Sell.signed(qty), dec!(-0.01));
    }

    #[test]
    fn test_order_records_creation_distance() {
        let order = SimulatedOrder::new(
            OrderSide::Buy,
            Price::new(dec!(49960)),
            Size::new(dec!(0.01)),
            Utc::now(),
            Price::new(dec!(50000)),
        );
        assert_eq!(order.distance_at_creation_bps, dec!(8));
        assert_eq!(order.distance_bps(Price::new(dec!(50000))), dec!(8));
    }

    #[test]
    fn test_cancel_reason_serde() {
        let json = serde_json::to_string(&CancelReason::Rebalance).unwrap();
        assert_eq!(json, "\"rebalance\"");
        assert_eq!(CancelReason::Queue.to_string(), "queue");
    }
}
