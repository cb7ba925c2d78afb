//! Audit records for every simulated quoting decision.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tick::TopOfBook;
use crate::{OrderSide, Price};

/// What the executor did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationAction {
    Place,
    Cancel,
    Fill,
    Rebalance,
    Pause,
    Resume,
}

impl fmt::Display for OperationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Place => "place",
            Self::Cancel => "cancel",
            Self::Fill => "fill",
            Self::Rebalance => "rebalance",
            Self::Pause => "pause",
            Self::Resume => "resume",
        };
        f.write_str(s)
    }
}

/// One entry in a member's append-only operation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationEntry {
    pub timestamp: DateTime<Utc>,
    pub tick_seq: u64,
    pub action: OperationAction,
    /// `None` for whole-book actions (pause/resume).
    pub side: Option<OrderSide>,
    pub order_price: Option<Price>,
    pub mid_price: Price,
    pub distance_bps: Option<Decimal>,
    /// Human-readable explanation ("distance 3.2bps < cancel 4bps").
    pub reason: String,
    pub top_of_book: TopOfBook,
}

/// Quoting state of one member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotingStatus {
    #[default]
    Active,
    VolatilityPaused,
}

impl fmt::Display for QuotingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::VolatilityPaused => write!(f, "VOLATILITY_PAUSED"),
        }
    }
}
