//! Precision-safe decimal types for simulated quoting.
//!
//! Uses `rust_decimal` for exact decimal arithmetic so that PnL and
//! position accumulate without floating-point drift across a long run.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

/// Basis points per unit (1.0 = 10,000 bps).
pub const BPS_PER_UNIT: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Price with exact decimal precision.
///
/// Wraps `Decimal` to provide type safety and prevent mixing
/// prices with sizes in calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Signed basis points difference from another price.
    #[inline]
    pub fn bps_from(&self, other: Price) -> Option<Decimal> {
        if other.is_zero() {
            return None;
        }
        Some((self.0 - other.0) / other.0 * BPS_PER_UNIT)
    }

    /// Absolute distance from a reference (usually mid) in basis points.
    ///
    /// Returns zero when the reference is zero so callers never divide by it.
    #[inline]
    pub fn distance_bps(&self, reference: Price) -> Decimal {
        self.bps_from(reference).map(|d| d.abs()).unwrap_or(Decimal::ZERO)
    }

    /// Price shifted by `bps` basis points: `self × (1 + bps / 10,000)`.
    ///
    /// Negative `bps` moves the price down (bid side).
    #[inline]
    pub fn offset_bps(&self, bps: Decimal) -> Self {
        Self(self.0 * (Decimal::ONE + bps / BPS_PER_UNIT))
    }

    /// Midpoint of two prices.
    #[inline]
    pub fn midpoint(a: Price, b: Price) -> Self {
        Self((a.0 + b.0) / Decimal::TWO)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Price {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<Decimal> for Price {
    type Output = Self;

    fn div(self, rhs: Decimal) -> Self::Output {
        Self(self.0 / rhs)
    }
}

/// Size/quantity with exact decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Size(pub Decimal);

impl Size {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Calculate notional value: size * price.
    #[inline]
    pub fn notional(&self, price: Price) -> Decimal {
        self.0 * price.0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Size {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Size {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Size {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Size {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_bps() {
        let p1 = Price::new(dec!(100));
        let p2 = Price::new(dec!(101));

        let bps = p2.bps_from(p1).unwrap();
        assert_eq!(bps, dec!(100)); // 1% = 100 bps
        assert!(p2.bps_from(Price::ZERO).is_none());
    }

    #[test]
    fn test_distance_is_absolute() {
        let mid = Price::new(dec!(50000));
        let bid = Price::new(dec!(49960));
        let ask = Price::new(dec!(50040));

        assert_eq!(bid.distance_bps(mid), dec!(8));
        assert_eq!(ask.distance_bps(mid), dec!(8));
        assert_eq!(bid.distance_bps(Price::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_offset_bps() {
        let mid = Price::new(dec!(50000));
        assert_eq!(mid.offset_bps(dec!(-8)).inner(), dec!(49960));
        assert_eq!(mid.offset_bps(dec!(8)).inner(), dec!(50040));
    }

    #[test]
    fn test_midpoint() {
        let mid = Price::midpoint(Price::new(dec!(49999)), Price::new(dec!(50001)));
        assert_eq!(mid.inner(), dec!(50000));
    }

    #[test]
    fn test_notional_calculation() {
        let size = Size::new(dec!(0.5));
        let price = Price::new(dec!(50000));

        assert_eq!(size.notional(price), dec!(25000));
    }
}
