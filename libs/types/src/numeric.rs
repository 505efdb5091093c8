//! Exact decimal types for prices and quantities
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! `Price` is any positive decimal; whether it lies on a valid tick is
//! checked separately by the tick codec at the points that require it.
//! `Quantity` is an integral decimal (whole base units), which keeps the
//! remainder step of partial-fill distribution exact.

use crate::errors::ExchangeError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// A positive execution price
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Create a price, rejecting zero and negative values
    pub fn try_new(value: Decimal) -> Result<Self, ExchangeError> {
        if value <= Decimal::ZERO {
            return Err(ExchangeError::invalid_request(format!(
                "price must be positive: {value}"
            )));
        }
        Ok(Self(value.normalize()))
    }

    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn from_str(s: &str) -> Result<Self, ExchangeError> {
        let value = Decimal::from_str_exact(s)
            .map_err(|e| ExchangeError::invalid_request(format!("invalid price {s:?}: {e}")))?;
        Self::try_new(value)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-negative, integral order quantity in base units
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Create a quantity, rejecting negative and fractional values
    pub fn try_new(value: Decimal) -> Result<Self, ExchangeError> {
        if value.is_sign_negative() {
            return Err(ExchangeError::invalid_request(format!(
                "quantity must not be negative: {value}"
            )));
        }
        let normalized = value.normalize();
        if !normalized.is_integer() {
            return Err(ExchangeError::invalid_request(format!(
                "quantity must be a whole number of base units: {value}"
            )));
        }
        Ok(Self(normalized))
    }

    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn from_str(s: &str) -> Result<Self, ExchangeError> {
        let value = Decimal::from_str_exact(s)
            .map_err(|e| ExchangeError::invalid_request(format!("invalid quantity {s:?}: {e}")))?;
        Self::try_new(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Saturating subtraction; clamps at zero
    pub fn saturating_sub(&self, other: Quantity) -> Quantity {
        if other.0 >= self.0 {
            Quantity(Decimal::ZERO)
        } else {
            Quantity(self.0 - other.0)
        }
    }

    pub fn checked_sub(&self, other: Quantity) -> Option<Quantity> {
        if other.0 > self.0 {
            None
        } else {
            Some(Quantity(self.0 - other.0))
        }
    }

    pub fn min(self, other: Quantity) -> Quantity {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 + rhs.0)
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        self.0 += rhs.0;
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_rejects_non_positive() {
        assert!(Price::try_new(Decimal::ZERO).is_err());
        assert!(Price::from_str("-1.5").is_err());
        assert!(Price::from_str("0.01").is_ok());
    }

    #[test]
    fn test_price_normalizes() {
        // 5.00 and 5 are the same price and must compare/hash equal.
        let a = Price::from_str("5.00").unwrap();
        let b = Price::from_str("5").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_decimal(), b.as_decimal());
    }

    #[test]
    fn test_quantity_rejects_fractional() {
        assert!(Quantity::from_str("1.5").is_err());
        assert!(Quantity::from_str("-3").is_err());
        // "1.0" normalizes to the whole number 1
        assert_eq!(Quantity::from_str("1.0").unwrap(), Quantity::from_u64(1));
    }

    #[test]
    fn test_quantity_arithmetic() {
        let a = Quantity::from_u64(300);
        let b = Quantity::from_u64(200);
        assert_eq!(a + b, Quantity::from_u64(500));
        assert_eq!(a.checked_sub(b), Some(Quantity::from_u64(100)));
        assert_eq!(b.checked_sub(a), None);
        assert_eq!(b.saturating_sub(a), Quantity::zero());
        assert_eq!(a.min(b), b);
    }

    #[test]
    fn test_serialization_round_trip() {
        let p = Price::from_str("123.45").unwrap();
        let json = serde_json::to_string(&p).unwrap();
        let back: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
