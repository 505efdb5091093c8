//! Denominated amounts
//!
//! `Coin` is a single denominated amount; `Coins` is a denom-sorted
//! collection used in grouped bank transfers. Sorting by denom keeps
//! iteration deterministic, which matters because transfer inputs/outputs
//! feed consensus state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single denominated amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: Decimal,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: Decimal) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// A denom-sorted collection of non-negative amounts
///
/// Zero amounts are dropped on insertion so two `Coins` values with the same
/// effective balances always compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(BTreeMap<String, Decimal>);

impl Coins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_coin(coin: Coin) -> Self {
        let mut coins = Self::new();
        coins.add(&coin.denom, coin.amount);
        coins
    }

    /// Add `amount` of `denom`; amounts must be non-negative
    pub fn add(&mut self, denom: &str, amount: Decimal) {
        debug_assert!(!amount.is_sign_negative(), "Coins amounts must not be negative");
        if amount.is_zero() {
            return;
        }
        *self.0.entry(denom.to_string()).or_insert(Decimal::ZERO) += amount;
    }

    pub fn amount_of(&self, denom: &str) -> Decimal {
        self.0.get(denom).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in denom order
    pub fn iter(&self) -> impl Iterator<Item = Coin> + '_ {
        self.0
            .iter()
            .map(|(denom, amount)| Coin::new(denom.clone(), *amount))
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(empty)");
        }
        let parts: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromIterator<Coin> for Coins {
    fn from_iter<I: IntoIterator<Item = Coin>>(iter: I) -> Self {
        let mut coins = Self::new();
        for coin in iter {
            coins.add(&coin.denom, coin.amount);
        }
        coins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coins_merge_and_sort() {
        let mut coins = Coins::new();
        coins.add("uusd", Decimal::from(10));
        coins.add("uatom", Decimal::from(3));
        coins.add("uusd", Decimal::from(5));

        let collected: Vec<Coin> = coins.iter().collect();
        assert_eq!(collected.len(), 2);
        // BTreeMap iteration: uatom before uusd
        assert_eq!(collected[0].denom, "uatom");
        assert_eq!(collected[1].amount, Decimal::from(15));
    }

    #[test]
    fn test_coins_drop_zero() {
        let mut coins = Coins::new();
        coins.add("uusd", Decimal::ZERO);
        assert!(coins.is_empty());
        assert_eq!(coins.amount_of("uusd"), Decimal::ZERO);
    }

    #[test]
    fn test_display() {
        let mut coins = Coins::new();
        coins.add("uusd", Decimal::from(10));
        coins.add("uatom", Decimal::from(3));
        assert_eq!(coins.to_string(), "3uatom,10uusd");
    }
}
