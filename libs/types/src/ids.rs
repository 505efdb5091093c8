//! Identifier types for exchange entities
//!
//! Market and order ids are monotonically increasing sequences assigned from
//! persisted counters, so replaying the same block stream yields the same
//! ids on every validator. Addresses are opaque account strings owned by the
//! surrounding chain; the matching core never inspects their structure.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(u64);

impl MarketId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The next id in the sequence
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Big-endian encoding used as a storage key component
    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an order
///
/// Globally unique across all markets; assigned from a single persisted
/// sequence so order ids double as arrival-time priority within a price
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(u64);

impl OrderId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque account address
///
/// The bank collaborator resolves these to actual accounts; the matching
/// core only uses them as settlement grouping keys, so ordering must be
/// stable (lexicographic on the underlying string).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Deterministic per-market escrow account address
    pub fn market_escrow(market_id: MarketId) -> Self {
        Self(format!("exchange/escrow/{}", market_id))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
