//! Error taxonomy for the matching core
//!
//! Comprehensive error taxonomy using thiserror. Request-validation errors
//! abort a single message; `Internal` indicates a broken storage invariant
//! and is never recovered from silently.

use crate::ids::{MarketId, OrderId};
use thiserror::Error;

/// Top-level exchange error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("market not found: {0}")]
    MarketNotFound(MarketId),

    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("price is not on a valid tick: {0}")]
    InvalidTickPrice(String),

    #[error("insufficient funds: required {required}{denom}, available {available}{denom}")]
    InsufficientFunds {
        denom: String,
        required: String,
        available: String,
    },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Simulated/quote-only calls that find no viable match.
    /// Distinct from a true error so route-quoting callers can branch on it.
    #[error("no liquidity")]
    NoLiquidity,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ExchangeError {
    /// Shorthand for request-validation failures
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Shorthand for invariant violations
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result alias used throughout the exchange crates
pub type Result<T> = std::result::Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExchangeError::MarketNotFound(MarketId::new(9));
        assert_eq!(err.to_string(), "market not found: 9");

        let err = ExchangeError::InsufficientFunds {
            denom: "uatom".into(),
            required: "150".into(),
            available: "100".into(),
        };
        assert!(err.to_string().contains("150uatom"));
        assert!(err.to_string().contains("100uatom"));
    }

    #[test]
    fn test_no_liquidity_is_distinct() {
        assert_ne!(
            ExchangeError::NoLiquidity,
            ExchangeError::invalid_request("no liquidity")
        );
    }
}
