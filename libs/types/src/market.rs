//! Market registry entry and per-market matching state

use crate::errors::{ExchangeError, Result};
use crate::ids::{Address, MarketId};
use crate::numeric::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A spot market
///
/// Identity fields (`id`, denoms, escrow address) are immutable once the
/// market is created; the fee fields are governance-mutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub base_denom: String,
    pub quote_denom: String,
    pub escrow_address: Address,
    /// Fee rate applied to a maker's received amount; negative = rebate
    pub maker_fee_rate: Decimal,
    /// Fee rate applied to a taker's received amount; in `[0, 1]`
    pub taker_fee_rate: Decimal,
    /// Fraction of the taker fee paid out to an order source whose synthetic
    /// order matched; in `[0, 1]`
    pub order_source_fee_ratio: Decimal,
}

impl Market {
    pub fn new(
        id: MarketId,
        base_denom: impl Into<String>,
        quote_denom: impl Into<String>,
        maker_fee_rate: Decimal,
        taker_fee_rate: Decimal,
        order_source_fee_ratio: Decimal,
    ) -> Result<Self> {
        let base_denom = base_denom.into();
        let quote_denom = quote_denom.into();
        if base_denom == quote_denom {
            return Err(ExchangeError::invalid_request(format!(
                "base and quote denoms must differ: {base_denom}"
            )));
        }
        validate_fee_rates(maker_fee_rate, taker_fee_rate, order_source_fee_ratio)?;
        Ok(Self {
            id,
            base_denom,
            quote_denom,
            escrow_address: Address::market_escrow(id),
            maker_fee_rate,
            taker_fee_rate,
            order_source_fee_ratio,
        })
    }

    /// Denom an order pays with: quote for buys, base for sells
    pub fn pay_denom(&self, is_buy: bool) -> &str {
        if is_buy {
            &self.quote_denom
        } else {
            &self.base_denom
        }
    }

    /// Denom an order receives: base for buys, quote for sells
    pub fn receive_denom(&self, is_buy: bool) -> &str {
        if is_buy {
            &self.base_denom
        } else {
            &self.quote_denom
        }
    }

    /// Effective fee rate on an order's received amount for one fill
    ///
    /// Order-source orders always get maker treatment: a rebate of
    /// `taker_fee_rate * order_source_fee_ratio`, funded from the taker fee.
    /// `half_fees` applies in batch single-price phases where both sides
    /// arrive simultaneously and no maker/taker asymmetry exists.
    pub fn fee_rate(&self, is_order_source: bool, is_maker: bool, half_fees: bool) -> Decimal {
        let rate = if is_order_source {
            -(self.taker_fee_rate * self.order_source_fee_ratio)
        } else if is_maker {
            self.maker_fee_rate
        } else {
            self.taker_fee_rate
        };
        if half_fees {
            rate / Decimal::TWO
        } else {
            rate
        }
    }
}

/// Bounds check for the governance-mutable fee fields
pub fn validate_fee_rates(
    maker_fee_rate: Decimal,
    taker_fee_rate: Decimal,
    order_source_fee_ratio: Decimal,
) -> Result<()> {
    if taker_fee_rate < Decimal::ZERO || taker_fee_rate > Decimal::ONE {
        return Err(ExchangeError::invalid_request(format!(
            "taker fee rate must be in [0, 1]: {taker_fee_rate}"
        )));
    }
    if maker_fee_rate < -taker_fee_rate || maker_fee_rate > Decimal::ONE {
        return Err(ExchangeError::invalid_request(format!(
            "maker fee rate must be in [-{taker_fee_rate}, 1]: {maker_fee_rate}"
        )));
    }
    if order_source_fee_ratio < Decimal::ZERO || order_source_fee_ratio > Decimal::ONE {
        return Err(ExchangeError::invalid_request(format!(
            "order source fee ratio must be in [0, 1]: {order_source_fee_ratio}"
        )));
    }
    Ok(())
}

/// Mutable per-market matching state
///
/// Created with no last price at market creation; updated by both continuous
/// and batch matching whenever a pass produces at least one trade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub last_price: Option<Price>,
    pub last_matching_height: Option<i64>,
}
