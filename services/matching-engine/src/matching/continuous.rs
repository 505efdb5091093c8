//! Continuous matching
//!
//! An incoming limit order executes against the opposite side level by
//! level, best price first. Resting orders and source orders are makers and
//! trade at their own level price, so the taker gets any price improvement.

use crate::book::OrderBookSide;
use crate::matching::context::MatchingContext;
use rust_decimal::Decimal;
use types::prelude::*;

/// Match the taker at `taker_idx` against a materialized opposite side
///
/// Stops when the side is exhausted, the quantity limit is reached, or the
/// quote limit can no longer buy a whole base unit at the next level price.
pub fn run_continuous_matching(
    ctx: &mut MatchingContext,
    side: &OrderBookSide,
    taker_idx: usize,
    quantity_limit: Option<Quantity>,
    quote_limit: Option<Decimal>,
) {
    let mut remaining_quantity = quantity_limit;
    let mut remaining_quote = quote_limit;
    for level in &side.levels {
        let price = level.price;
        let level_executable = ctx.executable_sum(&level.order_indices);
        if level_executable.is_zero() {
            continue;
        }
        let mut executed = level_executable;
        if let Some(limit) = remaining_quantity {
            executed = executed.min(limit);
        }
        if let Some(limit) = remaining_quote {
            executed = executed.min(quantity_affordable(limit, price));
        }
        if executed.is_zero() {
            break;
        }
        ctx.fill_orders(&level.order_indices, executed, price, true, false);
        ctx.fill_order(taker_idx, executed, price, false, false);
        if let Some(limit) = remaining_quantity.as_mut() {
            *limit = limit.saturating_sub(executed);
            if limit.is_zero() {
                break;
            }
        }
        if let Some(limit) = remaining_quote.as_mut() {
            *limit -= price.as_decimal() * executed.as_decimal();
            if *limit <= Decimal::ZERO {
                break;
            }
        }
    }
}

/// Whole base units a quote amount can buy at a price
fn quantity_affordable(quote: Decimal, price: Price) -> Quantity {
    let units = quote
        .checked_div(price.as_decimal())
        .map(|v| v.floor())
        .unwrap_or(Decimal::MAX);
    if units.is_sign_negative() {
        Quantity::zero()
    } else {
        Quantity::try_new(units).unwrap_or_else(|_| Quantity::zero())
    }
}
