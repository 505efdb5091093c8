//! Batch matching
//!
//! Once per block, each market's resting orders (plus source liquidity)
//! clear in a single pass. A market with no trade history clears everything
//! at one fair price derived from the deepest crossing levels. A market with
//! a last price runs two phases: first every order crossing the last price
//! trades at it with halved fees, then the remaining crossed levels match
//! directionally, with the price-setting side treated as maker.

use crate::book::{construct_book_side, OrderBookSide, OrderBookSideOptions};
use crate::matching::context::MatchingContext;
use crate::source::SourceRegistry;
use crate::state;
use rust_decimal::Decimal;
use store::Store;
use types::prelude::*;

/// Run one market's batch pass against the given (overlay) store
pub fn run_batch<S: Store>(
    ctx: &mut MatchingContext,
    store: &S,
    sources: &SourceRegistry,
    max_num_price_levels: usize,
) -> Result<()> {
    let market_id = ctx.market.id;
    // Source liquidity on each side is bounded by the best resting price on
    // the other side, so sources never trade through user orders unseen.
    let best_buy = state::best_resting_price(store, market_id, true)?;
    let best_sell = state::best_resting_price(store, market_id, false)?;
    let buy_opts = OrderBookSideOptions {
        is_buy: true,
        price_limit: best_sell,
        quantity_limit: None,
        quote_limit: None,
        max_num_price_levels,
    };
    let sell_opts = OrderBookSideOptions {
        is_buy: false,
        price_limit: best_buy,
        quantity_limit: None,
        quote_limit: None,
        max_num_price_levels,
    };
    let buys = construct_book_side(ctx, store, sources, &buy_opts)?;
    let sells = construct_book_side(ctx, store, sources, &sell_opts)?;
    if buys.is_empty() || sells.is_empty() {
        return Ok(());
    }

    match ctx.last_price {
        Some(last_price) => match_with_last_price(ctx, &buys, &sells, last_price),
        None => {
            if let Some(clearing_price) = find_clearing_price(ctx, &buys, &sells)? {
                match_at_single_price(ctx, &buys, &sells, clearing_price, true);
            }
        }
    }
    Ok(())
}

/// Fair single clearing price for a market with no trade history
///
/// Walks both sides accumulating volume while the levels still cross; the
/// clearing price is the tick nearest the midpoint of the last crossing
/// level pair (ties round down).
fn find_clearing_price(
    ctx: &MatchingContext,
    buys: &OrderBookSide,
    sells: &OrderBookSide,
) -> Result<Option<Price>> {
    let mut bi = 0;
    let mut si = 0;
    let mut buy_volume = Quantity::zero();
    let mut sell_volume = Quantity::zero();
    let mut last_crossing: Option<(Price, Price)> = None;
    loop {
        while bi < buys.levels.len() && ctx.executable_sum(&buys.levels[bi].order_indices).is_zero()
        {
            bi += 1;
        }
        while si < sells.levels.len()
            && ctx.executable_sum(&sells.levels[si].order_indices).is_zero()
        {
            si += 1;
        }
        let (Some(buy_level), Some(sell_level)) = (buys.levels.get(bi), sells.levels.get(si))
        else {
            break;
        };
        if buy_level.price < sell_level.price {
            break;
        }
        last_crossing = Some((buy_level.price, sell_level.price));
        if buy_volume <= sell_volume {
            buy_volume += ctx.executable_sum(&buy_level.order_indices);
            bi += 1;
        } else {
            sell_volume += ctx.executable_sum(&sell_level.order_indices);
            si += 1;
        }
    }
    match last_crossing {
        None => Ok(None),
        Some((buy_price, sell_price)) => {
            let midpoint = (buy_price.as_decimal() + sell_price.as_decimal()) / Decimal::TWO;
            Ok(Some(price_at_tick(nearest_tick(midpoint))?))
        }
    }
}

fn level_crosses(is_buy: bool, level_price: Price, clearing_price: Price) -> bool {
    if is_buy {
        level_price >= clearing_price
    } else {
        level_price <= clearing_price
    }
}

/// Executable volume of a side at or through a clearing price
fn side_volume_within(ctx: &MatchingContext, side: &OrderBookSide, clearing_price: Price) -> Quantity {
    let mut total = Quantity::zero();
    for level in &side.levels {
        if !level_crosses(side.is_buy, level.price, clearing_price) {
            break;
        }
        total += ctx.executable_sum(&level.order_indices);
    }
    total
}

fn fill_side_at_price(
    ctx: &mut MatchingContext,
    side: &OrderBookSide,
    clearing_price: Price,
    mut remaining: Quantity,
    half_fees: bool,
) {
    for level in &side.levels {
        if remaining.is_zero() {
            break;
        }
        if !level_crosses(side.is_buy, level.price, clearing_price) {
            break;
        }
        let executable = ctx.executable_sum(&level.order_indices);
        if executable.is_zero() {
            continue;
        }
        let take = remaining.min(executable);
        ctx.fill_orders(&level.order_indices, take, clearing_price, false, half_fees);
        remaining = remaining.saturating_sub(take);
    }
}

/// Trade the crossing volume of both sides at one price
///
/// Both sides get taker treatment (no maker/taker asymmetry exists when
/// everything clears simultaneously); source orders keep their rebate.
fn match_at_single_price(
    ctx: &mut MatchingContext,
    buys: &OrderBookSide,
    sells: &OrderBookSide,
    clearing_price: Price,
    half_fees: bool,
) {
    let buy_volume = side_volume_within(ctx, buys, clearing_price);
    let sell_volume = side_volume_within(ctx, sells, clearing_price);
    let matched = buy_volume.min(sell_volume);
    if matched.is_zero() {
        return;
    }
    fill_side_at_price(ctx, buys, clearing_price, matched, half_fees);
    fill_side_at_price(ctx, sells, clearing_price, matched, half_fees);
}

/// Two-phase batch pass anchored on the market's last price
fn match_with_last_price(
    ctx: &mut MatchingContext,
    buys: &OrderBookSide,
    sells: &OrderBookSide,
    last_price: Price,
) {
    // Phase 1: everything crossing the last price clears at it, half fees.
    match_at_single_price(ctx, buys, sells, last_price, true);

    // Phase 2: remaining crossed levels match directionally. When the price
    // moves up the sell level sets the price (and is the maker); when it
    // moves down the buy level does; residual volume at the last price
    // clears with half fees like phase 1.
    let mut bi = 0;
    let mut si = 0;
    loop {
        while bi < buys.levels.len() && ctx.executable_sum(&buys.levels[bi].order_indices).is_zero()
        {
            bi += 1;
        }
        while si < sells.levels.len()
            && ctx.executable_sum(&sells.levels[si].order_indices).is_zero()
        {
            si += 1;
        }
        let (Some(buy_level), Some(sell_level)) = (buys.levels.get(bi), sells.levels.get(si))
        else {
            break;
        };
        if buy_level.price < sell_level.price {
            break;
        }
        let buy_executable = ctx.executable_sum(&buy_level.order_indices);
        let sell_executable = ctx.executable_sum(&sell_level.order_indices);
        let executed = buy_executable.min(sell_executable);
        let buy_indices = buy_level.order_indices.clone();
        let sell_indices = sell_level.order_indices.clone();
        if sell_level.price > last_price {
            let price = sell_level.price;
            ctx.fill_orders(&sell_indices, executed, price, true, false);
            ctx.fill_orders(&buy_indices, executed, price, false, false);
        } else if buy_level.price < last_price {
            let price = buy_level.price;
            ctx.fill_orders(&buy_indices, executed, price, true, false);
            ctx.fill_orders(&sell_indices, executed, price, false, false);
        } else {
            ctx.fill_orders(&buy_indices, executed, last_price, false, true);
            ctx.fill_orders(&sell_indices, executed, last_price, false, true);
        }
    }
}
