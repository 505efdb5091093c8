//! Write-back and settlement after a matching pass
//!
//! Applies the arena's accumulated fills to storage, records every fund
//! movement on the escrow ledger, notifies order sources, updates the
//! market state, and flushes the ledger through the bank. Runs against an
//! overlay store, so any error discards the whole pass.

use crate::bank::Bank;
use crate::book::MemOrderOrigin;
use crate::events::Event;
use crate::matching::context::MatchingContext;
use crate::source::{ExecutionResult, SourceRegistry};
use crate::state;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use store::Store;
use types::prelude::*;

/// Finalize one matching pass, returning the events it produced
///
/// Fees are charged on received amounts and rounded up in the protocol's
/// favor (`ceil`), so a rebate (negative fee) rounds toward zero. The
/// collector participates in the escrow ledger like any other account,
/// which keeps every denom exactly conserved:
/// `sum(paid) == sum(received net) + sum(fees)` per denom.
pub fn finalize_matching<S: Store, B: Bank + ?Sized>(
    ctx: MatchingContext,
    store: &mut S,
    bank: &mut B,
    sources: &mut SourceRegistry,
    height: i64,
) -> Result<Vec<Event>> {
    let MatchingContext {
        market,
        fee_collector,
        mem_orders,
        mut escrow,
        mut events,
        last_price,
        matched,
    } = ctx;

    let mut source_results: BTreeMap<(String, Address), Vec<ExecutionResult>> = BTreeMap::new();

    for mem in &mem_orders {
        if mem.executed_quantity.is_zero() {
            continue;
        }
        let pay_denom = market.pay_denom(mem.is_buy);
        let receive_denom = market.receive_denom(mem.is_buy);
        let fee = mem.fee.ceil();
        let received_net = mem.received - fee;
        match &mem.origin {
            MemOrderOrigin::User { order } => {
                let mut updated = order.clone();
                updated.open_quantity = mem.open_quantity;
                updated.remaining_deposit = mem.remaining_deposit;
                // An order leaves the book when it has nothing left to give,
                // either by quantity or by deposit.
                let exhausted =
                    updated.open_quantity.is_zero() || updated.executable_quantity().is_zero();
                if exhausted {
                    state::remove_order(store, order);
                    if updated.remaining_deposit > Decimal::ZERO {
                        escrow.credit(&order.orderer, pay_denom, updated.remaining_deposit);
                    }
                } else {
                    state::set_order(store, &updated)?;
                }
                escrow.credit(&order.orderer, receive_denom, received_net);
                escrow.credit(&fee_collector, receive_denom, fee);
                events.push(Event::OrderFilled {
                    order_id: order.id,
                    market_id: market.id,
                    orderer: order.orderer.clone(),
                    executed_quantity: mem.executed_quantity,
                    paid: Coin::new(pay_denom, mem.paid),
                    received: Coin::new(receive_denom, received_net),
                    fee: Coin::new(receive_denom, fee),
                    open_quantity: if exhausted {
                        Quantity::zero()
                    } else {
                        updated.open_quantity
                    },
                });
            }
            MemOrderOrigin::Source {
                source_name,
                orderer,
            } => {
                // Source orders were never deposited; they pay on the spot.
                escrow.credit(orderer, pay_denom, -mem.paid);
                escrow.credit(orderer, receive_denom, received_net);
                escrow.credit(&fee_collector, receive_denom, fee);
                source_results
                    .entry((source_name.clone(), orderer.clone()))
                    .or_default()
                    .push(ExecutionResult {
                        is_buy: mem.is_buy,
                        executed_quantity: mem.executed_quantity,
                        paid: Coin::new(pay_denom, mem.paid),
                        received: Coin::new(receive_denom, received_net),
                        fee: Coin::new(receive_denom, fee),
                    });
            }
        }
    }

    for ((source_name, orderer), results) in &source_results {
        let source = sources.get_mut(source_name).ok_or_else(|| {
            ExchangeError::internal(format!("order source vanished mid-pass: {source_name}"))
        })?;
        source.after_orders_executed(store, &market, orderer, results)?;
        // One aggregated event per side: a source quoting several levels
        // still reports a single execution total per pass.
        for is_buy in [true, false] {
            let mut executed = Quantity::zero();
            let mut paid = Decimal::ZERO;
            let mut received = Decimal::ZERO;
            for result in results.iter().filter(|r| r.is_buy == is_buy) {
                executed += result.executed_quantity;
                paid += result.paid.amount;
                received += result.received.amount;
            }
            if executed.is_zero() {
                continue;
            }
            events.push(Event::OrderSourceOrdersFilled {
                source_name: source_name.clone(),
                market_id: market.id,
                orderer: orderer.clone(),
                is_buy,
                executed_quantity: executed,
                paid: Coin::new(market.pay_denom(is_buy), paid),
                received: Coin::new(market.receive_denom(is_buy), received),
            });
        }
    }

    if matched {
        if let Some(price) = last_price {
            state::set_market_state(
                store,
                market.id,
                &MarketState {
                    last_price: Some(price),
                    last_matching_height: Some(height),
                },
            )?;
            events.push(Event::MarketStateUpdated {
                market_id: market.id,
                last_price: price,
                height,
            });
        }
    }

    escrow.transact(bank)?;
    Ok(events)
}
