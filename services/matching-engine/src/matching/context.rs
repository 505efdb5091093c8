//! Per-pass matching context
//!
//! Owns the arena of working orders, the escrow ledger, the running last
//! price, and the events produced so far. Both matching paths mutate only
//! the context; nothing touches storage until finalize.

use crate::book::MemOrder;
use crate::events::Event;
use crate::settlement::Escrow;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use types::prelude::*;

pub struct MatchingContext {
    pub market: Market,
    pub fee_collector: Address,
    pub mem_orders: Vec<MemOrder>,
    pub escrow: Escrow,
    pub events: Vec<Event>,
    /// Price of the most recent fill; starts at the market's persisted last
    /// price
    pub last_price: Option<Price>,
    pub matched: bool,
}

impl MatchingContext {
    pub fn new(market: Market, last_price: Option<Price>, fee_collector: Address) -> Self {
        let escrow = Escrow::new(market.escrow_address.clone());
        Self {
            market,
            fee_collector,
            mem_orders: Vec::new(),
            escrow,
            events: Vec::new(),
            last_price,
            matched: false,
        }
    }

    pub fn add_user_order(&mut self, order: &Order) -> usize {
        self.mem_orders.push(MemOrder::from_order(order));
        self.mem_orders.len() - 1
    }

    pub fn add_source_order(
        &mut self,
        source_name: &str,
        orderer: Address,
        is_buy: bool,
        price: Price,
        quantity: Quantity,
    ) -> usize {
        self.mem_orders.push(MemOrder::from_source(
            source_name,
            orderer,
            is_buy,
            price,
            quantity,
        ));
        self.mem_orders.len() - 1
    }

    pub fn add_simulated_taker(&mut self, is_buy: bool, quantity: Quantity) -> usize {
        self.mem_orders.push(MemOrder::simulated_taker(is_buy, quantity));
        self.mem_orders.len() - 1
    }

    /// Total executable quantity over a set of arena indices
    pub fn executable_sum(&self, indices: &[usize]) -> Quantity {
        indices.iter().fold(Quantity::zero(), |acc, &idx| {
            acc + self.mem_orders[idx].executable_quantity()
        })
    }

    /// Fill a single order and advance the running last price
    pub fn fill_order(
        &mut self,
        idx: usize,
        quantity: Quantity,
        price: Price,
        is_maker: bool,
        half_fees: bool,
    ) {
        let order = &mut self.mem_orders[idx];
        let fee_rate = self
            .market
            .fee_rate(order.is_source(), is_maker, half_fees);
        order.fill(quantity, price, fee_rate);
        self.last_price = Some(price);
        self.matched = true;
    }

    /// Fill `quantity` across the orders of one price level
    ///
    /// When the level cannot fill entirely, each order gets the floor of its
    /// proportional share and the integer remainder goes out one unit block
    /// at a time in remainder priority order (larger orders first).
    pub fn fill_orders(
        &mut self,
        indices: &[usize],
        quantity: Quantity,
        price: Price,
        is_maker: bool,
        half_fees: bool,
    ) {
        let total = self.executable_sum(indices);
        debug_assert!(quantity <= total);
        if quantity >= total {
            for &idx in indices {
                let executable = self.mem_orders[idx].executable_quantity();
                if !executable.is_zero() {
                    self.fill_order(idx, executable, price, is_maker, half_fees);
                }
            }
            return;
        }

        let total_units = total.as_decimal().to_u128().unwrap_or(u128::MAX);
        let quantity_units = quantity.as_decimal().to_u128().unwrap_or(0);
        let mut remainder = quantity_units;
        // (arena index, allocated units, executable units)
        let mut allocations: Vec<(usize, u128, u128)> = Vec::with_capacity(indices.len());
        for &idx in indices {
            let executable = self.mem_orders[idx].executable_quantity();
            let executable_units = executable.as_decimal().to_u128().unwrap_or(0);
            let share = quantity_units
                .checked_mul(executable_units)
                .map(|product| product / total_units)
                .unwrap_or_else(|| {
                    // Quantities too large for exact integer math: fall back
                    // to decimal division, still deterministic.
                    let ratio = executable.as_decimal() / total.as_decimal();
                    (quantity.as_decimal() * ratio)
                        .floor()
                        .to_u128()
                        .unwrap_or(0)
                })
                .min(executable_units)
                .min(remainder);
            remainder -= share;
            allocations.push((idx, share, executable_units));
        }

        if remainder > 0 {
            let mut priority: Vec<usize> = (0..allocations.len()).collect();
            priority.sort_by(|&a, &b| {
                self.mem_orders[allocations[a].0]
                    .cmp_remainder_priority(&self.mem_orders[allocations[b].0])
            });
            for slot in priority {
                if remainder == 0 {
                    break;
                }
                let (_, allocated, executable) = &mut allocations[slot];
                let extra = remainder.min(*executable - *allocated);
                *allocated += extra;
                remainder -= extra;
            }
        }

        for (idx, allocated, _) in allocations {
            if allocated == 0 {
                continue;
            }
            let Some(value) = Decimal::from_u128(allocated) else {
                continue;
            };
            if let Ok(fill_quantity) = Quantity::try_new(value) {
                self.fill_order(idx, fill_quantity, price, is_maker, half_fees);
            }
        }
    }
}
