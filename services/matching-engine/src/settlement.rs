//! Escrow ledger
//!
//! During a matching pass every fund movement is recorded as a signed delta
//! against the market's escrow account: positive means the address is owed
//! by the escrow, negative means it owes the escrow. At the end of the pass
//! the ledger nets into at most two grouped bank transfers, one collecting
//! everything owed to the escrow and one paying everything out, so the
//! number of transfers is bounded regardless of how many fills happened.

use crate::bank::Bank;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use types::prelude::*;

/// Signed per-address, per-denom deltas against one escrow account
#[derive(Debug, Clone)]
pub struct Escrow {
    escrow_address: Address,
    deltas: BTreeMap<Address, BTreeMap<String, Decimal>>,
}

impl Escrow {
    pub fn new(escrow_address: Address) -> Self {
        Self {
            escrow_address,
            deltas: BTreeMap::new(),
        }
    }

    /// Record a delta: positive = the escrow owes `address`, negative = the
    /// address owes the escrow
    pub fn credit(&mut self, address: &Address, denom: &str, amount: Decimal) {
        if amount.is_zero() {
            return;
        }
        *self
            .deltas
            .entry(address.clone())
            .or_default()
            .entry(denom.to_string())
            .or_insert(Decimal::ZERO) += amount;
    }

    pub fn is_empty(&self) -> bool {
        self.deltas
            .values()
            .all(|denoms| denoms.values().all(|amount| amount.is_zero()))
    }

    /// Net delta recorded for an address in a denom
    pub fn delta_of(&self, address: &Address, denom: &str) -> Decimal {
        self.deltas
            .get(address)
            .and_then(|denoms| denoms.get(denom))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Flush the ledger through the bank
    ///
    /// Collections run before payouts so the escrow is funded when it pays.
    /// A payout failure after a successful collection means the escrow's
    /// custody accounting is broken and surfaces as `Internal`.
    pub fn transact<B: Bank + ?Sized>(self, bank: &mut B) -> Result<()> {
        let mut collect_inputs: Vec<(Address, Coins)> = Vec::new();
        let mut collect_total = Coins::new();
        let mut payout_outputs: Vec<(Address, Coins)> = Vec::new();
        let mut payout_total = Coins::new();

        for (address, denoms) in &self.deltas {
            let mut owes = Coins::new();
            let mut owed = Coins::new();
            for (denom, amount) in denoms {
                if amount.is_sign_negative() {
                    owes.add(denom, -amount);
                } else {
                    owed.add(denom, *amount);
                }
            }
            if !owes.is_empty() {
                for coin in owes.iter() {
                    collect_total.add(&coin.denom, coin.amount);
                }
                collect_inputs.push((address.clone(), owes));
            }
            if !owed.is_empty() {
                for coin in owed.iter() {
                    payout_total.add(&coin.denom, coin.amount);
                }
                payout_outputs.push((address.clone(), owed));
            }
        }

        if !collect_inputs.is_empty() {
            bank.transfer_grouped(
                &collect_inputs,
                &[(self.escrow_address.clone(), collect_total)],
            )?;
        }
        if !payout_outputs.is_empty() {
            bank.transfer_grouped(&[(self.escrow_address, payout_total)], &payout_outputs)
                .map_err(|e| ExchangeError::internal(format!("escrow payout failed: {e}")))?;
        }
        Ok(())
    }
}
