//! Fund-transfer collaborator port
//!
//! The matching core never touches account balances directly; it hands the
//! surrounding chain's bank module grouped transfers. A grouped transfer is
//! atomic: either every input is debited and every output credited, or
//! nothing changes.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use types::prelude::*;

/// Bank collaborator
pub trait Bank {
    /// Balance of `denom` the address can spend right now
    fn spendable_balance(&self, address: &Address, denom: &str) -> Decimal;

    /// Atomic multi-party transfer; total input must equal total output per
    /// denom
    fn transfer_grouped(
        &mut self,
        inputs: &[(Address, Coins)],
        outputs: &[(Address, Coins)],
    ) -> Result<()>;
}

/// In-memory bank used by tests and simulations
#[derive(Debug, Clone, Default)]
pub struct MemBank {
    balances: BTreeMap<Address, BTreeMap<String, Decimal>>,
}

impl MemBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, address: &Address, denom: &str, amount: Decimal) {
        *self
            .balances
            .entry(address.clone())
            .or_default()
            .entry(denom.to_string())
            .or_insert(Decimal::ZERO) += amount;
    }

    pub fn balance_of(&self, address: &Address, denom: &str) -> Decimal {
        self.balances
            .get(address)
            .and_then(|denoms| denoms.get(denom))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Sum of one denom over every account; constant across matching passes
    pub fn total_supply(&self, denom: &str) -> Decimal {
        self.balances
            .values()
            .filter_map(|denoms| denoms.get(denom))
            .sum()
    }
}

impl Bank for MemBank {
    fn spendable_balance(&self, address: &Address, denom: &str) -> Decimal {
        self.balance_of(address, denom)
    }

    fn transfer_grouped(
        &mut self,
        inputs: &[(Address, Coins)],
        outputs: &[(Address, Coins)],
    ) -> Result<()> {
        // Validate everything before mutating anything.
        let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
        for (address, coins) in inputs {
            for coin in coins.iter() {
                *totals.entry(coin.denom.clone()).or_insert(Decimal::ZERO) += coin.amount;
                let available = self.balance_of(address, &coin.denom);
                if available < coins.amount_of(&coin.denom) {
                    return Err(ExchangeError::InsufficientFunds {
                        denom: coin.denom.clone(),
                        required: coins.amount_of(&coin.denom).to_string(),
                        available: available.to_string(),
                    });
                }
            }
        }
        for (_, coins) in outputs {
            for coin in coins.iter() {
                *totals.entry(coin.denom.clone()).or_insert(Decimal::ZERO) -= coin.amount;
            }
        }
        if totals.values().any(|total| !total.is_zero()) {
            return Err(ExchangeError::internal(
                "unbalanced grouped transfer".to_string(),
            ));
        }

        for (address, coins) in inputs {
            for coin in coins.iter() {
                let entry = self
                    .balances
                    .entry(address.clone())
                    .or_default()
                    .entry(coin.denom.clone())
                    .or_insert(Decimal::ZERO);
                *entry -= coin.amount;
            }
        }
        for (address, coins) in outputs {
            for coin in coins.iter() {
                let entry = self
                    .balances
                    .entry(address.clone())
                    .or_default()
                    .entry(coin.denom.clone())
                    .or_insert(Decimal::ZERO);
                *entry += coin.amount;
            }
        }
        Ok(())
    }
}
