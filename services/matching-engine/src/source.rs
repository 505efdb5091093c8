//! Pluggable synthetic liquidity
//!
//! An order source contributes ephemeral orders to a matching pass without
//! ever resting in the book: it is asked to generate orders when a book side
//! is constructed and notified after matching completes so it can update its
//! own state (an AMM pool adjusting reserves, for example). Source orders
//! are regenerated from current source state every pass.

use crate::book::side::OrderBookSideOptions;
use store::Store;
use types::prelude::*;

/// Aggregated outcome of one source order after a matching pass
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub is_buy: bool,
    pub executed_quantity: Quantity,
    /// Amount the source order paid, in its pay denom
    pub paid: Coin,
    /// Amount received net of fees; sources earn a rebate, so the fee
    /// component is usually negative
    pub received: Coin,
    pub fee: Coin,
}

/// A synthetic liquidity provider
pub trait OrderSource {
    /// Stable unique name; also the tiebreaker between sources during
    /// partial-fill distribution
    fn name(&self) -> &str;

    /// Contribute orders for one side of one market
    ///
    /// `create_order` may be called any number of times with the paying
    /// account, a tick-valid price, and a quantity. Orders that fall outside
    /// the constructed side's limits are silently dropped; an off-tick price
    /// is an error that aborts the whole pass.
    fn generate_orders(
        &self,
        store: &(dyn Store + '_),
        market: &Market,
        opts: &OrderBookSideOptions,
        create_order: &mut dyn FnMut(Address, Price, Quantity) -> Result<()>,
    ) -> Result<()>;

    /// Called once per (market, paying account) after a pass in which any of
    /// this source's orders executed, with the store already reflecting the
    /// pass's order updates
    fn after_orders_executed(
        &mut self,
        store: &mut (dyn Store + '_),
        market: &Market,
        orderer: &Address,
        results: &[ExecutionResult],
    ) -> Result<()>;
}

/// Registered order sources, iterated in registration order
#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<Box<dyn OrderSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source; duplicate names are a programming error
    pub fn register(&mut self, source: Box<dyn OrderSource>) {
        if self.sources.iter().any(|s| s.name() == source.name()) {
            panic!("duplicate order source name: {}", source.name());
        }
        self.sources.push(source);
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn OrderSource> {
        self.sources.iter().map(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn OrderSource + '_)> {
        match self.sources.iter_mut().find(|s| s.name() == name) {
            Some(s) => Some(s.as_mut()),
            None => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedSource(&'static str);

    impl OrderSource for NamedSource {
        fn name(&self) -> &str {
            self.0
        }

        fn generate_orders(
            &self,
            _store: &(dyn Store + '_),
            _market: &Market,
            _opts: &OrderBookSideOptions,
            _create_order: &mut dyn FnMut(Address, Price, Quantity) -> Result<()>,
        ) -> Result<()> {
            Ok(())
        }

        fn after_orders_executed(
            &mut self,
            _store: &mut (dyn Store + '_),
            _market: &Market,
            _orderer: &Address,
            _results: &[ExecutionResult],
        ) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_lookup_by_name() {
        let mut registry = SourceRegistry::new();
        registry.register(Box::new(NamedSource("amm")));
        registry.register(Box::new(NamedSource("rfq")));
        assert!(registry.get_mut("amm").is_some());
        assert!(registry.get_mut("missing").is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate order source name")]
    fn test_duplicate_name_panics() {
        let mut registry = SourceRegistry::new();
        registry.register(Box::new(NamedSource("amm")));
        registry.register(Box::new(NamedSource("amm")));
    }
}
