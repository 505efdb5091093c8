//! One side of the order book, materialized for a matching pass
//!
//! A side is a price-sorted list of levels (best first), each holding arena
//! indices into the matching context. Construction walks the persisted book
//! index up to the caller's limits and then lets every registered order
//! source contribute ephemeral orders within the same limits.

use crate::matching::context::MatchingContext;
use crate::source::SourceRegistry;
use rust_decimal::Decimal;
use store::Store;
use types::prelude::*;

/// Limits applied while materializing a side
#[derive(Debug, Clone)]
pub struct OrderBookSideOptions {
    /// Which side is being built
    pub is_buy: bool,
    /// Worst acceptable price: a floor for buy sides, a cap for sell sides
    pub price_limit: Option<Price>,
    /// Stop opening new levels once this much quantity is loaded
    pub quantity_limit: Option<Quantity>,
    /// Stop opening new levels once this much quote value is loaded
    pub quote_limit: Option<Decimal>,
    /// Hard cap on the number of price levels
    pub max_num_price_levels: usize,
}

impl OrderBookSideOptions {
    pub fn accepts_price(&self, price: Price) -> bool {
        match self.price_limit {
            None => true,
            Some(limit) => {
                if self.is_buy {
                    price >= limit
                } else {
                    price <= limit
                }
            }
        }
    }
}

/// All orders at one price, in priority order
#[derive(Debug, Clone)]
pub struct PriceLevel {
    pub price: Price,
    /// Arena indices into the matching context
    pub order_indices: Vec<usize>,
}

/// A materialized book side; `levels[0]` is the best price
#[derive(Debug, Clone)]
pub struct OrderBookSide {
    pub is_buy: bool,
    pub levels: Vec<PriceLevel>,
}

impl OrderBookSide {
    pub fn new(is_buy: bool) -> Self {
        Self {
            is_buy,
            levels: Vec::new(),
        }
    }

    /// Insert an order, keeping levels sorted best-price-first
    pub fn add_order(&mut self, price: Price, order_idx: usize) {
        let position = self.levels.binary_search_by(|level| {
            if self.is_buy {
                price.cmp(&level.price)
            } else {
                level.price.cmp(&price)
            }
        });
        match position {
            Ok(i) => self.levels[i].order_indices.push(order_idx),
            Err(i) => self.levels.insert(
                i,
                PriceLevel {
                    price,
                    order_indices: vec![order_idx],
                },
            ),
        }
    }

    pub fn has_level(&self, price: Price) -> bool {
        self.levels.iter().any(|level| level.price == price)
    }

    pub fn best_price(&self) -> Option<Price> {
        self.levels.first().map(|level| level.price)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Materialize one side from the persisted book plus order sources
///
/// Persisted orders load best-price-first until a limit is hit; a level is
/// always loaded whole so distribution within it stays fair. Source orders
/// must land on valid ticks and are dropped silently when they fall outside
/// the side's price limit or would exceed its level/volume limits.
pub fn construct_book_side<S: Store>(
    ctx: &mut MatchingContext,
    store: &S,
    sources: &SourceRegistry,
    opts: &OrderBookSideOptions,
) -> Result<OrderBookSide> {
    let mut side = OrderBookSide::new(opts.is_buy);
    let mut total_quantity = Quantity::zero();
    let mut total_quote = Decimal::ZERO;
    let mut current_level: Option<Price> = None;

    for entry in crate::state::iter_book_side(store, ctx.market.id, opts.is_buy) {
        let (price, order_id) = entry?;
        if !opts.accepts_price(price) {
            break;
        }
        if current_level != Some(price) {
            if side.levels.len() >= opts.max_num_price_levels {
                break;
            }
            if opts.quantity_limit.is_some_and(|q| total_quantity >= q) {
                break;
            }
            if opts.quote_limit.is_some_and(|q| total_quote >= q) {
                break;
            }
            current_level = Some(price);
        }
        let order = crate::state::get_order(store, order_id)?;
        if order.price != price {
            return Err(ExchangeError::internal(format!(
                "book index price disagrees with order {order_id}"
            )));
        }
        let executable = order.executable_quantity();
        if executable.is_zero() {
            continue;
        }
        total_quantity += executable;
        total_quote += price.as_decimal() * executable.as_decimal();
        let idx = ctx.add_user_order(&order);
        side.add_order(price, idx);
    }

    let market = ctx.market.clone();
    for source in sources.iter() {
        let source_name = source.name().to_string();
        let mut create_order = |orderer: Address, price: Price, quantity: Quantity| -> Result<()> {
            if tick_at_price(price).is_err() {
                return Err(ExchangeError::InvalidTickPrice(format!(
                    "order source {source_name} quoted off-tick price {price}"
                )));
            }
            if quantity.is_zero() || !opts.accepts_price(price) {
                return Ok(());
            }
            if !side.has_level(price) {
                if side.levels.len() >= opts.max_num_price_levels {
                    return Ok(());
                }
                if opts.quantity_limit.is_some_and(|q| total_quantity >= q) {
                    return Ok(());
                }
                if opts.quote_limit.is_some_and(|q| total_quote >= q) {
                    return Ok(());
                }
            }
            total_quantity += quantity;
            total_quote += price.as_decimal() * quantity.as_decimal();
            let idx = ctx.add_source_order(&source_name, orderer, opts.is_buy, price, quantity);
            side.add_order(price, idx);
            Ok(())
        };
        source.generate_orders(store, &market, opts, &mut create_order)?;
    }

    Ok(side)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::OrderSource;
    use crate::state;
    use store::MemStore;

    fn unbounded(is_buy: bool) -> OrderBookSideOptions {
        OrderBookSideOptions {
            is_buy,
            price_limit: None,
            quantity_limit: None,
            quote_limit: None,
            max_num_price_levels: 100,
        }
    }

    fn market() -> Market {
        Market::new(
            MarketId::new(1),
            "uatom",
            "uusd",
            Decimal::from_str_exact("0.0015").unwrap(),
            Decimal::from_str_exact("0.003").unwrap(),
            Decimal::from_str_exact("0.5").unwrap(),
        )
        .unwrap()
    }

    fn ctx() -> MatchingContext {
        MatchingContext::new(market(), None, Address::new("collector"))
    }

    fn seed_sell(store: &mut MemStore, id: u64, price: &str, qty: u64) {
        let order = Order::new(
            OrderId::new(id),
            OrderType::Limit,
            Address::new("orderer1"),
            MarketId::new(1),
            false,
            Price::from_str(price).unwrap(),
            Quantity::from_u64(qty),
            1,
            1_000_000,
        );
        state::set_order(store, &order).unwrap();
        state::index_order(store, &order);
    }

    #[test]
    fn test_levels_sorted_best_first() {
        let mut store = MemStore::new();
        seed_sell(&mut store, 1, "5.2", 10);
        seed_sell(&mut store, 2, "5", 10);
        seed_sell(&mut store, 3, "5.1", 10);

        let mut ctx = ctx();
        let side =
            construct_book_side(&mut ctx, &store, &SourceRegistry::new(), &unbounded(false))
                .unwrap();
        let prices: Vec<String> = side.levels.iter().map(|l| l.price.to_string()).collect();
        assert_eq!(prices, vec!["5", "5.1", "5.2"]);
    }

    #[test]
    fn test_price_limit_stops_loading() {
        let mut store = MemStore::new();
        seed_sell(&mut store, 1, "5", 10);
        seed_sell(&mut store, 2, "5.1", 10);
        seed_sell(&mut store, 3, "6", 10);

        let mut ctx = ctx();
        let mut opts = unbounded(false);
        opts.price_limit = Some(Price::from_str("5.1").unwrap());
        let side = construct_book_side(&mut ctx, &store, &SourceRegistry::new(), &opts).unwrap();
        assert_eq!(side.levels.len(), 2);
    }

    #[test]
    fn test_quantity_limit_loads_whole_levels() {
        let mut store = MemStore::new();
        seed_sell(&mut store, 1, "5", 10);
        seed_sell(&mut store, 2, "5", 10);
        seed_sell(&mut store, 3, "5.1", 10);
        seed_sell(&mut store, 4, "5.2", 10);

        let mut ctx = ctx();
        let mut opts = unbounded(false);
        // The 5.00 level alone satisfies the limit; 5.10 never opens.
        opts.quantity_limit = Some(Quantity::from_u64(15));
        let side = construct_book_side(&mut ctx, &store, &SourceRegistry::new(), &opts).unwrap();
        assert_eq!(side.levels.len(), 1);
        assert_eq!(side.levels[0].order_indices.len(), 2);
    }

    struct FixedSource {
        price: Price,
        quantity: Quantity,
    }

    impl OrderSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        fn generate_orders(
            &self,
            _store: &(dyn Store + '_),
            _market: &Market,
            _opts: &OrderBookSideOptions,
            create_order: &mut dyn FnMut(Address, Price, Quantity) -> Result<()>,
        ) -> Result<()> {
            create_order(Address::new("pool1"), self.price, self.quantity)
        }

        fn after_orders_executed(
            &mut self,
            _store: &mut (dyn Store + '_),
            _market: &Market,
            _orderer: &Address,
            _results: &[crate::source::ExecutionResult],
        ) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_source_orders_join_levels() {
        let mut store = MemStore::new();
        seed_sell(&mut store, 1, "5", 10);

        let mut registry = SourceRegistry::new();
        registry.register(Box::new(FixedSource {
            price: Price::from_str("5").unwrap(),
            quantity: Quantity::from_u64(20),
        }));

        let mut ctx = ctx();
        let side = construct_book_side(&mut ctx, &store, &registry, &unbounded(false)).unwrap();
        assert_eq!(side.levels.len(), 1);
        assert_eq!(side.levels[0].order_indices.len(), 2);
    }

    #[test]
    fn test_off_tick_source_price_is_an_error() {
        let store = MemStore::new();
        let mut registry = SourceRegistry::new();
        registry.register(Box::new(FixedSource {
            // 4 significant digits: not a valid tick.
            price: Price::from_str("5.123").unwrap(),
            quantity: Quantity::from_u64(20),
        }));

        let mut ctx = ctx();
        let err =
            construct_book_side(&mut ctx, &store, &registry, &unbounded(false)).unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidTickPrice(_)));
    }

    #[test]
    fn test_source_order_outside_price_limit_is_dropped() {
        let store = MemStore::new();
        let mut registry = SourceRegistry::new();
        registry.register(Box::new(FixedSource {
            price: Price::from_str("6").unwrap(),
            quantity: Quantity::from_u64(20),
        }));

        let mut ctx = ctx();
        let mut opts = unbounded(false);
        opts.price_limit = Some(Price::from_str("5.5").unwrap());
        let side = construct_book_side(&mut ctx, &store, &registry, &opts).unwrap();
        assert!(side.is_empty());
    }
}
