//! Public operation surface of the exchange
//!
//! `Exchange` owns the store, the bank collaborator, and the registered
//! order sources, and exposes one method per exchange operation. Every
//! state-changing operation is all-or-nothing: it stages writes on an
//! overlay and commits only after settlement succeeds.

use crate::bank::Bank;
use crate::book::{construct_book_side, OrderBookSideOptions};
use crate::events::Event;
use crate::matching::batch::run_batch;
use crate::matching::continuous::run_continuous_matching;
use crate::matching::{finalize_matching, MatchingContext};
use crate::settlement::Escrow;
use crate::source::{OrderSource, SourceRegistry};
use crate::state;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use store::{apply_writes, Overlay, Store};
use types::prelude::*;

/// Block-level execution context supplied by the surrounding chain
#[derive(Debug, Clone, Copy)]
pub struct BlockContext {
    pub height: i64,
    /// Block time in unix nanoseconds
    pub time_unix_nanos: i64,
}

/// Engine-wide parameters
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Account receiving (and funding, for rebates) all fees
    pub fee_collector: Address,
    pub default_maker_fee_rate: Decimal,
    pub default_taker_fee_rate: Decimal,
    pub default_order_source_fee_ratio: Decimal,
    /// Price-level cap applied when materializing any book side
    pub max_num_price_levels: usize,
    /// Upper bound on an order's requested lifespan
    pub max_order_lifespan_nanos: i64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            fee_collector: Address::new("exchange/fee_collector"),
            default_maker_fee_rate: Decimal::from_str_exact("0.0015").unwrap_or(Decimal::ZERO),
            default_taker_fee_rate: Decimal::from_str_exact("0.003").unwrap_or(Decimal::ZERO),
            default_order_source_fee_ratio: Decimal::from_str_exact("0.5")
                .unwrap_or(Decimal::ZERO),
            max_num_price_levels: 200,
            // 7 days
            max_order_lifespan_nanos: 7 * 24 * 60 * 60 * 1_000_000_000,
        }
    }
}

/// Result of a quote-only swap simulation
#[derive(Debug, Clone, PartialEq)]
pub struct SwapQuote {
    pub executed_quantity: Quantity,
    pub paid: Coin,
    /// Received amount net of the taker fee
    pub received: Coin,
    pub fee: Coin,
    pub last_price: Option<Price>,
}

/// The spot exchange matching engine
pub struct Exchange<S: Store, B: Bank> {
    store: S,
    bank: B,
    sources: SourceRegistry,
    config: ExchangeConfig,
}

impl<S: Store, B: Bank> Exchange<S, B> {
    pub fn new(store: S, bank: B, config: ExchangeConfig) -> Self {
        Self {
            store,
            bank,
            sources: SourceRegistry::new(),
            config,
        }
    }

    /// Register a synthetic liquidity source; names must be unique
    pub fn register_source(&mut self, source: Box<dyn OrderSource>) {
        self.sources.register(source);
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn market(&self, market_id: MarketId) -> Result<Market> {
        state::get_market(&self.store, market_id)
    }

    pub fn market_state(&self, market_id: MarketId) -> Result<MarketState> {
        state::get_market_state(&self.store, market_id)
    }

    pub fn order(&self, order_id: OrderId) -> Result<Order> {
        state::get_order(&self.store, order_id)
    }

    /// Resting orders an account has in a market, in order id order
    pub fn open_orders(&self, orderer: &Address, market_id: MarketId) -> Result<Vec<Order>> {
        state::orderer_order_ids(&self.store, orderer, market_id)
            .into_iter()
            .map(|id| state::get_order(&self.store, id))
            .collect()
    }

    /// Create a market for a base/quote pair with the default fee rates
    pub fn create_market(
        &mut self,
        base_denom: &str,
        quote_denom: &str,
    ) -> Result<(Market, Vec<Event>)> {
        for existing in state::iter_markets(&self.store)? {
            if existing.base_denom == base_denom && existing.quote_denom == quote_denom {
                return Err(ExchangeError::invalid_request(format!(
                    "market {} already lists {base_denom}/{quote_denom}",
                    existing.id
                )));
            }
        }
        let id = state::last_market_id(&self.store)?.next();
        let market = Market::new(
            id,
            base_denom,
            quote_denom,
            self.config.default_maker_fee_rate,
            self.config.default_taker_fee_rate,
            self.config.default_order_source_fee_ratio,
        )?;
        state::set_last_market_id(&mut self.store, id);
        state::set_market(&mut self.store, &market)?;
        state::set_market_state(&mut self.store, id, &MarketState::default())?;
        tracing::info!(market_id = %id, base = base_denom, quote = quote_denom, "market created");
        let event = Event::MarketCreated {
            market_id: id,
            base_denom: base_denom.to_string(),
            quote_denom: quote_denom.to_string(),
        };
        Ok((market, vec![event]))
    }

    /// Update a market's governance-mutable fee parameters
    pub fn update_market_fees(
        &mut self,
        market_id: MarketId,
        maker_fee_rate: Decimal,
        taker_fee_rate: Decimal,
        order_source_fee_ratio: Decimal,
    ) -> Result<Vec<Event>> {
        let mut market = state::get_market(&self.store, market_id)?;
        validate_fee_rates(maker_fee_rate, taker_fee_rate, order_source_fee_ratio)?;
        market.maker_fee_rate = maker_fee_rate;
        market.taker_fee_rate = taker_fee_rate;
        market.order_source_fee_ratio = order_source_fee_ratio;
        state::set_market(&mut self.store, &market)?;
        Ok(vec![Event::MarketFeesUpdated {
            market_id,
            maker_fee_rate,
            taker_fee_rate,
            order_source_fee_ratio,
        }])
    }

    /// Place a limit order: match continuously on arrival, rest the remainder
    #[allow(clippy::too_many_arguments)]
    pub fn place_limit_order(
        &mut self,
        blk: &BlockContext,
        orderer: &Address,
        market_id: MarketId,
        is_buy: bool,
        price: Price,
        quantity: Quantity,
        lifespan_nanos: i64,
    ) -> Result<(OrderId, Vec<Event>)> {
        let (market, order) =
            self.validate_order(blk, orderer, market_id, is_buy, price, quantity, lifespan_nanos)?;

        let mut overlay = Overlay::new(&self.store);
        let order = Order {
            id: state::next_order_id(&mut overlay)?,
            order_type: OrderType::Limit,
            ..order
        };
        state::set_order(&mut overlay, &order)?;
        state::index_order(&mut overlay, &order);

        let market_state = state::get_market_state(&overlay, market_id)?;
        let mut ctx = MatchingContext::new(
            market.clone(),
            market_state.last_price,
            self.config.fee_collector.clone(),
        );
        // Lock the deposit; finalize nets refunds and proceeds against it.
        ctx.escrow
            .credit(orderer, market.pay_denom(is_buy), -order.remaining_deposit);
        let taker_idx = ctx.add_user_order(&order);

        let opts = OrderBookSideOptions {
            is_buy: !is_buy,
            price_limit: Some(price),
            quantity_limit: Some(quantity),
            quote_limit: None,
            max_num_price_levels: self.config.max_num_price_levels,
        };
        let side = construct_book_side(&mut ctx, &overlay, &self.sources, &opts)?;
        run_continuous_matching(&mut ctx, &side, taker_idx, Some(quantity), None);

        let executed_quantity = ctx.mem_orders[taker_idx].executed_quantity;
        ctx.events.push(Event::OrderPlaced {
            order_id: order.id,
            market_id,
            orderer: orderer.clone(),
            is_buy,
            price,
            quantity,
            executed_quantity,
        });
        tracing::debug!(
            order_id = %order.id,
            market_id = %market_id,
            %executed_quantity,
            "limit order placed"
        );

        let order_id = order.id;
        let events = finalize_matching(
            ctx,
            &mut overlay,
            &mut self.bank,
            &mut self.sources,
            blk.height,
        )?;
        let writes = overlay.into_writes();
        apply_writes(&mut self.store, writes);
        Ok((order_id, events))
    }

    /// Place a batch order: rest immediately, clear in the next batch pass
    #[allow(clippy::too_many_arguments)]
    pub fn place_batch_order(
        &mut self,
        blk: &BlockContext,
        orderer: &Address,
        market_id: MarketId,
        is_buy: bool,
        price: Price,
        quantity: Quantity,
        lifespan_nanos: i64,
    ) -> Result<(OrderId, Vec<Event>)> {
        let (market, order) =
            self.validate_order(blk, orderer, market_id, is_buy, price, quantity, lifespan_nanos)?;

        let mut overlay = Overlay::new(&self.store);
        let order = Order {
            id: state::next_order_id(&mut overlay)?,
            order_type: OrderType::Batch,
            ..order
        };
        state::set_order(&mut overlay, &order)?;
        state::index_order(&mut overlay, &order);

        let deposit = Coins::from_coin(Coin::new(
            market.pay_denom(is_buy),
            order.remaining_deposit,
        ));
        self.bank.transfer_grouped(
            &[(orderer.clone(), deposit.clone())],
            &[(market.escrow_address.clone(), deposit)],
        )?;
        let writes = overlay.into_writes();
        apply_writes(&mut self.store, writes);

        let events = vec![Event::OrderPlaced {
            order_id: order.id,
            market_id,
            orderer: orderer.clone(),
            is_buy,
            price,
            quantity,
            executed_quantity: Quantity::zero(),
        }];
        Ok((order.id, events))
    }

    /// Cancel one resting order; rejected in the block it was placed
    pub fn cancel_order(
        &mut self,
        blk: &BlockContext,
        sender: &Address,
        order_id: OrderId,
    ) -> Result<Vec<Event>> {
        let order = state::get_order(&self.store, order_id)?;
        if &order.orderer != sender {
            return Err(ExchangeError::Unauthorized(format!(
                "order {order_id} does not belong to {sender}"
            )));
        }
        if order.msg_height == blk.height {
            return Err(ExchangeError::invalid_request(
                "cannot cancel an order placed in the same block",
            ));
        }
        let market = state::get_market(&self.store, order.market_id)?;
        let refund = Coin::new(market.pay_denom(order.is_buy), order.remaining_deposit);
        let coins = Coins::from_coin(refund.clone());
        self.bank.transfer_grouped(
            &[(market.escrow_address.clone(), coins.clone())],
            &[(order.orderer.clone(), coins)],
        )?;
        state::remove_order(&mut self.store, &order);
        Ok(vec![Event::OrderCanceled {
            order_id,
            market_id: order.market_id,
            refund,
        }])
    }

    /// Cancel all of the sender's resting orders in a market
    ///
    /// Orders placed in the current block are skipped, mirroring the
    /// same-block guard of single cancels without failing the rest.
    pub fn cancel_all_orders(
        &mut self,
        blk: &BlockContext,
        sender: &Address,
        market_id: MarketId,
    ) -> Result<Vec<Event>> {
        let market = state::get_market(&self.store, market_id)?;
        let order_ids = state::orderer_order_ids(&self.store, sender, market_id);
        let mut overlay = Overlay::new(&self.store);
        let mut escrow = Escrow::new(market.escrow_address.clone());
        let mut events = Vec::new();
        for order_id in order_ids {
            let order = state::get_order(&overlay, order_id)?;
            if order.msg_height == blk.height {
                continue;
            }
            let refund = Coin::new(market.pay_denom(order.is_buy), order.remaining_deposit);
            escrow.credit(&order.orderer, &refund.denom, refund.amount);
            state::remove_order(&mut overlay, &order);
            events.push(Event::OrderCanceled {
                order_id,
                market_id,
                refund,
            });
        }
        let writes = overlay.into_writes();
        escrow.transact(&mut self.bank)?;
        apply_writes(&mut self.store, writes);
        Ok(events)
    }

    /// Cancel and refund every order whose deadline has passed
    ///
    /// Each market's refunds and order removals commit together, so a
    /// failing escrow transfer never strands another market mid-sweep.
    pub fn sweep_expired_orders(&mut self, blk: &BlockContext) -> Result<Vec<Event>> {
        let mut expired: BTreeMap<MarketId, Vec<Order>> = BTreeMap::new();
        for order in state::all_orders(&self.store)? {
            if order.is_expired(blk.time_unix_nanos) {
                expired.entry(order.market_id).or_default().push(order);
            }
        }
        let mut events = Vec::new();
        for (market_id, orders) in expired {
            let market = state::get_market(&self.store, market_id)?;
            let mut overlay = Overlay::new(&self.store);
            let mut escrow = Escrow::new(market.escrow_address.clone());
            for order in orders {
                let refund = Coin::new(market.pay_denom(order.is_buy), order.remaining_deposit);
                escrow.credit(&order.orderer, &refund.denom, refund.amount);
                state::remove_order(&mut overlay, &order);
                events.push(Event::OrderExpired {
                    order_id: order.id,
                    market_id,
                    refund,
                });
            }
            let writes = overlay.into_writes();
            escrow.transact(&mut self.bank)?;
            apply_writes(&mut self.store, writes);
        }
        Ok(events)
    }

    /// Run the per-block batch pass over every market
    ///
    /// Each market runs on its own overlay; a failing market is rolled back,
    /// logged, and reported as an event while the others proceed.
    pub fn run_batch_matching(&mut self, blk: &BlockContext) -> Result<Vec<Event>> {
        let markets = state::iter_markets(&self.store)?;
        let mut events = Vec::new();
        for market in markets {
            match self.run_market_batch(blk, &market) {
                Ok((market_events, writes)) => {
                    apply_writes(&mut self.store, writes);
                    events.extend(market_events);
                }
                Err(err) => {
                    tracing::error!(
                        market_id = %market.id,
                        error = %err,
                        "batch matching failed, market rolled back"
                    );
                    events.push(Event::BatchMatchingFailed {
                        market_id: market.id,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(events)
    }

    fn run_market_batch(
        &mut self,
        blk: &BlockContext,
        market: &Market,
    ) -> Result<(Vec<Event>, Vec<(Vec<u8>, Option<Vec<u8>>)>)> {
        let mut overlay = Overlay::new(&self.store);
        let market_state = state::get_market_state(&overlay, market.id)?;
        let mut ctx = MatchingContext::new(
            market.clone(),
            market_state.last_price,
            self.config.fee_collector.clone(),
        );
        run_batch(
            &mut ctx,
            &overlay,
            &self.sources,
            self.config.max_num_price_levels,
        )?;
        if !ctx.matched {
            return Ok((Vec::new(), Vec::new()));
        }
        let events = finalize_matching(
            ctx,
            &mut overlay,
            &mut self.bank,
            &mut self.sources,
            blk.height,
        )?;
        Ok((events, overlay.into_writes()))
    }

    /// Expiry sweep followed by batch matching; call at the start of a block
    pub fn begin_block(&mut self, blk: &BlockContext) -> Result<Vec<Event>> {
        let mut events = self.sweep_expired_orders(blk)?;
        events.extend(self.run_batch_matching(blk)?);
        Ok(events)
    }

    /// Simulate a swap without touching state
    ///
    /// Returns `NoLiquidity` when nothing would execute, so routing callers
    /// can distinguish an empty book from a failure.
    pub fn quote_swap(
        &self,
        market_id: MarketId,
        is_buy: bool,
        price_limit: Option<Price>,
        quantity_limit: Option<Quantity>,
        quote_limit: Option<Decimal>,
    ) -> Result<SwapQuote> {
        let market = state::get_market(&self.store, market_id)?;
        if quantity_limit.is_none() && quote_limit.is_none() {
            return Err(ExchangeError::invalid_request(
                "either a quantity or a quote limit is required",
            ));
        }
        let market_state = state::get_market_state(&self.store, market_id)?;
        let mut ctx = MatchingContext::new(
            market.clone(),
            market_state.last_price,
            self.config.fee_collector.clone(),
        );
        let taker_quantity = quantity_limit.unwrap_or_else(|| Quantity::from_u64(u64::MAX));
        let taker_idx = ctx.add_simulated_taker(is_buy, taker_quantity);
        let opts = OrderBookSideOptions {
            is_buy: !is_buy,
            price_limit,
            quantity_limit,
            quote_limit,
            max_num_price_levels: self.config.max_num_price_levels,
        };
        let side = construct_book_side(&mut ctx, &self.store, &self.sources, &opts)?;
        run_continuous_matching(&mut ctx, &side, taker_idx, quantity_limit, quote_limit);

        let taker = &ctx.mem_orders[taker_idx];
        if taker.executed_quantity.is_zero() {
            return Err(ExchangeError::NoLiquidity);
        }
        let fee = taker.fee.ceil();
        Ok(SwapQuote {
            executed_quantity: taker.executed_quantity,
            paid: Coin::new(market.pay_denom(is_buy), taker.paid),
            received: Coin::new(market.receive_denom(is_buy), taker.received - fee),
            fee: Coin::new(market.receive_denom(is_buy), fee),
            last_price: ctx.last_price,
        })
    }

    /// Shared placement validation; returns the market and an unpersisted
    /// order with a zero id
    #[allow(clippy::too_many_arguments)]
    fn validate_order(
        &self,
        blk: &BlockContext,
        orderer: &Address,
        market_id: MarketId,
        is_buy: bool,
        price: Price,
        quantity: Quantity,
        lifespan_nanos: i64,
    ) -> Result<(Market, Order)> {
        let market = state::get_market(&self.store, market_id)?;
        if quantity.is_zero() {
            return Err(ExchangeError::invalid_request(
                "order quantity must be positive",
            ));
        }
        tick_at_price(price)?;
        if lifespan_nanos <= 0 || lifespan_nanos > self.config.max_order_lifespan_nanos {
            return Err(ExchangeError::invalid_request(format!(
                "order lifespan must be in (0, {}] nanoseconds",
                self.config.max_order_lifespan_nanos
            )));
        }
        // Reject order values the decimal type cannot represent.
        price
            .as_decimal()
            .checked_mul(quantity.as_decimal())
            .ok_or_else(|| ExchangeError::invalid_request("order value overflows"))?;

        let order = Order::new(
            OrderId::new(0),
            OrderType::Limit,
            orderer.clone(),
            market_id,
            is_buy,
            price,
            quantity,
            blk.height,
            blk.time_unix_nanos + lifespan_nanos,
        );
        let pay_denom = market.pay_denom(is_buy);
        let available = self.bank.spendable_balance(orderer, pay_denom);
        if available < order.remaining_deposit {
            return Err(ExchangeError::InsufficientFunds {
                denom: pay_denom.to_string(),
                required: order.remaining_deposit.to_string(),
                available: available.to_string(),
            });
        }
        Ok((market, order))
    }
}
