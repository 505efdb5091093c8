//! Storage schema and typed accessors
//!
//! All consensus state lives under single-byte key prefixes:
//!
//! ```text
//! 0x01 | market_id                                      -> Market
//! 0x02 | market_id                                      -> MarketState
//! 0x03 | order_id                                       -> Order
//! 0x04 | market_id | side | price_bytes | order_id      -> ()   (book index)
//! 0x05 | len(addr) | addr | market_id | order_id        -> ()   (orderer index)
//! 0x06                                                  -> last market id
//! 0x07                                                  -> last order id
//! ```
//!
//! The book index key embeds the order-preserving price encoding, so plain
//! byte iteration visits a side in price order and, within a price, in
//! ascending order id (arrival order). Buy sides are iterated in reverse to
//! get best-price-first.

use store::Store;
use types::prelude::*;

const MARKET_KEY_PREFIX: u8 = 0x01;
const MARKET_STATE_KEY_PREFIX: u8 = 0x02;
const ORDER_KEY_PREFIX: u8 = 0x03;
const BOOK_KEY_PREFIX: u8 = 0x04;
const ORDERER_KEY_PREFIX: u8 = 0x05;
const LAST_MARKET_ID_KEY: [u8; 1] = [0x06];
const LAST_ORDER_ID_KEY: [u8; 1] = [0x07];

const BUY_SIDE_BYTE: u8 = 0x00;
const SELL_SIDE_BYTE: u8 = 0x01;

fn side_byte(is_buy: bool) -> u8 {
    if is_buy {
        BUY_SIDE_BYTE
    } else {
        SELL_SIDE_BYTE
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| ExchangeError::internal(format!("encode: {e}")))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| ExchangeError::internal(format!("decode {what}: {e}")))
}

pub fn market_key(market_id: MarketId) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(MARKET_KEY_PREFIX);
    key.extend_from_slice(&market_id.to_be_bytes());
    key
}

pub fn market_state_key(market_id: MarketId) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(MARKET_STATE_KEY_PREFIX);
    key.extend_from_slice(&market_id.to_be_bytes());
    key
}

pub fn order_key(order_id: OrderId) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(ORDER_KEY_PREFIX);
    key.extend_from_slice(&order_id.to_be_bytes());
    key
}

pub fn book_side_prefix(market_id: MarketId, is_buy: bool) -> Vec<u8> {
    let mut key = Vec::with_capacity(10);
    key.push(BOOK_KEY_PREFIX);
    key.extend_from_slice(&market_id.to_be_bytes());
    key.push(side_byte(is_buy));
    key
}

pub fn book_key(market_id: MarketId, is_buy: bool, price: Price, order_id: OrderId) -> Vec<u8> {
    let mut key = book_side_prefix(market_id, is_buy);
    key.extend_from_slice(&price_to_bytes(price));
    key.extend_from_slice(&order_id.to_be_bytes());
    key
}

pub fn orderer_market_prefix(orderer: &Address, market_id: MarketId) -> Vec<u8> {
    let addr = orderer.as_str().as_bytes();
    let mut key = Vec::with_capacity(10 + addr.len());
    key.push(ORDERER_KEY_PREFIX);
    key.push(addr.len() as u8);
    key.extend_from_slice(addr);
    key.extend_from_slice(&market_id.to_be_bytes());
    key
}

pub fn orderer_key(orderer: &Address, market_id: MarketId, order_id: OrderId) -> Vec<u8> {
    let mut key = orderer_market_prefix(orderer, market_id);
    key.extend_from_slice(&order_id.to_be_bytes());
    key
}

// Book key layout: prefix(1) + market(8) + side(1) + price(32) + order(8).
const BOOK_KEY_LEN: usize = 50;
const BOOK_PRICE_OFFSET: usize = 10;
const BOOK_ORDER_ID_OFFSET: usize = 42;

fn parse_book_key(key: &[u8]) -> Result<(Price, OrderId)> {
    if key.len() != BOOK_KEY_LEN {
        return Err(ExchangeError::internal(format!(
            "malformed book index key of length {}",
            key.len()
        )));
    }
    let price = bytes_to_price(&key[BOOK_PRICE_OFFSET..BOOK_ORDER_ID_OFFSET])?;
    let mut id_bytes = [0u8; 8];
    id_bytes.copy_from_slice(&key[BOOK_ORDER_ID_OFFSET..]);
    Ok((price, OrderId::new(u64::from_be_bytes(id_bytes))))
}

fn get_seq<S: Store + ?Sized>(store: &S, key: &[u8]) -> Result<u64> {
    match store.get(key) {
        None => Ok(0),
        Some(bytes) => {
            let arr: [u8; 8] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| ExchangeError::internal("malformed sequence counter"))?;
            Ok(u64::from_be_bytes(arr))
        }
    }
}

/// Last assigned market id; zero when no market exists yet
pub fn last_market_id<S: Store + ?Sized>(store: &S) -> Result<MarketId> {
    Ok(MarketId::new(get_seq(store, &LAST_MARKET_ID_KEY)?))
}

pub fn set_last_market_id<S: Store + ?Sized>(store: &mut S, id: MarketId) {
    store.set(&LAST_MARKET_ID_KEY, &id.to_be_bytes());
}

/// Allocate the next order id from the global sequence
pub fn next_order_id<S: Store + ?Sized>(store: &mut S) -> Result<OrderId> {
    let id = OrderId::new(get_seq(store, &LAST_ORDER_ID_KEY)? + 1);
    store.set(&LAST_ORDER_ID_KEY, &id.to_be_bytes());
    Ok(id)
}

pub fn get_market<S: Store + ?Sized>(store: &S, market_id: MarketId) -> Result<Market> {
    let bytes = store
        .get(&market_key(market_id))
        .ok_or(ExchangeError::MarketNotFound(market_id))?;
    decode(&bytes, "market")
}

pub fn set_market<S: Store + ?Sized>(store: &mut S, market: &Market) -> Result<()> {
    let bytes = encode(market)?;
    store.set(&market_key(market.id), &bytes);
    Ok(())
}

/// All markets in id order
pub fn iter_markets<S: Store + ?Sized>(store: &S) -> Result<Vec<Market>> {
    store
        .iter_prefix(&[MARKET_KEY_PREFIX])
        .map(|(_, value)| decode(&value, "market"))
        .collect()
}

pub fn get_market_state<S: Store + ?Sized>(store: &S, market_id: MarketId) -> Result<MarketState> {
    let bytes = store.get(&market_state_key(market_id)).ok_or_else(|| {
        ExchangeError::internal(format!("market state missing for market {market_id}"))
    })?;
    decode(&bytes, "market state")
}

pub fn set_market_state<S: Store + ?Sized>(
    store: &mut S,
    market_id: MarketId,
    state: &MarketState,
) -> Result<()> {
    let bytes = encode(state)?;
    store.set(&market_state_key(market_id), &bytes);
    Ok(())
}

pub fn get_order<S: Store + ?Sized>(store: &S, order_id: OrderId) -> Result<Order> {
    let bytes = store
        .get(&order_key(order_id))
        .ok_or(ExchangeError::OrderNotFound(order_id))?;
    decode(&bytes, "order")
}

/// Write the order record; index entries are managed separately because the
/// indexed fields (price, side, orderer) never change after placement
pub fn set_order<S: Store + ?Sized>(store: &mut S, order: &Order) -> Result<()> {
    let bytes = encode(order)?;
    store.set(&order_key(order.id), &bytes);
    Ok(())
}

/// Add the book and orderer index entries for a newly placed order
pub fn index_order<S: Store + ?Sized>(store: &mut S, order: &Order) {
    store.set(
        &book_key(order.market_id, order.is_buy, order.price, order.id),
        &[],
    );
    store.set(&orderer_key(&order.orderer, order.market_id, order.id), &[]);
}

/// Delete the order record and both of its index entries
pub fn remove_order<S: Store + ?Sized>(store: &mut S, order: &Order) {
    store.delete(&order_key(order.id));
    store.delete(&book_key(order.market_id, order.is_buy, order.price, order.id));
    store.delete(&orderer_key(&order.orderer, order.market_id, order.id));
}

/// Iterate one book side best-price-first
///
/// Sells ascend by price, buys descend; within a price, ascending order id.
pub fn iter_book_side<'a, S: Store + ?Sized>(
    store: &'a S,
    market_id: MarketId,
    is_buy: bool,
) -> impl Iterator<Item = Result<(Price, OrderId)>> + 'a {
    let prefix = book_side_prefix(market_id, is_buy);
    let iter = if is_buy {
        store.iter_prefix_rev(&prefix)
    } else {
        store.iter_prefix(&prefix)
    };
    iter.map(|(key, _)| parse_book_key(&key))
}

/// Best resting price on one side, if the side is non-empty
pub fn best_resting_price<S: Store + ?Sized>(
    store: &S,
    market_id: MarketId,
    is_buy: bool,
) -> Result<Option<Price>> {
    match iter_book_side(store, market_id, is_buy).next() {
        Some(entry) => entry.map(|(price, _)| Some(price)),
        None => Ok(None),
    }
}

/// Ids of all resting orders an orderer has in a market, ascending
pub fn orderer_order_ids<S: Store + ?Sized>(
    store: &S,
    orderer: &Address,
    market_id: MarketId,
) -> Vec<OrderId> {
    let prefix = orderer_market_prefix(orderer, market_id);
    store
        .iter_prefix(&prefix)
        .map(|(key, _)| {
            let mut id_bytes = [0u8; 8];
            id_bytes.copy_from_slice(&key[key.len() - 8..]);
            OrderId::new(u64::from_be_bytes(id_bytes))
        })
        .collect()
}

/// All resting orders across all markets, in order id order
pub fn all_orders<S: Store + ?Sized>(store: &S) -> Result<Vec<Order>> {
    store
        .iter_prefix(&[ORDER_KEY_PREFIX])
        .map(|(_, value)| decode(&value, "order"))
        .collect()
}

/// Storage-consistency check for one market's book
///
/// Verifies that every book index entry points at a live order with matching
/// side and price, that every resting order is indexed on both indexes, that
/// per-order invariants hold, and that the book is not crossed.
pub fn check_order_book_invariants<S: Store + ?Sized>(
    store: &S,
    market_id: MarketId,
) -> Result<()> {
    let mut prefix = vec![BOOK_KEY_PREFIX];
    prefix.extend_from_slice(&market_id.to_be_bytes());
    for (key, _) in store.iter_prefix(&prefix) {
        let (price, order_id) = parse_book_key(&key)?;
        let is_buy = key[9] == BUY_SIDE_BYTE;
        let order = get_order(store, order_id)?;
        if order.market_id != market_id || order.is_buy != is_buy || order.price != price {
            return Err(ExchangeError::internal(format!(
                "book index entry disagrees with order {order_id}"
            )));
        }
        order.check_invariant()?;
    }
    for order in all_orders(store)? {
        if order.market_id != market_id {
            continue;
        }
        let book = book_key(order.market_id, order.is_buy, order.price, order.id);
        if store.get(&book).is_none() {
            return Err(ExchangeError::internal(format!(
                "order {} missing from the book index",
                order.id
            )));
        }
        let by_orderer = orderer_key(&order.orderer, order.market_id, order.id);
        if store.get(&by_orderer).is_none() {
            return Err(ExchangeError::internal(format!(
                "order {} missing from the orderer index",
                order.id
            )));
        }
    }
    if let (Some(best_buy), Some(best_sell)) = (
        best_resting_price(store, market_id, true)?,
        best_resting_price(store, market_id, false)?,
    ) {
        if best_buy >= best_sell {
            return Err(ExchangeError::internal(format!(
                "crossed book: best buy {best_buy} >= best sell {best_sell}"
            )));
        }
    }
    Ok(())
}
