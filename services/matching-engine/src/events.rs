//! Events emitted by exchange operations
//!
//! Every state-changing operation returns the events it produced, in the
//! order the underlying state changes happened. Callers forward them to the
//! surrounding chain's event system.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::prelude::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    MarketCreated {
        market_id: MarketId,
        base_denom: String,
        quote_denom: String,
    },
    MarketFeesUpdated {
        market_id: MarketId,
        maker_fee_rate: Decimal,
        taker_fee_rate: Decimal,
        order_source_fee_ratio: Decimal,
    },
    OrderPlaced {
        order_id: OrderId,
        market_id: MarketId,
        orderer: Address,
        is_buy: bool,
        price: Price,
        quantity: Quantity,
        /// Quantity executed at placement; zero for batch orders
        executed_quantity: Quantity,
    },
    OrderFilled {
        order_id: OrderId,
        market_id: MarketId,
        orderer: Address,
        executed_quantity: Quantity,
        paid: Coin,
        received: Coin,
        /// Fee withheld from the received amount; negative for rebates
        fee: Coin,
        open_quantity: Quantity,
    },
    OrderSourceOrdersFilled {
        source_name: String,
        market_id: MarketId,
        orderer: Address,
        is_buy: bool,
        executed_quantity: Quantity,
        paid: Coin,
        received: Coin,
    },
    OrderCanceled {
        order_id: OrderId,
        market_id: MarketId,
        refund: Coin,
    },
    OrderExpired {
        order_id: OrderId,
        market_id: MarketId,
        refund: Coin,
    },
    MarketStateUpdated {
        market_id: MarketId,
        last_price: Price,
        height: i64,
    },
    /// A per-market batch pass failed; its effects were rolled back and the
    /// other markets proceeded
    BatchMatchingFailed {
        market_id: MarketId,
        reason: String,
    },
}
