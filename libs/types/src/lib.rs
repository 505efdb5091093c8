//! Types library for the spot exchange matching core
//!
//! This library provides all core type definitions shared across the exchange
//! crates, ensuring type safety and deterministic behavior: matching must be
//! bit-for-bit reproducible across independent validators, so every value in
//! the price/quantity path is an exact decimal and every collection iterates
//! in a defined order.
//!
//! # Modules
//! - `ids`: Identifiers (MarketId, OrderId, Address)
//! - `numeric`: Exact decimal newtypes (Price, Quantity)
//! - `tick`: Tick/price codec and order-preserving byte encoding
//! - `coin`: Denominated amounts (Coin, Coins)
//! - `market`: Market registry and per-market matching state
//! - `order`: Persisted order entity and deposit math
//! - `errors`: Error taxonomy

pub mod coin;
pub mod errors;
pub mod ids;
pub mod market;
pub mod numeric;
pub mod order;
pub mod tick;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coin::*;
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::market::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
    pub use crate::tick::*;
}
