//! Spot exchange matching core
//!
//! Deterministic price-time-priority matching over an ordered key-value
//! store. The engine supports two execution paths that share one in-memory
//! matching context:
//!
//! - **Continuous**: a limit order executes against resting orders and
//!   synthetic order-source liquidity the moment it arrives; any remainder
//!   rests in the book.
//! - **Batch**: batch orders rest without matching and clear once per block,
//!   either at a single fair price (no trade history yet) or in a two-phase
//!   pass anchored on the market's last price.
//!
//! All funds movement is escrow-based: deposits are locked at placement and
//! settlement nets every participant's flows into at most two grouped bank
//! transfers per matching pass.
//!
//! # Modules
//! - `engine`: Public operation surface (`Exchange`)
//! - `state`: Storage schema and typed accessors
//! - `book`: In-memory order book sides built per matching pass
//! - `matching`: Continuous and batch matching algorithms
//! - `settlement`: Escrow ledger netting fills into bank transfers
//! - `bank`: Fund-transfer collaborator port
//! - `source`: Pluggable synthetic liquidity (order sources)
//! - `events`: Emitted exchange events

pub mod bank;
pub mod book;
pub mod engine;
pub mod events;
pub mod matching;
pub mod settlement;
pub mod source;
pub mod state;

pub use bank::{Bank, MemBank};
pub use engine::{BlockContext, Exchange, ExchangeConfig, SwapQuote};
pub use events::Event;
pub use source::{ExecutionResult, OrderSource};
