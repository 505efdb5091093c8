//! In-memory order book built per matching pass

pub mod mem_order;
pub mod side;

pub use mem_order::{MemOrder, MemOrderOrigin};
pub use side::{construct_book_side, OrderBookSide, OrderBookSideOptions, PriceLevel};
