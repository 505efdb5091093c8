//! Shared helpers for engine integration tests
#![allow(dead_code)]

use matching_engine::{BlockContext, Exchange, ExchangeConfig, MemBank};
use rust_decimal::Decimal;
use store::MemStore;
use types::prelude::*;

pub type TestExchange = Exchange<MemStore, MemBank>;

pub const LIFESPAN: i64 = 86_400_000_000_000;

pub fn new_exchange() -> TestExchange {
    Exchange::new(MemStore::new(), MemBank::new(), ExchangeConfig::default())
}

/// Block `height` with a timestamp of `height` seconds
pub fn blk(height: i64) -> BlockContext {
    BlockContext {
        height,
        time_unix_nanos: height * 1_000_000_000,
    }
}

pub fn addr(s: &str) -> Address {
    Address::new(s)
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str_exact(s).unwrap()
}

pub fn price(s: &str) -> Price {
    Price::from_str(s).unwrap()
}

pub fn qty(v: u64) -> Quantity {
    Quantity::from_u64(v)
}
