//! Persisted order entity and deposit math
//!
//! An `Order` record exists only while the order rests in the book: it is
//! created when a limit order is not fully executed at insertion time,
//! mutated on every partial fill, and deleted when its open quantity reaches
//! zero, when it is canceled, or when the expiry sweep collects it.

use crate::errors::{ExchangeError, Result};
use crate::ids::{Address, MarketId, OrderId};
use crate::numeric::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How an order participates in matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Matches continuously on arrival; the remainder rests
    Limit,
    /// Rests without immediate matching and participates in the
    /// once-per-block batch auction
    Batch,
}

/// A resting order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_type: OrderType,
    pub orderer: Address,
    pub market_id: MarketId,
    pub is_buy: bool,
    pub price: Price,
    /// Original declared quantity; also the partial-fill priority key
    pub quantity: Quantity,
    /// Still-unexecuted quantity; `0 < open_quantity <= quantity` while resting
    pub open_quantity: Quantity,
    /// Escrowed funds backing the open quantity, in the pay denom
    pub remaining_deposit: Decimal,
    /// Block height the order message was applied at; cancels in the same
    /// block are rejected
    pub msg_height: i64,
    /// Unix nanos after which the expiry sweep cancels the order
    pub deadline: i64,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: OrderId,
        order_type: OrderType,
        orderer: Address,
        market_id: MarketId,
        is_buy: bool,
        price: Price,
        quantity: Quantity,
        msg_height: i64,
        deadline: i64,
    ) -> Self {
        Self {
            id,
            order_type,
            orderer,
            market_id,
            is_buy,
            price,
            quantity,
            open_quantity: quantity,
            remaining_deposit: required_deposit(is_buy, price, quantity),
            msg_height,
            deadline,
        }
    }

    /// Quantity this order can still execute, limited by both its open
    /// quantity and its remaining deposit
    pub fn executable_quantity(&self) -> Quantity {
        executable_quantity(
            self.is_buy,
            self.price,
            self.open_quantity,
            self.remaining_deposit,
        )
    }

    pub fn is_expired(&self, now_unix_nanos: i64) -> bool {
        self.deadline <= now_unix_nanos
    }

    /// Sanity check used by storage-consistency tests
    pub fn check_invariant(&self) -> Result<()> {
        if self.open_quantity.is_zero() || self.open_quantity > self.quantity {
            return Err(ExchangeError::internal(format!(
                "order {}: open quantity {} out of range (quantity {})",
                self.id, self.open_quantity, self.quantity
            )));
        }
        if self.remaining_deposit <= Decimal::ZERO {
            return Err(ExchangeError::internal(format!(
                "order {}: non-positive remaining deposit {}",
                self.id, self.remaining_deposit
            )));
        }
        Ok(())
    }
}

/// Deposit required to back an order: `ceil(price * quantity)` in quote
/// units for buys, the quantity itself in base units for sells
pub fn required_deposit(is_buy: bool, price: Price, quantity: Quantity) -> Decimal {
    if is_buy {
        (price.as_decimal() * quantity.as_decimal()).ceil()
    } else {
        quantity.as_decimal()
    }
}

/// Executable quantity given an open quantity and a deposit
///
/// A buy order can execute at most `floor(deposit / price)` units no matter
/// how much open quantity remains.
pub fn executable_quantity(
    is_buy: bool,
    price: Price,
    open_quantity: Quantity,
    remaining_deposit: Decimal,
) -> Quantity {
    if is_buy {
        let by_deposit = (remaining_deposit / price.as_decimal()).floor();
        let by_deposit = if by_deposit.is_sign_negative() {
            Quantity::zero()
        } else {
            Quantity::try_new(by_deposit).unwrap_or_else(|_| Quantity::zero())
        };
        open_quantity.min(by_deposit)
    } else {
        let by_deposit = remaining_deposit.floor();
        let by_deposit = if by_deposit.is_sign_negative() {
            Quantity::zero()
        } else {
            Quantity::try_new(by_deposit).unwrap_or_else(|_| Quantity::zero())
        };
        open_quantity.min(by_deposit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_order(is_buy: bool, price: &str, qty: u64) -> Order {
        Order::new(
            OrderId::new(1),
            OrderType::Limit,
            Address::new("orderer1"),
            MarketId::new(1),
            is_buy,
            Price::from_str(price).unwrap(),
            Quantity::from_u64(qty),
            10,
            1_000_000,
        )
    }

    #[test]
    fn test_required_deposit() {
        // Buy: ceil(5.00 * 1000) = 5000 quote units.
        assert_eq!(
            required_deposit(true, Price::from_str("5").unwrap(), Quantity::from_u64(1000)),
            Decimal::from(5000)
        );
        // Fractional product rounds up.
        assert_eq!(
            required_deposit(true, Price::from_str("0.15").unwrap(), Quantity::from_u64(33)),
            Decimal::from(5) // 4.95 -> 5
        );
        // Sell: base units, no rounding needed.
        assert_eq!(
            required_deposit(false, Price::from_str("5").unwrap(), Quantity::from_u64(1000)),
            Decimal::from(1000)
        );
    }

    #[test]
    fn test_executable_quantity_deposit_bound() {
        let mut order = test_order(true, "5", 1000);
        assert_eq!(order.executable_quantity(), Quantity::from_u64(1000));

        // Deposit shrunk to cover only 400 units at 5.00.
        order.remaining_deposit = Decimal::from(2003);
        assert_eq!(order.executable_quantity(), Quantity::from_u64(400));
    }

    #[test]
    fn test_invariant_check() {
        let mut order = test_order(false, "5", 10);
        assert!(order.check_invariant().is_ok());

        order.open_quantity = Quantity::zero();
        assert!(order.check_invariant().is_err());

        let mut order = test_order(false, "5", 10);
        order.remaining_deposit = Decimal::ZERO;
        assert!(order.check_invariant().is_err());
    }

    #[test]
    fn test_expiry() {
        let order = test_order(false, "5", 10);
        assert!(!order.is_expired(999_999));
        assert!(order.is_expired(1_000_000));
    }

    #[test]
    fn test_serialization_round_trip() {
        let order = test_order(true, "5", 1000);
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, back);
    }
}
