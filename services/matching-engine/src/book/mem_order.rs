//! Per-pass working copy of an order
//!
//! Matching never mutates persisted orders directly. Every participating
//! order (resting, source-generated, or the incoming taker) becomes a
//! `MemOrder` in the matching context's arena; fills accumulate on the
//! working copy and the results are written back in a single finalize step.

use rust_decimal::Decimal;
use std::cmp::Ordering;
use types::prelude::*;

/// Where a matching-pass order came from
#[derive(Debug, Clone)]
pub enum MemOrderOrigin {
    /// A persisted user order (or the incoming taker, already persisted)
    User { order: Order },
    /// An ephemeral order contributed by an order source
    Source {
        source_name: String,
        orderer: Address,
    },
}

/// Working copy of one order during a matching pass
#[derive(Debug, Clone)]
pub struct MemOrder {
    pub origin: MemOrderOrigin,
    pub is_buy: bool,
    pub price: Price,
    pub quantity: Quantity,
    pub open_quantity: Quantity,
    pub remaining_deposit: Decimal,
    pub executed_quantity: Quantity,
    /// Gross amount paid over all fills, in the pay denom
    pub paid: Decimal,
    /// Gross amount received over all fills, before fees
    pub received: Decimal,
    /// Accumulated fee on the received amount; negative for rebates
    pub fee: Decimal,
}

impl MemOrder {
    pub fn from_order(order: &Order) -> Self {
        Self {
            is_buy: order.is_buy,
            price: order.price,
            quantity: order.quantity,
            open_quantity: order.open_quantity,
            remaining_deposit: order.remaining_deposit,
            executed_quantity: Quantity::zero(),
            paid: Decimal::ZERO,
            received: Decimal::ZERO,
            fee: Decimal::ZERO,
            origin: MemOrderOrigin::User {
                order: order.clone(),
            },
        }
    }

    pub fn from_source(
        source_name: &str,
        orderer: Address,
        is_buy: bool,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self {
            is_buy,
            price,
            quantity,
            open_quantity: quantity,
            remaining_deposit: required_deposit(is_buy, price, quantity),
            executed_quantity: Quantity::zero(),
            paid: Decimal::ZERO,
            received: Decimal::ZERO,
            fee: Decimal::ZERO,
            origin: MemOrderOrigin::Source {
                source_name: source_name.to_string(),
                orderer,
            },
        }
    }

    /// Unbounded taker used by quote-only simulations; never finalized
    pub fn simulated_taker(is_buy: bool, quantity: Quantity) -> Self {
        let order = Order::new(
            OrderId::new(0),
            OrderType::Limit,
            Address::new("simulation"),
            MarketId::new(0),
            is_buy,
            Price::from_u64(1),
            Quantity::from_u64(1),
            0,
            0,
        );
        Self {
            is_buy,
            price: order.price,
            quantity,
            open_quantity: quantity,
            remaining_deposit: Decimal::MAX,
            executed_quantity: Quantity::zero(),
            paid: Decimal::ZERO,
            received: Decimal::ZERO,
            fee: Decimal::ZERO,
            origin: MemOrderOrigin::User { order },
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self.origin, MemOrderOrigin::Source { .. })
    }

    pub fn executable_quantity(&self) -> Quantity {
        executable_quantity(
            self.is_buy,
            self.price,
            self.open_quantity,
            self.remaining_deposit,
        )
    }

    /// Apply one fill at `price` with the given fee rate on the received
    /// amount
    pub fn fill(&mut self, quantity: Quantity, price: Price, fee_rate: Decimal) {
        debug_assert!(quantity <= self.open_quantity);
        let traded = price.as_decimal() * quantity.as_decimal();
        let (paid, received) = if self.is_buy {
            (traded, quantity.as_decimal())
        } else {
            (quantity.as_decimal(), traded)
        };
        self.paid += paid;
        self.received += received;
        self.fee += received * fee_rate;
        self.remaining_deposit -= paid;
        self.open_quantity = self.open_quantity.saturating_sub(quantity);
        self.executed_quantity += quantity;
    }

    /// Priority for handing out the integer remainder after proportional
    /// distribution within a price level: larger declared quantity first,
    /// then user orders before source orders, then order id (arrival) for
    /// users and name/account for sources
    pub fn cmp_remainder_priority(&self, other: &MemOrder) -> Ordering {
        match other.quantity.cmp(&self.quantity) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match (&self.origin, &other.origin) {
            (MemOrderOrigin::User { order: a }, MemOrderOrigin::User { order: b }) => {
                a.id.cmp(&b.id)
            }
            (MemOrderOrigin::User { .. }, MemOrderOrigin::Source { .. }) => Ordering::Less,
            (MemOrderOrigin::Source { .. }, MemOrderOrigin::User { .. }) => Ordering::Greater,
            (
                MemOrderOrigin::Source {
                    source_name: a,
                    orderer: ao,
                },
                MemOrderOrigin::Source {
                    source_name: b,
                    orderer: bo,
                },
            ) => a.cmp(b).then_with(|| ao.cmp(bo)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_order(id: u64, qty: u64) -> MemOrder {
        MemOrder::from_order(&Order::new(
            OrderId::new(id),
            OrderType::Limit,
            Address::new("orderer1"),
            MarketId::new(1),
            false,
            Price::from_str("5").unwrap(),
            Quantity::from_u64(qty),
            1,
            1_000_000,
        ))
    }

    #[test]
    fn test_fill_accumulates() {
        let mut order = user_order(1, 1000);
        let rate = Decimal::from_str_exact("0.0015").unwrap();
        order.fill(Quantity::from_u64(600), Price::from_str("5").unwrap(), rate);

        assert_eq!(order.executed_quantity, Quantity::from_u64(600));
        assert_eq!(order.open_quantity, Quantity::from_u64(400));
        // Sell: paid base, received quote.
        assert_eq!(order.paid, Decimal::from(600));
        assert_eq!(order.received, Decimal::from(3000));
        assert_eq!(order.fee, Decimal::from_str_exact("4.5").unwrap());
        assert_eq!(order.remaining_deposit, Decimal::from(400));
    }

    #[test]
    fn test_buy_fill_pays_quote() {
        let mut order = MemOrder::from_order(&Order::new(
            OrderId::new(1),
            OrderType::Limit,
            Address::new("orderer1"),
            MarketId::new(1),
            true,
            Price::from_str("5.1").unwrap(),
            Quantity::from_u64(600),
            1,
            1_000_000,
        ));
        // Price improvement: fills below the limit price.
        order.fill(
            Quantity::from_u64(600),
            Price::from_str("5").unwrap(),
            Decimal::ZERO,
        );
        assert_eq!(order.paid, Decimal::from(3000));
        assert_eq!(order.received, Decimal::from(600));
        // Deposit was ceil(5.1 * 600) = 3060; 60 is left over.
        assert_eq!(order.remaining_deposit, Decimal::from(60));
    }

    #[test]
    fn test_remainder_priority() {
        let big = user_order(1, 1000);
        let small = user_order(2, 500);
        assert_eq!(big.cmp_remainder_priority(&small), Ordering::Less);

        // Equal quantity: earlier order id wins.
        let first = user_order(3, 500);
        assert_eq!(first.cmp_remainder_priority(&small), Ordering::Greater);
        assert_eq!(small.cmp_remainder_priority(&first), Ordering::Less);

        // Equal quantity: user order beats source order.
        let source = MemOrder::from_source(
            "amm",
            Address::new("pool1"),
            false,
            Price::from_str("5").unwrap(),
            Quantity::from_u64(500),
        );
        assert_eq!(small.cmp_remainder_priority(&source), Ordering::Less);

        // Source vs source: name order.
        let other = MemOrder::from_source(
            "rfq",
            Address::new("pool2"),
            false,
            Price::from_str("5").unwrap(),
            Quantity::from_u64(500),
        );
        assert_eq!(source.cmp_remainder_priority(&other), Ordering::Less);
    }
}
