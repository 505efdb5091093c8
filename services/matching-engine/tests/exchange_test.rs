//! Continuous matching and order lifecycle scenarios

mod common;

use common::*;
use matching_engine::state::check_order_book_invariants;
use matching_engine::Event;
use rust_decimal::Decimal;
use types::prelude::*;

#[test]
fn test_limit_order_cross_settles_exactly() {
    let mut exchange = new_exchange();
    let (market, _) = exchange.create_market("uatom", "uusd").unwrap();
    let alice = addr("alice");
    let bob = addr("bob");
    let collector = exchange.config().fee_collector.clone();
    exchange.bank_mut().mint(&alice, "uatom", dec("1000"));
    exchange.bank_mut().mint(&bob, "uusd", dec("5000"));

    // Alice's sell rests: nothing on the other side.
    let (alice_order, events) = exchange
        .place_limit_order(&blk(1), &alice, market.id, false, price("5"), qty(1000), LIFESPAN)
        .unwrap();
    assert!(matches!(events[0], Event::OrderPlaced { executed_quantity, .. }
        if executed_quantity == Quantity::zero()));
    assert_eq!(exchange.bank().balance_of(&alice, "uatom"), Decimal::ZERO);
    assert_eq!(
        exchange.bank().balance_of(&market.escrow_address, "uatom"),
        dec("1000")
    );

    // Bob's buy at 5.10 executes 600 at Alice's 5.00.
    let (_, events) = exchange
        .place_limit_order(&blk(2), &bob, market.id, true, price("5.1"), qty(600), LIFESPAN)
        .unwrap();
    assert!(events.iter().any(|e| matches!(e, Event::OrderPlaced { executed_quantity, .. }
        if *executed_quantity == qty(600))));
    assert!(events.iter().any(|e| matches!(e, Event::MarketStateUpdated { last_price, .. }
        if *last_price == price("5"))));

    // Taker: paid 3000 of the 3060 deposit, got 600 minus ceil(1.8) fee.
    assert_eq!(exchange.bank().balance_of(&bob, "uusd"), dec("2000"));
    assert_eq!(exchange.bank().balance_of(&bob, "uatom"), dec("598"));
    // Maker: received 3000 minus ceil(4.5) fee.
    assert_eq!(exchange.bank().balance_of(&alice, "uusd"), dec("2995"));
    // Fees, rounded up, sit with the collector.
    assert_eq!(exchange.bank().balance_of(&collector, "uusd"), dec("5"));
    assert_eq!(exchange.bank().balance_of(&collector, "uatom"), dec("2"));
    // Escrow still backs Alice's open remainder.
    assert_eq!(
        exchange.bank().balance_of(&market.escrow_address, "uatom"),
        dec("400")
    );
    assert_eq!(
        exchange.bank().balance_of(&market.escrow_address, "uusd"),
        Decimal::ZERO
    );

    let resting = exchange.order(alice_order).unwrap();
    assert_eq!(resting.open_quantity, qty(400));
    assert_eq!(resting.remaining_deposit, dec("400"));

    let state = exchange.market_state(market.id).unwrap();
    assert_eq!(state.last_price, Some(price("5")));
    assert_eq!(state.last_matching_height, Some(2));

    // Nothing minted, nothing burned.
    assert_eq!(exchange.bank().total_supply("uusd"), dec("5000"));
    assert_eq!(exchange.bank().total_supply("uatom"), dec("1000"));
    check_order_book_invariants(exchange.store(), market.id).unwrap();
}

#[test]
fn test_partial_fill_distribution_across_level() {
    let mut exchange = new_exchange();
    let (market, _) = exchange.create_market("uatom", "uusd").unwrap();
    let small = addr("seller-small");
    let large = addr("seller-large");
    let buyer = addr("buyer");
    exchange.bank_mut().mint(&small, "uatom", dec("500"));
    exchange.bank_mut().mint(&large, "uatom", dec("1000"));
    exchange.bank_mut().mint(&buyer, "uusd", dec("5000"));

    let (small_id, _) = exchange
        .place_limit_order(&blk(1), &small, market.id, false, price("5"), qty(500), LIFESPAN)
        .unwrap();
    let (large_id, _) = exchange
        .place_limit_order(&blk(1), &large, market.id, false, price("5"), qty(1000), LIFESPAN)
        .unwrap();
    exchange
        .place_limit_order(&blk(2), &buyer, market.id, true, price("5"), qty(1000), LIFESPAN)
        .unwrap();

    // Proportional floors 333/666; the leftover unit goes to the larger order.
    assert_eq!(exchange.order(small_id).unwrap().open_quantity, qty(167));
    assert_eq!(exchange.order(large_id).unwrap().open_quantity, qty(333));
    check_order_book_invariants(exchange.store(), market.id).unwrap();
}

#[test]
fn test_cancel_refunds_remaining_deposit() {
    let mut exchange = new_exchange();
    let (market, _) = exchange.create_market("uatom", "uusd").unwrap();
    let alice = addr("alice");
    exchange.bank_mut().mint(&alice, "uusd", dec("510"));

    let (order_id, _) = exchange
        .place_limit_order(&blk(1), &alice, market.id, true, price("5.1"), qty(100), LIFESPAN)
        .unwrap();
    assert_eq!(exchange.bank().balance_of(&alice, "uusd"), Decimal::ZERO);

    let events = exchange.cancel_order(&blk(2), &alice, order_id).unwrap();
    assert!(matches!(&events[0], Event::OrderCanceled { refund, .. }
        if refund.amount == dec("510")));
    assert_eq!(exchange.bank().balance_of(&alice, "uusd"), dec("510"));
    assert!(matches!(
        exchange.order(order_id),
        Err(ExchangeError::OrderNotFound(_))
    ));
}

#[test]
fn test_cancel_guards() {
    let mut exchange = new_exchange();
    let (market, _) = exchange.create_market("uatom", "uusd").unwrap();
    let alice = addr("alice");
    let mallory = addr("mallory");
    exchange.bank_mut().mint(&alice, "uusd", dec("510"));

    let (order_id, _) = exchange
        .place_limit_order(&blk(1), &alice, market.id, true, price("5.1"), qty(100), LIFESPAN)
        .unwrap();

    // Same block as placement: rejected.
    assert!(matches!(
        exchange.cancel_order(&blk(1), &alice, order_id),
        Err(ExchangeError::InvalidRequest(_))
    ));
    // Wrong sender: rejected.
    assert!(matches!(
        exchange.cancel_order(&blk(2), &mallory, order_id),
        Err(ExchangeError::Unauthorized(_))
    ));
    // Funds stayed locked through both rejections.
    assert_eq!(exchange.bank().balance_of(&alice, "uusd"), Decimal::ZERO);
}

#[test]
fn test_cancel_all_skips_same_block_orders() {
    let mut exchange = new_exchange();
    let (market, _) = exchange.create_market("uatom", "uusd").unwrap();
    let alice = addr("alice");
    exchange.bank_mut().mint(&alice, "uatom", dec("300"));

    exchange
        .place_limit_order(&blk(1), &alice, market.id, false, price("5"), qty(100), LIFESPAN)
        .unwrap();
    exchange
        .place_limit_order(&blk(1), &alice, market.id, false, price("5.1"), qty(100), LIFESPAN)
        .unwrap();
    let (fresh_id, _) = exchange
        .place_limit_order(&blk(2), &alice, market.id, false, price("5.2"), qty(100), LIFESPAN)
        .unwrap();

    let events = exchange.cancel_all_orders(&blk(2), &alice, market.id).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(exchange.bank().balance_of(&alice, "uatom"), dec("200"));
    // The order placed this block survives.
    assert!(exchange.order(fresh_id).is_ok());
}

#[test]
fn test_expiry_sweep_refunds() {
    let mut exchange = new_exchange();
    let (market, _) = exchange.create_market("uatom", "uusd").unwrap();
    let alice = addr("alice");
    exchange.bank_mut().mint(&alice, "uatom", dec("100"));

    // Deadline at t=1.5s.
    let (order_id, _) = exchange
        .place_limit_order(&blk(1), &alice, market.id, false, price("5"), qty(100), 500_000_000)
        .unwrap();

    // t=2s: swept.
    let events = exchange.begin_block(&blk(2)).unwrap();
    assert!(events.iter().any(|e| matches!(e, Event::OrderExpired { refund, .. }
        if refund.amount == dec("100"))));
    assert_eq!(exchange.bank().balance_of(&alice, "uatom"), dec("100"));
    assert!(matches!(
        exchange.order(order_id),
        Err(ExchangeError::OrderNotFound(_))
    ));
}

#[test]
fn test_expiry_sweep_covers_multiple_markets() {
    let mut exchange = new_exchange();
    let (atom_market, _) = exchange.create_market("uatom", "uusd").unwrap();
    let (osmo_market, _) = exchange.create_market("uosmo", "uusd").unwrap();
    let alice = addr("alice");
    let carol = addr("carol");
    exchange.bank_mut().mint(&alice, "uatom", dec("100"));
    exchange.bank_mut().mint(&carol, "uosmo", dec("50"));

    let (atom_order, _) = exchange
        .place_limit_order(&blk(1), &alice, atom_market.id, false, price("5"), qty(100), 500_000_000)
        .unwrap();
    let (osmo_order, _) = exchange
        .place_limit_order(&blk(1), &carol, osmo_market.id, false, price("2"), qty(50), 500_000_000)
        .unwrap();

    let events = exchange.begin_block(&blk(2)).unwrap();
    assert_eq!(
        events.iter().filter(|e| matches!(e, Event::OrderExpired { .. })).count(),
        2
    );
    assert_eq!(exchange.bank().balance_of(&alice, "uatom"), dec("100"));
    assert_eq!(exchange.bank().balance_of(&carol, "uosmo"), dec("50"));
    assert!(exchange.order(atom_order).is_err());
    assert!(exchange.order(osmo_order).is_err());
    assert_eq!(
        exchange.bank().balance_of(&atom_market.escrow_address, "uatom"),
        Decimal::ZERO
    );
    assert_eq!(
        exchange.bank().balance_of(&osmo_market.escrow_address, "uosmo"),
        Decimal::ZERO
    );
}

#[test]
fn test_open_quantity_decreases_monotonically() {
    let mut exchange = new_exchange();
    let (market, _) = exchange.create_market("uatom", "uusd").unwrap();
    let alice = addr("alice");
    let buyer = addr("buyer");
    exchange.bank_mut().mint(&alice, "uatom", dec("1000"));
    exchange.bank_mut().mint(&buyer, "uusd", dec("5000"));

    let (order_id, _) = exchange
        .place_limit_order(&blk(1), &alice, market.id, false, price("5"), qty(1000), LIFESPAN)
        .unwrap();

    let mut previous = exchange.order(order_id).unwrap().open_quantity;
    assert_eq!(previous, qty(1000));
    for (height, take, expected_open) in [(2, 300, 700), (3, 400, 300)] {
        exchange
            .place_limit_order(&blk(height), &buyer, market.id, true, price("5"), qty(take), LIFESPAN)
            .unwrap();
        let open = exchange.order(order_id).unwrap().open_quantity;
        assert!(open < previous);
        assert_eq!(open, qty(expected_open));
        previous = open;
    }

    // The last fill exhausts the order; it leaves the book, never resting
    // at zero.
    exchange
        .place_limit_order(&blk(4), &buyer, market.id, true, price("5"), qty(300), LIFESPAN)
        .unwrap();
    assert!(matches!(
        exchange.order(order_id),
        Err(ExchangeError::OrderNotFound(_))
    ));
    check_order_book_invariants(exchange.store(), market.id).unwrap();
}

#[test]
fn test_placement_validation() {
    let mut exchange = new_exchange();
    let (market, _) = exchange.create_market("uatom", "uusd").unwrap();
    let alice = addr("alice");
    exchange.bank_mut().mint(&alice, "uusd", dec("100"));

    // Price with 4 significant digits is off-tick.
    assert!(matches!(
        exchange.place_limit_order(&blk(1), &alice, market.id, true, price("5.123"), qty(10), LIFESPAN),
        Err(ExchangeError::InvalidTickPrice(_))
    ));
    // Zero quantity.
    assert!(matches!(
        exchange.place_limit_order(&blk(1), &alice, market.id, true, price("5"), qty(0), LIFESPAN),
        Err(ExchangeError::InvalidRequest(_))
    ));
    // Deposit exceeds spendable balance: ceil(5 * 100) = 500 > 100.
    assert!(matches!(
        exchange.place_limit_order(&blk(1), &alice, market.id, true, price("5"), qty(100), LIFESPAN),
        Err(ExchangeError::InsufficientFunds { .. })
    ));
    // Unknown market.
    assert!(matches!(
        exchange.place_limit_order(&blk(1), &alice, MarketId::new(99), true, price("5"), qty(1), LIFESPAN),
        Err(ExchangeError::MarketNotFound(_))
    ));
    // Non-positive lifespan.
    assert!(matches!(
        exchange.place_limit_order(&blk(1), &alice, market.id, true, price("5"), qty(10), 0),
        Err(ExchangeError::InvalidRequest(_))
    ));
}

#[test]
fn test_duplicate_market_rejected() {
    let mut exchange = new_exchange();
    exchange.create_market("uatom", "uusd").unwrap();
    assert!(matches!(
        exchange.create_market("uatom", "uusd"),
        Err(ExchangeError::InvalidRequest(_))
    ));
    // The reverse pair is a different market.
    assert!(exchange.create_market("uusd", "uatom").is_ok());
}

#[test]
fn test_update_market_fees() {
    let mut exchange = new_exchange();
    let (market, _) = exchange.create_market("uatom", "uusd").unwrap();

    exchange
        .update_market_fees(market.id, dec("0.001"), dec("0.002"), dec("0.25"))
        .unwrap();
    let updated = exchange.market(market.id).unwrap();
    assert_eq!(updated.taker_fee_rate, dec("0.002"));

    // Maker rebate deeper than the taker fee is out of bounds.
    assert!(matches!(
        exchange.update_market_fees(market.id, dec("-0.005"), dec("0.002"), dec("0.25")),
        Err(ExchangeError::InvalidRequest(_))
    ));
}

#[test]
fn test_quote_swap_leaves_state_untouched() {
    let mut exchange = new_exchange();
    let (market, _) = exchange.create_market("uatom", "uusd").unwrap();
    let alice = addr("alice");
    exchange.bank_mut().mint(&alice, "uatom", dec("1000"));
    let (order_id, _) = exchange
        .place_limit_order(&blk(1), &alice, market.id, false, price("5"), qty(1000), LIFESPAN)
        .unwrap();

    let quote = exchange
        .quote_swap(market.id, true, Some(price("5.1")), Some(qty(600)), None)
        .unwrap();
    assert_eq!(quote.executed_quantity, qty(600));
    assert_eq!(quote.paid, Coin::new("uusd", dec("3000")));
    assert_eq!(quote.received, Coin::new("uatom", dec("598")));
    assert_eq!(quote.fee, Coin::new("uatom", dec("2")));
    assert_eq!(quote.last_price, Some(price("5")));

    // The resting order is untouched and the market has no trade history.
    assert_eq!(exchange.order(order_id).unwrap().open_quantity, qty(1000));
    assert_eq!(exchange.market_state(market.id).unwrap().last_price, None);
}

#[test]
fn test_quote_swap_no_liquidity() {
    let mut exchange = new_exchange();
    let (market, _) = exchange.create_market("uatom", "uusd").unwrap();
    assert!(matches!(
        exchange.quote_swap(market.id, true, None, Some(qty(100)), None),
        Err(ExchangeError::NoLiquidity)
    ));
    assert!(matches!(
        exchange.quote_swap(market.id, true, None, None, None),
        Err(ExchangeError::InvalidRequest(_))
    ));
}
