//! Property tests for account and driver invariants.
//!
//! Uses proptest to verify:
//! 1. Order construction echoes valid inputs and rejects invalid ones by kind
//! 2. Single-position mode never stacks positions and nets round trips exactly
//! 3. Multi-position mode keeps the open count within `[0, max_positions]`
//! 4. The submission queue executes first-in-first-out
//! 5. Lookback windows are clipped to the available history

use std::sync::Arc;

use barsim::engine::{Account, Backtest, Bar, BarView, Direction, Order, OrderType, ProcessOutcome};
use barsim::errors::{Error, InvalidOrder, Result};
use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![
        Just(Direction::Buy),
        Just(Direction::Sell),
        Just(Direction::Short),
        Just(Direction::Cover),
    ]
}

fn arb_order_type() -> impl Strategy<Value = OrderType> {
    prop_oneof![Just(OrderType::Market), Just(OrderType::Limit), Just(OrderType::Stop)]
}

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn at(minutes: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
}

fn market(direction: Direction, shares: i64, price: f64) -> Order {
    Order::new(direction, OrderType::Market, shares, price, "SPY").unwrap()
}

// ── 1. Order construction ────────────────────────────────────────────

proptest! {
    #[test]
    fn valid_orders_echo_inputs(
        direction in arb_direction(),
        order_type in arb_order_type(),
        shares in 1..1_000_000_i64,
        price in arb_price(),
        ticker in "[A-Z]{0,5}",
    ) {
        let order = Order::new(direction, order_type, shares, price, ticker.clone()).unwrap();
        prop_assert_eq!(order.direction(), direction);
        prop_assert_eq!(order.order_type(), order_type);
        prop_assert_eq!(order.shares(), shares as u64);
        prop_assert_eq!(order.price(), price);
        prop_assert_eq!(order.ticker(), ticker.as_str());
        prop_assert!(order.submitted_at().is_none());
        prop_assert!(order.processed_at().is_none());
    }

    #[test]
    fn non_positive_shares_are_rejected(shares in i64::MIN..=0, price in arb_price()) {
        let result = Order::new(Direction::Buy, OrderType::Market, shares, price, "");
        prop_assert!(matches!(result, Err(Error::InvalidOrder(InvalidOrder::InvalidShares(s))) if s == shares));
    }

    #[test]
    fn non_positive_prices_are_rejected(shares in 1..100_i64, price in -1e6..=0.0_f64) {
        let result = Order::new(Direction::Short, OrderType::Market, shares, price, "");
        prop_assert!(matches!(result, Err(Error::InvalidOrder(InvalidOrder::InvalidPrice(_)))));
    }

    #[test]
    fn unknown_direction_tags_are_rejected(tag in "[a-zA-Z]{1,8}") {
        prop_assume!(!["buy", "sell", "short", "cover"].contains(&tag.as_str()));
        let result = Order::try_from((tag.as_str(), "market", 1_i64, 1.0, ""));
        prop_assert!(matches!(result, Err(Error::InvalidOrder(InvalidOrder::InvalidDirection(_)))));
    }
}

// ── 2. Single-position mode ──────────────────────────────────────────

proptest! {
    #[test]
    fn second_buy_is_a_noop(shares in 1..100_i64, p1 in arb_price(), p2 in arb_price()) {
        let mut account = Account::new(1_000_000.0);
        account.process_order(Some(&market(Direction::Buy, shares, p1))).unwrap();
        let balance = account.balance();

        let outcome = account.process_order(Some(&market(Direction::Buy, shares, p2))).unwrap();
        prop_assert!(matches!(outcome, ProcessOutcome::Rejected(_)));
        prop_assert_eq!(account.balance(), balance);
        prop_assert!(account.in_position());
    }

    #[test]
    fn round_trip_nets_price_difference(shares in 1..100_i64, p1 in arb_price(), p2 in arb_price()) {
        let initial = 1_000_000.0;
        let mut account = Account::new(initial);
        let buy = account.process_order(Some(&market(Direction::Buy, shares, p1))).unwrap();
        let short = account.process_order(Some(&market(Direction::Short, shares, p2))).unwrap();

        let expected = shares as f64 * (p2 - p1);
        prop_assert!((buy.delta() + short.delta() - expected).abs() < 1e-6);
        prop_assert!((account.balance() - initial - expected).abs() < 1e-6);
        prop_assert!(!account.in_position());
    }
}

// ── 3. Multi-position mode ───────────────────────────────────────────

proptest! {
    #[test]
    fn buys_stop_at_max_positions(max in 2..10_usize, extra in 1..5_usize) {
        let mut account = Account::new(1_000_000.0);
        account.set_max_positions(max).unwrap();
        for _ in 0..max {
            prop_assert!(account.process_order(Some(&market(Direction::Buy, 1, 10.0))).unwrap().is_executed());
        }
        for _ in 0..extra {
            let outcome = account.process_order(Some(&market(Direction::Buy, 1, 10.0))).unwrap();
            prop_assert!(!outcome.is_executed());
        }
        prop_assert_eq!(account.num_positions(), max);
    }

    #[test]
    fn open_count_stays_in_bounds(
        max in 2..6_usize,
        steps in prop::collection::vec((any::<bool>(), 1..4_i64), 1..60),
    ) {
        let mut account = Account::new(1_000_000.0);
        account.set_max_positions(max).unwrap();
        for (is_buy, shares) in steps {
            let direction = if is_buy { Direction::Buy } else { Direction::Short };
            account.process_order(Some(&market(direction, shares, 10.0))).unwrap();
            prop_assert!(account.num_positions() <= max);
            prop_assert_eq!(account.in_position(), account.num_positions() > 0);
        }
    }

    #[test]
    fn zero_max_positions_is_rejected(max in 1..10_usize) {
        let mut account = Account::new(1_000.0);
        account.set_max_positions(max).unwrap();
        prop_assert!(matches!(account.set_max_positions(0), Err(Error::InvalidConfiguration(_))));
        prop_assert_eq!(account.max_positions(), max);
    }
}

// ── 4. Submission queue ──────────────────────────────────────────────

proptest! {
    #[test]
    fn queue_executes_in_submission_order(gaps in prop::collection::vec(0..30_i64, 1..20)) {
        let mut account = Account::new(1_000_000.0);
        account.set_max_positions(100).unwrap();

        let mut orders = Vec::with_capacity(gaps.len());
        let mut minutes = 0;
        for gap in gaps {
            minutes += gap;
            let order = market(Direction::Buy, 1, 10.0);
            account.submit_order(order.clone(), Some(at(minutes))).unwrap();
            orders.push(order);
        }

        let times = account.submission_queue().filter_map(Order::submitted_at).collect::<Vec<_>>();
        prop_assert!(times.windows(2).all(|w| w[0] <= w[1]));

        for order in &orders {
            let before = account.submission_queue().count();
            account.execute_order(Some(order)).unwrap().unwrap();
            prop_assert_eq!(account.submission_queue().count(), before - 1);
        }
        prop_assert!(account.executed_orders().eq(orders.iter()));
        prop_assert!(account.execute_order(orders.first()).unwrap().is_none());
    }
}

// ── 5. Lookback windows ──────────────────────────────────────────────

struct WindowRecorder {
    lookback: usize,
    lengths: Vec<usize>,
}

impl barsim::engine::Strategy for WindowRecorder {
    fn lookback(&self) -> usize {
        self.lookback
    }

    fn apply(&mut self, bar: &BarView<'_>, window: &[Bar]) -> Result<Option<Order>> {
        assert!(window.iter().all(|b| b.time() < bar.time()));
        self.lengths.push(window.len());
        Ok(None)
    }
}

proptest! {
    #[test]
    fn lookback_window_is_clipped(n in 1..40_usize, lookback in 0..50_usize) {
        let data: Arc<[Bar]> = (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                Bar::from((at(i as i64), close, close, close, close, 1.0))
            })
            .collect();
        let recorder = WindowRecorder { lookback, lengths: Vec::new() };
        let mut bt = Backtest::new(data, recorder).unwrap();
        bt.run().unwrap();

        let expected = (0..n).map(|i| i.min(lookback)).collect::<Vec<_>>();
        prop_assert_eq!(&bt.strategy().lengths, &expected);
    }
}
