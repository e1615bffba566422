use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use chrono::{DateTime, Duration};

use super::*;

fn get_data() -> Arc<[Bar]> {
    let start = DateTime::from_timestamp(1_515_151_515, 0).unwrap();
    [100.0, 110.0, 120.0, 110.0, 130.0]
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let time = start + Duration::days(i as i64);
            Bar::from((time, close - 5.0, close + 5.0, close - 10.0, close, 1.0))
        })
        .collect()
}

/// Replays a fixed list of decisions, one per bar, and records what it saw.
#[derive(Default)]
struct Scripted {
    lookback: usize,
    decisions: Vec<Option<Order>>,
    init_calls: usize,
    applied: usize,
    windows: Vec<usize>,
    seen_sma: Vec<Option<f64>>,
}

impl Strategy for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn lookback(&self) -> usize {
        self.lookback
    }

    fn init(&mut self, _data: &[Bar]) -> Result<()> {
        self.init_calls += 1;
        Ok(())
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(Sma::new("sma_2", 2))]
    }

    fn apply(&mut self, bar: &BarView<'_>, window: &[Bar]) -> Result<Option<Order>> {
        self.applied += 1;
        self.windows.push(window.len());
        self.seen_sma.push(bar.indicator("sma_2"));
        if let Some(previous) = window.last() {
            assert!(previous.time() < bar.time());
        }
        Ok(self.decisions.get(bar.index()).cloned().flatten())
    }
}

fn buy(price: f64) -> Option<Order> {
    Order::buy().price(price).ticker("SPY").build().ok()
}

fn short(price: f64) -> Option<Order> {
    Order::short().price(price).ticker("SPY").build().ok()
}

/// Counts every call into the strategy through a shared cell.
struct Counting(Rc<Cell<usize>>);

impl Strategy for Counting {
    fn init(&mut self, _data: &[Bar]) -> Result<()> {
        self.0.set(self.0.get() + 1);
        Ok(())
    }

    fn apply(&mut self, _bar: &BarView<'_>, _window: &[Bar]) -> Result<Option<Order>> {
        self.0.set(self.0.get() + 1);
        Ok(None)
    }
}

#[test]
fn empty_dataset() {
    let calls = Rc::new(Cell::new(0));
    let data: Arc<[Bar]> = Arc::from(Vec::new());
    let result = Backtest::new(data, Counting(Rc::clone(&calls)));
    assert!(matches!(result, Err(Error::EmptyDataset)));
    assert_eq!(calls.get(), 0);
}

#[test]
fn queued_account_is_refused() {
    let calls = Rc::new(Cell::new(0));
    let mut account = Account::new(1000.0);
    account.submit_order(buy(50.0).unwrap(), None).unwrap();

    let result = Backtest::with_account(get_data(), Counting(Rc::clone(&calls)), account);
    assert!(matches!(result, Err(Error::InvalidState(_))));
    assert_eq!(calls.get(), 0);
}

#[test]
fn each_order_executes_on_its_own_bar() {
    let strategy = Scripted {
        decisions: vec![buy(100.0), None, short(120.0), buy(110.0), short(130.0)],
        ..Default::default()
    };
    let mut bt = Backtest::with_account(get_data(), strategy, Account::new(1000.0)).unwrap();
    bt.run().unwrap();

    let indices = bt.cash_flows().map(|flow| flow.index).collect::<Vec<_>>();
    assert_eq!(indices, [0, 2, 3, 4]);
    assert_eq!(bt.submission_queue().count(), 0);
    assert!(bt
        .executed_orders()
        .all(|order| order.submitted_at() == order.processed_at()));
    assert_eq!(bt.balance(), 1040.0);
}

#[test]
fn init_once_and_visit_every_bar() {
    let mut bt = Backtest::new(get_data(), Scripted::default()).unwrap();
    assert_eq!(bt.strategy().init_calls, 1);

    let balance = bt.run().unwrap();
    assert_eq!(balance, 1_000_000.0);
    assert_eq!(bt.strategy().init_calls, 1);
    assert_eq!(bt.strategy().applied, 5);
    assert_eq!(bt.cash_flows().count(), 0);
}

#[test]
fn lookback_window_is_clipped() {
    let strategy = Scripted {
        lookback: 3,
        ..Default::default()
    };
    let mut bt = Backtest::new(get_data(), strategy).unwrap();
    bt.run().unwrap();
    assert_eq!(bt.strategy().windows, vec![0, 1, 2, 3, 3]);
}

#[test]
fn zero_lookback() {
    let mut bt = Backtest::new(get_data(), Scripted::default()).unwrap();
    bt.run().unwrap();
    assert!(bt.strategy().windows.iter().all(|&len| len == 0));
}

#[test]
fn indicators_are_precomputed() {
    let mut bt = Backtest::new(get_data(), Scripted::default()).unwrap();
    bt.run().unwrap();

    let seen = &bt.strategy().seen_sma;
    assert_eq!(seen[0].map(f64::is_nan), Some(true));
    assert_eq!(seen[1], Some(105.0));
    assert_eq!(seen[4], Some(120.0));
    assert_eq!(bt.indicators().series("sma_2").map(<[f64]>::len), Some(5));
}

#[test]
fn long_round_trip() {
    let strategy = Scripted {
        decisions: vec![buy(100.0), None, short(120.0)],
        ..Default::default()
    };
    let account = Account::new(1000.0);
    let mut bt = Backtest::with_account(get_data(), strategy, account).unwrap();

    let balance = bt.run().unwrap();
    assert_eq!(balance, 1020.0);
    assert!(!bt.in_position());

    let flows = bt.cash_flows().collect::<Vec<_>>();
    assert_eq!(flows.len(), 2);
    assert_eq!((flows[0].index, flows[0].amount, flows[0].balance), (0, -100.0, 900.0));
    assert_eq!((flows[1].index, flows[1].amount, flows[1].balance), (2, 120.0, 1020.0));

    let executed = bt.executed_orders().collect::<Vec<_>>();
    assert_eq!(executed.len(), 2);
    assert_eq!(executed[0].submitted_at(), Some(get_data()[0].time()));
    assert_eq!(executed[1].processed_at(), Some(get_data()[2].time()));
}

#[test]
fn rejected_orders_are_logged_without_cash_flow() {
    let strategy = Scripted {
        decisions: vec![buy(100.0), buy(110.0), short(120.0), short(110.0)],
        ..Default::default()
    };
    let mut bt = Backtest::with_account(get_data(), strategy, Account::new(1000.0)).unwrap();
    bt.run().unwrap();

    assert_eq!(bt.executed_orders().count(), 4);
    assert_eq!(bt.cash_flows().count(), 2);
    assert_eq!(bt.balance(), 1020.0);
}

#[test]
fn unsupported_orders_change_nothing() {
    let stop = Order::buy().order_type(OrderType::Stop).price(100.0).build().ok();
    let strategy = Scripted {
        decisions: vec![stop],
        ..Default::default()
    };
    let mut bt = Backtest::with_account(get_data(), strategy, Account::new(1000.0)).unwrap();
    bt.run().unwrap();

    assert_eq!(bt.balance(), 1000.0);
    assert!(!bt.in_position());
    assert_eq!(bt.cash_flows().count(), 0);
}

struct Failing;

impl Strategy for Failing {
    fn apply(&mut self, bar: &BarView<'_>, _window: &[Bar]) -> Result<Option<Order>> {
        if bar.index() == 2 {
            return Err(Error::Msg("boom".to_string()));
        }
        Ok(buy(bar.close()))
    }
}

#[test]
fn strategy_errors_abort_the_run() {
    let mut bt = Backtest::with_account(get_data(), Failing, Account::new(1000.0)).unwrap();
    let result = bt.run();
    assert!(matches!(result, Err(Error::Msg(msg)) if msg == "boom"));
    assert_eq!(bt.executed_orders().count(), 2);
}

#[test]
fn reset_backtest() {
    let strategy = Scripted {
        decisions: vec![buy(100.0)],
        ..Default::default()
    };
    let mut bt = Backtest::with_account(get_data(), strategy, Account::new(1000.0)).unwrap();
    bt.run().unwrap();
    assert_eq!(bt.balance(), 900.0);

    bt.reset();
    assert_eq!(bt.balance(), 1000.0);
    assert_eq!(bt.cash_flows().count(), 0);
    assert!(bt.indicators().is_empty());
}
