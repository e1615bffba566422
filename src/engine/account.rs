use std::collections::{VecDeque, vec_deque::Iter};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::{Direction, Order, OrderRecord, OrderType, Position};
use crate::errors::{Error, Result};

/// Starting balance used when none is configured.
pub const DEFAULT_INITIAL_BALANCE: f64 = 1_000_000.0;

/// Settings an [`Account`] is built from.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountConfig {
    /// Cash available before the first order.
    pub initial_balance: f64,
    /// Number of positions that may be open at once.
    pub max_positions: usize,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            initial_balance: DEFAULT_INITIAL_BALANCE,
            max_positions: 1,
        }
    }
}

/// Why a valid market order left the account untouched.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// BUY while the single allowed position is already open.
    AlreadyInPosition,
    /// SHORT while no position is open (single-position mode).
    NotInPosition,
    /// BUY while `max_positions` positions are open.
    MaxPositionsReached,
    /// SHORT while no position is open (multi-position mode).
    NoOpenPositions,
    /// Direction the account does not act on.
    UnhandledDirection(Direction),
}

/// Result of applying one order to the account.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessOutcome {
    /// No order was given.
    NoOrder,
    /// The order moved cash: negative for outflows, positive for inflows.
    Executed {
        /// Signed cash delta.
        delta: f64,
    },
    /// Business-rule rejection; no state changed.
    Rejected(Rejection),
    /// Limit and stop orders have no fill logic; no state changed.
    Unsupported(OrderType),
}

impl ProcessOutcome {
    /// Returns the signed cash delta, `0.0` unless the order executed.
    pub fn delta(&self) -> f64 {
        match self {
            Self::Executed { delta } => *delta,
            _ => 0.0,
        }
    }

    /// Returns `true` if the order moved cash.
    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed { .. })
    }
}

/// An order taken off the submission queue, with what it did to the account.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// Snapshot of the executed order.
    pub record: OrderRecord,
    /// Effect of the order on the account.
    pub outcome: ProcessOutcome,
}

/// Simulated brokerage account: cash balance, open positions, the queue of
/// submitted orders and the log of executed ones.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct Account {
    // Initial balance used for reset
    initial_balance: f64,
    balance: f64,
    max_positions: usize,
    // Open lots, oldest first
    positions: VecDeque<Position>,
    closed_positions: Vec<Position>,
    submission_queue: VecDeque<Order>,
    executed_log: Vec<Order>,
}

impl Default for Account {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_BALANCE)
    }
}

impl Account {
    /// Creates a single-position account holding `initial_balance`.
    pub fn new(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            balance: initial_balance,
            max_positions: 1,
            positions: VecDeque::new(),
            closed_positions: Vec::new(),
            submission_queue: VecDeque::new(),
            executed_log: Vec::new(),
        }
    }

    /// Creates an account from a validated configuration.
    pub fn from_config(config: AccountConfig) -> Result<Self> {
        if !config.initial_balance.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "initial balance must be finite (got: {})",
                config.initial_balance
            )));
        }
        let mut account = Self::new(config.initial_balance);
        account.set_max_positions(config.max_positions)?;
        Ok(account)
    }

    /// Returns the balance the account started with and resets to.
    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// Returns the cash balance.
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Returns how many positions may be open at once.
    pub fn max_positions(&self) -> usize {
        self.max_positions
    }

    /// Sets how many positions may be open at once.
    ///
    /// ### Errors
    /// `InvalidConfiguration` if `n` is zero or lower than the number of open positions.
    pub fn set_max_positions(&mut self, n: usize) -> Result<()> {
        if n < 1 {
            return Err(Error::InvalidConfiguration(
                "max positions cannot be less than 1".to_string(),
            ));
        }
        if n < self.positions.len() {
            return Err(Error::InvalidConfiguration(format!(
                "max positions ({n}) is below the {} open positions",
                self.positions.len()
            )));
        }
        self.max_positions = n;
        Ok(())
    }

    /// Returns `true` while at least one position is open.
    pub fn in_position(&self) -> bool {
        !self.positions.is_empty()
    }

    /// Returns the number of open positions.
    pub fn num_positions(&self) -> usize {
        self.positions.len()
    }

    /// Returns an iterator over the open positions, oldest first.
    pub fn positions(&self) -> Iter<'_, Position> {
        self.positions.iter()
    }

    /// Returns an iterator over the closed positions, in closing order.
    pub fn closed_positions(&self) -> std::slice::Iter<'_, Position> {
        self.closed_positions.iter()
    }

    /// Returns an iterator over the orders awaiting execution, earliest first.
    pub fn submission_queue(&self) -> Iter<'_, Order> {
        self.submission_queue.iter()
    }

    /// Returns an iterator over the executed orders, in execution order.
    pub fn executed_orders(&self) -> std::slice::Iter<'_, Order> {
        self.executed_log.iter()
    }

    /// Applies an order to the account right away.
    ///
    /// ### Returns
    /// The outcome; its [`delta`](ProcessOutcome::delta) is the signed cash movement.
    ///
    /// ### Errors
    /// `InvalidConfiguration` if `max_positions` is below 1.
    pub fn process_order(&mut self, order: Option<&Order>) -> Result<ProcessOutcome> {
        match order {
            Some(order) => self.apply(order),
            None => Ok(ProcessOutcome::NoOrder),
        }
    }

    /// Appends an order to the submission queue.
    ///
    /// The order is stamped with `submission_time`, or the current time if none is given.
    ///
    /// ### Errors
    /// * `InvalidArgument` if the time is earlier than the last queued submission.
    /// * `InvalidState` if the order was already submitted or processed.
    pub fn submit_order(&mut self, mut order: Order, submission_time: Option<DateTime<Utc>>) -> Result<()> {
        if let Some(processed) = order.processed_at() {
            return Err(Error::InvalidState(format!(
                "order #{} was already processed at {processed}",
                order.id()
            )));
        }
        let time = submission_time.unwrap_or_else(Utc::now);
        if let Some(last) = self.submission_queue.back().and_then(Order::submitted_at)
            && time < last
        {
            return Err(Error::InvalidArgument(format!(
                "submission time {time} is earlier than the last queued submission {last}"
            )));
        }
        order.set_submitted_at(time)?;
        self.submission_queue.push_back(order);
        Ok(())
    }

    /// Executes the head of the submission queue.
    ///
    /// `order` must be the head of the queue: execution is always first-in-first-out.
    /// Ids alone can collide, so the head must also carry the same trade request.
    ///
    /// ### Returns
    /// `None` if the queue is empty, otherwise the executed order's record and outcome.
    ///
    /// ### Errors
    /// * `InvalidArgument` if no order is given.
    /// * `OrderMismatch` if `order` is not the queue head.
    pub fn execute_order(&mut self, order: Option<&Order>) -> Result<Option<Execution>> {
        let order = order.ok_or_else(|| Error::InvalidArgument("no order to execute".to_string()))?;
        let Some(head) = self.submission_queue.front() else {
            return Ok(None);
        };
        if !head.same_request(order) {
            return Err(Error::OrderMismatch(head.id(), order.id()));
        }
        self.execute_head(Utc::now())
    }

    /// Dequeues the head order, applies it and moves it to the executed log.
    pub(crate) fn execute_head(&mut self, processed_at: DateTime<Utc>) -> Result<Option<Execution>> {
        self.check_max_positions()?;
        let Some(head) = self.submission_queue.front_mut() else {
            return Ok(None);
        };
        head.set_processed_at(processed_at)?;
        let Some(order) = self.submission_queue.pop_front() else {
            return Ok(None);
        };
        let outcome = self.apply(&order)?;
        debug!(
            order_id = order.id(),
            direction = %order.direction(),
            shares = order.shares(),
            price = order.price(),
            delta = outcome.delta(),
            balance = self.balance,
            "Executed order"
        );
        let execution = Execution {
            record: order.to_record(),
            outcome,
        };
        self.executed_log.push(order);
        Ok(Some(execution))
    }

    /// Resets the account to its initial balance and drops every order and position.
    pub fn reset(&mut self) {
        self.balance = self.initial_balance;
        self.positions.clear();
        self.closed_positions.clear();
        self.submission_queue.clear();
        self.executed_log.clear();
    }

    fn check_max_positions(&self) -> Result<()> {
        if self.max_positions < 1 {
            return Err(Error::InvalidConfiguration(
                "max positions cannot be less than 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Position and balance transitions shared by the immediate and queued paths.
    fn apply(&mut self, order: &Order) -> Result<ProcessOutcome> {
        self.check_max_positions()?;

        match order.order_type() {
            OrderType::Market => {}
            order_type @ (OrderType::Limit | OrderType::Stop) => {
                warn!(order_id = order.id(), %order_type, "No fill logic for this order type, skipping");
                return Ok(ProcessOutcome::Unsupported(order_type));
            }
        }

        let total = order.total();
        let outcome = match (order.direction(), self.max_positions) {
            (Direction::Buy, 1) if self.in_position() => ProcessOutcome::Rejected(Rejection::AlreadyInPosition),
            (Direction::Buy, max) if self.positions.len() >= max => {
                ProcessOutcome::Rejected(Rejection::MaxPositionsReached)
            }
            (Direction::Buy, _) => {
                self.positions.push_back(Position::from(order));
                self.balance -= total;
                ProcessOutcome::Executed { delta: -total }
            }
            (Direction::Short, 1) if !self.in_position() => ProcessOutcome::Rejected(Rejection::NotInPosition),
            (Direction::Short, 1) => {
                self.close_positions(order, true);
                self.balance += total;
                ProcessOutcome::Executed { delta: total }
            }
            (Direction::Short, _) if self.positions.is_empty() => {
                ProcessOutcome::Rejected(Rejection::NoOpenPositions)
            }
            (Direction::Short, _) => {
                self.close_positions(order, false);
                self.balance += total;
                ProcessOutcome::Executed { delta: total }
            }
            (direction @ (Direction::Sell | Direction::Cover), _) => {
                ProcessOutcome::Rejected(Rejection::UnhandledDirection(direction))
            }
        };
        Ok(outcome)
    }

    /// Closes the oldest position, then every following one the remaining shares
    /// fully cover (or all of them when `all` is set).
    ///
    /// The order's shares are split over the closed lots so that their exit
    /// proceeds add up to the cash the order credits.
    fn close_positions(&mut self, order: &Order, all: bool) {
        let mut remaining = order.shares();
        let mut lots = Vec::new();
        while let Some(position) = self.positions.pop_front() {
            if !all && !lots.is_empty() && position.shares() > remaining {
                self.positions.push_front(position);
                break;
            }
            remaining = remaining.saturating_sub(position.shares());
            lots.push(position);
        }

        let exit_price = order.price();
        let mut unallocated = order.shares();
        let last = lots.len().saturating_sub(1);
        for (i, position) in lots.into_iter().enumerate() {
            let exit_shares = if i == last {
                unallocated
            } else {
                position.shares().min(unallocated)
            };
            unallocated -= exit_shares;
            self.closed_positions.push(position.close(exit_price, exit_shares));
        }
    }
}

#[cfg(test)]
fn market(direction: Direction, shares: i64, price: f64) -> Order {
    Order::new(direction, OrderType::Market, shares, price, "TSLA").unwrap()
}

#[cfg(test)]
fn at(minutes: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + minutes * 60, 0).unwrap()
}

#[cfg(test)]
#[test]
fn new_account_defaults() {
    let account = Account::default();
    assert_eq!(account.balance(), 1_000_000.0);
    assert_eq!(account.max_positions(), 1);
    assert_eq!(account.num_positions(), 0);
    assert!(!account.in_position());
    assert_eq!(account.submission_queue().count(), 0);
    assert_eq!(account.executed_orders().count(), 0);
}

#[cfg(test)]
#[test]
fn max_positions_setter() {
    let mut account = Account::default();
    assert!(matches!(account.set_max_positions(0), Err(Error::InvalidConfiguration(_))));
    assert_eq!(account.max_positions(), 1);

    account.set_max_positions(5).unwrap();
    assert_eq!(account.max_positions(), 5);
}

#[cfg(test)]
#[test]
fn max_positions_below_open_positions() {
    let mut account = Account::new(1000.0);
    account.set_max_positions(3).unwrap();
    for _ in 0..2 {
        account.process_order(Some(&market(Direction::Buy, 1, 10.0))).unwrap();
    }
    assert!(matches!(account.set_max_positions(1), Err(Error::InvalidConfiguration(_))));
    account.set_max_positions(2).unwrap();
}

#[cfg(test)]
#[test]
fn from_config() {
    let account = Account::from_config(AccountConfig {
        initial_balance: 1000.0,
        max_positions: 2,
    })
    .unwrap();
    assert_eq!(account.balance(), 1000.0);
    assert_eq!(account.max_positions(), 2);

    let result = Account::from_config(AccountConfig {
        initial_balance: 1000.0,
        max_positions: 0,
    });
    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));

    let result = Account::from_config(AccountConfig {
        initial_balance: f64::NAN,
        max_positions: 1,
    });
    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
}

#[cfg(test)]
#[test]
fn process_no_order() {
    let mut account = Account::new(1000.0);
    let outcome = account.process_order(None).unwrap();
    assert_eq!(outcome, ProcessOutcome::NoOrder);
    assert_eq!(outcome.delta(), 0.0);
    assert_eq!(account.balance(), 1000.0);
}

#[cfg(test)]
#[test]
fn single_position_buy_then_short() {
    let mut account = Account::new(1000.0);

    let outcome = account.process_order(Some(&market(Direction::Buy, 2, 100.0))).unwrap();
    assert_eq!(outcome, ProcessOutcome::Executed { delta: -200.0 });
    assert!(account.in_position());
    assert_eq!(account.balance(), 800.0);

    let outcome = account.process_order(Some(&market(Direction::Short, 2, 110.0))).unwrap();
    assert_eq!(outcome, ProcessOutcome::Executed { delta: 220.0 });
    assert!(!account.in_position());
    assert_eq!(account.num_positions(), 0);
    assert_eq!(account.balance(), 1020.0);
    assert_eq!(account.closed_positions().next().and_then(Position::pnl), Some(20.0));
}

#[cfg(test)]
#[test]
fn single_position_double_buy() {
    let mut account = Account::new(1000.0);
    account.process_order(Some(&market(Direction::Buy, 1, 100.0))).unwrap();

    let outcome = account.process_order(Some(&market(Direction::Buy, 1, 100.0))).unwrap();
    assert_eq!(outcome, ProcessOutcome::Rejected(Rejection::AlreadyInPosition));
    assert_eq!(outcome.delta(), 0.0);
    assert_eq!(account.balance(), 900.0);
    assert!(account.in_position());
}

#[cfg(test)]
#[test]
fn single_position_short_without_position() {
    let mut account = Account::new(1000.0);
    let outcome = account.process_order(Some(&market(Direction::Short, 1, 100.0))).unwrap();
    assert_eq!(outcome, ProcessOutcome::Rejected(Rejection::NotInPosition));
    assert_eq!(account.balance(), 1000.0);
}

#[cfg(test)]
#[test]
fn sell_and_cover_are_not_acted_on() {
    let mut account = Account::new(1000.0);
    account.process_order(Some(&market(Direction::Buy, 1, 100.0))).unwrap();

    for direction in [Direction::Sell, Direction::Cover] {
        let outcome = account.process_order(Some(&market(direction, 1, 120.0))).unwrap();
        assert_eq!(outcome, ProcessOutcome::Rejected(Rejection::UnhandledDirection(direction)));
    }
    assert_eq!(account.balance(), 900.0);
    assert!(account.in_position());
}

#[cfg(test)]
#[test]
fn multi_position_cap() {
    let mut account = Account::new(1000.0);
    account.set_max_positions(3).unwrap();

    for n in 1..=3 {
        let outcome = account.process_order(Some(&market(Direction::Buy, 1, 10.0))).unwrap();
        assert!(outcome.is_executed());
        assert_eq!(account.num_positions(), n);
    }

    let outcome = account.process_order(Some(&market(Direction::Buy, 1, 10.0))).unwrap();
    assert_eq!(outcome, ProcessOutcome::Rejected(Rejection::MaxPositionsReached));
    assert_eq!(account.num_positions(), 3);
    assert_eq!(account.balance(), 970.0);

    for n in (0..3).rev() {
        account.process_order(Some(&market(Direction::Short, 1, 10.0))).unwrap();
        assert_eq!(account.num_positions(), n);
    }
    assert!(!account.in_position());

    let outcome = account.process_order(Some(&market(Direction::Short, 1, 10.0))).unwrap();
    assert_eq!(outcome, ProcessOutcome::Rejected(Rejection::NoOpenPositions));
    assert_eq!(account.num_positions(), 0);
    assert_eq!(account.balance(), 1000.0);
}

#[cfg(test)]
#[test]
fn multi_position_short_closes_covered_lots() {
    let mut account = Account::new(1000.0);
    account.set_max_positions(4).unwrap();
    account.process_order(Some(&market(Direction::Buy, 1, 10.0))).unwrap();
    account.process_order(Some(&market(Direction::Buy, 2, 10.0))).unwrap();
    account.process_order(Some(&market(Direction::Buy, 1, 10.0))).unwrap();

    // 2 shares cover the first lot (1) but not the second (2)
    account.process_order(Some(&market(Direction::Short, 2, 12.0))).unwrap();
    assert_eq!(account.num_positions(), 2);

    // a smaller order still closes the oldest lot
    account.process_order(Some(&market(Direction::Short, 1, 12.0))).unwrap();
    assert_eq!(account.num_positions(), 1);
    assert!(account.in_position());
    assert_eq!(account.closed_positions().count(), 2);
}

#[cfg(test)]
#[test]
fn unsupported_order_types() {
    let mut account = Account::new(1000.0);
    for order_type in [OrderType::Stop, OrderType::Limit] {
        let order = Order::new(Direction::Buy, order_type, 1, 10.0, "").unwrap();
        let outcome = account.process_order(Some(&order)).unwrap();
        assert_eq!(outcome, ProcessOutcome::Unsupported(order_type));
        assert_eq!(outcome.delta(), 0.0);
    }
    assert_eq!(account.balance(), 1000.0);
    assert!(!account.in_position());
}

#[cfg(test)]
#[test]
fn invalid_max_positions_at_process_time() {
    let mut account = Account::new(1000.0);
    account.max_positions = 0;
    let result = account.process_order(Some(&market(Direction::Buy, 1, 10.0)));
    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    assert_eq!(account.balance(), 1000.0);

    account.submit_order(market(Direction::Buy, 1, 10.0), Some(at(0))).unwrap();
    assert!(matches!(account.execute_head(at(1)), Err(Error::InvalidConfiguration(_))));
    assert_eq!(account.submission_queue().count(), 1);
}

#[cfg(test)]
#[test]
fn submit_stamps_and_orders() {
    let mut account = Account::new(1000.0);
    for minutes in [0, 5, 5, 10] {
        account.submit_order(market(Direction::Buy, 1, 10.0), Some(at(minutes))).unwrap();
    }
    assert_eq!(account.submission_queue().count(), 4);

    let times = account
        .submission_queue()
        .map(|o| o.submitted_at().unwrap())
        .collect::<Vec<_>>();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
}

#[cfg(test)]
#[test]
fn submit_defaults_to_now() {
    let mut account = Account::new(1000.0);
    let before = Utc::now();
    account.submit_order(market(Direction::Buy, 1, 10.0), None).unwrap();
    let submitted = account.submission_queue().next().and_then(Order::submitted_at).unwrap();
    assert!(submitted >= before);
}

#[cfg(test)]
#[test]
fn submit_rejects_earlier_time() {
    let mut account = Account::new(1000.0);
    account.submit_order(market(Direction::Buy, 1, 10.0), Some(at(10))).unwrap();
    let result = account.submit_order(market(Direction::Buy, 1, 10.0), Some(at(5)));
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    assert_eq!(account.submission_queue().count(), 1);
}

#[cfg(test)]
#[test]
fn submit_twice_is_invalid_state() {
    let mut account = Account::new(1000.0);
    let mut order = market(Direction::Buy, 1, 10.0);
    order.set_submitted_at(at(0)).unwrap();
    let result = account.submit_order(order, Some(at(1)));
    assert!(matches!(result, Err(Error::InvalidState(_))));
}

#[cfg(test)]
#[test]
fn execute_requires_an_order() {
    let mut account = Account::new(1000.0);
    assert!(matches!(account.execute_order(None), Err(Error::InvalidArgument(_))));
}

#[cfg(test)]
#[test]
fn execute_empty_queue_is_noop() {
    let mut account = Account::new(1000.0);
    let order = market(Direction::Buy, 1, 10.0);
    assert!(account.execute_order(Some(&order)).unwrap().is_none());
    assert_eq!(account.balance(), 1000.0);
}

#[cfg(test)]
#[test]
fn execute_mismatched_order() {
    let mut account = Account::new(1000.0);
    let first = market(Direction::Buy, 1, 10.0);
    let second = market(Direction::Buy, 1, 12.0);
    account.submit_order(first.clone(), Some(at(0))).unwrap();
    account.submit_order(second.clone(), Some(at(5))).unwrap();

    let result = account.execute_order(Some(&second));
    assert!(matches!(result, Err(Error::OrderMismatch(head, got)) if head == first.id() && got == second.id()));
    assert_eq!(account.submission_queue().count(), 2);
}

#[cfg(test)]
#[test]
fn execute_moves_head_to_log() {
    let mut account = Account::new(1000.0);
    let first = market(Direction::Buy, 1, 420.01);
    account.submit_order(first.clone(), Some(at(0))).unwrap();
    account.submit_order(market(Direction::Short, 1, 450.10), Some(at(5))).unwrap();

    let execution = account.execute_order(Some(&first)).unwrap().unwrap();
    assert_eq!(execution.record.price, 420.01);
    assert_eq!(execution.record.submission_time, Some(at(0)));
    assert_eq!(execution.outcome, ProcessOutcome::Executed { delta: -420.01 });
    assert_eq!(account.submission_queue().count(), 1);

    let executed = account.executed_orders().next().unwrap();
    assert_eq!(executed, &first);
    assert!(executed.processed_at().is_some());
}

#[cfg(test)]
#[test]
fn queued_scenario_multi_position() {
    let mut account = Account::new(1000.0);
    account.set_max_positions(2).unwrap();

    let orders = vec![
        market(Direction::Buy, 1, 300.0),
        market(Direction::Buy, 1, 350.01),
        market(Direction::Short, 2, 325.50),
    ];
    for (i, order) in orders.iter().enumerate() {
        account.submit_order(order.clone(), Some(at(i as i64 * 5))).unwrap();
    }
    for (n, order) in orders.iter().enumerate() {
        account.execute_order(Some(order)).unwrap().unwrap();
        assert_eq!(account.submission_queue().count(), orders.len() - n - 1);
    }

    assert!((account.balance() - 1000.99).abs() < 1e-9);
    assert_eq!(account.num_positions(), 0);
    assert!(!account.in_position());
    assert_eq!(account.executed_orders().count(), 3);
}

#[cfg(test)]
#[test]
fn reset_account() {
    let mut account = Account::new(1000.0);
    account.submit_order(market(Direction::Buy, 1, 10.0), Some(at(0))).unwrap();
    account.execute_head(at(1)).unwrap();
    account.submit_order(market(Direction::Short, 1, 10.0), Some(at(2))).unwrap();

    account.reset();
    assert_eq!(account.balance(), 1000.0);
    assert!(!account.in_position());
    assert_eq!(account.submission_queue().count(), 0);
    assert_eq!(account.executed_orders().count(), 0);
    assert_eq!(account.closed_positions().count(), 0);
}

#[cfg(test)]
#[test]
fn processed_orders_cannot_be_resubmitted() {
    let mut account = Account::new(1000.0);
    let mut order = market(Direction::Buy, 1, 100.0);
    order.set_processed_at(at(0)).unwrap();

    let result = account.submit_order(order, Some(at(1)));
    assert!(matches!(result, Err(Error::InvalidState(_))));
    assert_eq!(account.submission_queue().count(), 0);
    assert_eq!(account.balance(), 1000.0);
}

#[cfg(test)]
#[test]
fn failed_stamp_leaves_the_queue_untouched() {
    let mut account = Account::new(1000.0);
    account.submit_order(market(Direction::Buy, 1, 100.0), Some(at(0))).unwrap();
    account.submission_queue.front_mut().unwrap().set_processed_at(at(1)).unwrap();

    assert!(matches!(account.execute_head(at(2)), Err(Error::InvalidState(_))));
    assert_eq!(account.balance(), 1000.0);
    assert!(!account.in_position());
    assert_eq!(account.submission_queue().count(), 1);
    assert_eq!(account.executed_orders().count(), 0);
}

#[cfg(test)]
#[test]
fn small_short_closes_a_larger_lot() {
    let mut account = Account::new(1000.0);
    account.process_order(Some(&market(Direction::Buy, 10, 100.0))).unwrap();
    let outcome = account.process_order(Some(&market(Direction::Short, 1, 90.0))).unwrap();

    assert_eq!(outcome.delta(), 90.0);
    assert_eq!(account.balance(), 90.0);
    assert!(!account.in_position());

    let pnl = account.closed_positions().filter_map(Position::pnl).sum::<f64>();
    assert_eq!(pnl, account.balance() - account.initial_balance());
    assert_eq!(pnl, -910.0);
}

#[cfg(test)]
#[test]
fn closed_lots_account_for_every_short_share() {
    let mut account = Account::new(1000.0);
    account.set_max_positions(3).unwrap();
    account.process_order(Some(&market(Direction::Buy, 1, 10.0))).unwrap();
    account.process_order(Some(&market(Direction::Buy, 1, 10.0))).unwrap();
    account.process_order(Some(&market(Direction::Buy, 1, 10.0))).unwrap();

    // three shares cover the three one-share lots
    account.process_order(Some(&market(Direction::Short, 3, 12.0))).unwrap();
    assert_eq!(account.num_positions(), 0);
    let exit_shares = account.closed_positions().map(Position::exit_shares).collect::<Vec<_>>();
    assert_eq!(exit_shares, [1, 1, 1]);

    account.process_order(Some(&market(Direction::Buy, 2, 10.0))).unwrap();
    account.process_order(Some(&market(Direction::Short, 5, 12.0))).unwrap();
    assert_eq!(account.closed_positions().last().map(Position::exit_shares), Some(5));

    let pnl = account.closed_positions().filter_map(Position::pnl).sum::<f64>();
    assert!((pnl - (account.balance() - account.initial_balance())).abs() < 1e-9);
}
