//! Core backtesting components.
//!
//! This module provides the fundamental types for backtesting:
//! - `Order`: a validated trade request.
//! - `Account`: balance, open positions, submission queue and executed log.
//! - `Bar`: OHLCV data for backtesting.
//! - `Indicator` / `Strategy`: user capabilities driven by `Backtest`.

mod account;
mod bar;
mod indicator;
mod order;
mod position;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::errors::{Error, Result};

pub use account::*;
pub use bar::*;
pub use indicator::*;
pub use order::*;
pub use position::*;

#[cfg(test)]
mod bt;

/// A trading strategy driven bar by bar.
///
/// Any type providing these methods qualifies; only `apply` is required.
pub trait Strategy {
    /// Display name, used in logs.
    fn name(&self) -> &str {
        ""
    }

    /// Number of previous bars handed to `apply`.
    fn lookback(&self) -> usize {
        0
    }

    /// One-time setup, called when the backtest is created.
    fn init(&mut self, _data: &[Bar]) -> Result<()> {
        Ok(())
    }

    /// Indicators computed once over the full history before the first bar.
    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        Vec::new()
    }

    /// Decides what to do at the current bar.
    ///
    /// ### Arguments
    /// * `bar` - The current bar with its indicator values.
    /// * `window` - Up to `lookback()` bars preceding the current one, oldest first.
    fn apply(&mut self, bar: &BarView<'_>, window: &[Bar]) -> Result<Option<Order>>;
}

/// The current bar as seen by a strategy, with the precomputed indicator values.
#[derive(Debug, Clone, Copy)]
pub struct BarView<'a> {
    index: usize,
    bar: &'a Bar,
    indicators: &'a IndicatorValues,
}

impl std::ops::Deref for BarView<'_> {
    type Target = Bar;

    fn deref(&self) -> &Self::Target {
        self.bar
    }
}

impl<'a> BarView<'a> {
    /// Wraps the bar at `index` with the run's indicator values.
    pub fn new(index: usize, bar: &'a Bar, indicators: &'a IndicatorValues) -> Self {
        Self {
            index,
            bar,
            indicators,
        }
    }

    /// Position of the bar in the history.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the underlying bar.
    pub fn bar(&self) -> &'a Bar {
        self.bar
    }

    /// Returns the value of indicator `name` at this bar.
    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get(name, self.index)
    }

    /// Looks up a bar field first, then an indicator with that name.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.bar.get(name).or_else(|| self.indicator(name))
    }
}

/// A non-zero cash movement recorded during a run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct CashFlow {
    /// Index of the bar that produced the order.
    pub index: usize,
    /// Time of that bar.
    pub time: DateTime<Utc>,
    /// Signed amount: negative for buys, positive for shorts.
    pub amount: f64,
    /// Account balance after the movement.
    pub balance: f64,
}

/// Backtesting engine: replays bars through a strategy against an account.
#[derive(Debug, Clone)]
pub struct Backtest<S> {
    data: Arc<[Bar]>,
    strategy: S,
    account: Account,
    indicators: IndicatorValues,
    cash_flows: Vec<CashFlow>,
}

impl<S> std::ops::Deref for Backtest<S> {
    type Target = Account;

    fn deref(&self) -> &Self::Target {
        &self.account
    }
}

impl<S: Strategy> Backtest<S> {
    /// Creates a new backtest with a default account.
    ///
    /// ### Arguments
    /// * `data` - Historical bars, in chronological order.
    /// * `strategy` - The strategy; its `init` is called here.
    ///
    /// ### Returns
    /// The new backtest instance, or `EmptyDataset` if `data` has no bars.
    pub fn new(data: Arc<[Bar]>, strategy: S) -> Result<Self> {
        Self::with_account(data, strategy, Account::default())
    }

    /// Creates a new backtest that trades through `account`.
    ///
    /// Every order the strategy returns is executed on the bar that produced it,
    /// so the account's submission queue must start empty.
    ///
    /// ### Errors
    /// * `EmptyDataset` if `data` has no bars.
    /// * `InvalidState` if `account` has orders waiting in its queue.
    pub fn with_account(data: Arc<[Bar]>, mut strategy: S, account: Account) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::EmptyDataset);
        }
        let pending = account.submission_queue().count();
        if pending > 0 {
            return Err(Error::InvalidState(format!(
                "account has {pending} queued orders; a backtest needs an empty queue"
            )));
        }
        strategy.init(&data)?;

        Ok(Self {
            data,
            strategy,
            account,
            indicators: IndicatorValues::new(),
            cash_flows: Vec::new(),
        })
    }

    /// Returns an iterator over the bars.
    pub fn bars(&self) -> std::slice::Iter<'_, Bar> {
        self.data.iter()
    }

    /// Returns the strategy.
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Returns the account orders are routed to.
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Returns the indicator series computed by the last run.
    pub fn indicators(&self) -> &IndicatorValues {
        &self.indicators
    }

    /// Returns an iterator over the recorded cash movements.
    pub fn cash_flows(&self) -> std::slice::Iter<'_, CashFlow> {
        self.cash_flows.iter()
    }

    /// Runs the strategy over every bar, in order.
    ///
    /// Each order returned by the strategy is submitted at the bar's time and
    /// executed right away through the account's queue.
    ///
    /// ### Returns
    /// The final balance, or the first error raised by the strategy or the account.
    pub fn run(&mut self) -> Result<f64> {
        let data = Arc::clone(&self.data);
        info!(strategy = self.strategy.name(), bars = data.len(), "Backtesting strategy");

        self.indicators.clear();
        for indicator in self.strategy.indicators() {
            let values = indicator.compute(&data);
            if values.len() != data.len() {
                return Err(Error::Msg(format!(
                    "indicator '{}' returned {} values for {} bars",
                    indicator.name(),
                    values.len(),
                    data.len()
                )));
            }
            debug!(indicator = indicator.name(), "Indicator added");
            self.indicators.insert(indicator.name(), values);
        }

        let lookback = self.strategy.lookback();
        for (index, bar) in data.iter().enumerate() {
            let window = &data[index.saturating_sub(lookback)..index];
            let view = BarView::new(index, bar, &self.indicators);
            let Some(order) = self.strategy.apply(&view, window)? else {
                continue;
            };

            self.account.submit_order(order, Some(bar.time()))?;
            let Some(execution) = self.account.execute_head(bar.time())? else {
                continue;
            };

            let amount = execution.outcome.delta();
            if amount != 0.0 {
                debug!(index, amount, balance = self.account.balance(), "Cash flow");
                self.cash_flows.push(CashFlow {
                    index,
                    time: bar.time(),
                    amount,
                    balance: self.account.balance(),
                });
            }
        }

        info!(
            strategy = self.strategy.name(),
            balance = self.account.balance(),
            executed = self.account.executed_orders().count(),
            "Backtest finished"
        );
        Ok(self.account.balance())
    }

    /// Resets the account and the recorded history. The strategy keeps its state.
    pub fn reset(&mut self) {
        self.account.reset();
        self.indicators.clear();
        self.cash_flows.clear();
    }
}
