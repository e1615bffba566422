//! Performance metrics for backtesting.
//!
//! This module provides tools to calculate:
//! - Max drawdown
//! - Profit factor
//! - Win rate
//!
//! It needs to enable `metrics` feature to use it.

use std::fmt;

use crate::PercentCalculus;
use crate::engine::*;

/// Summary of a finished run.
///
/// `Metrics` is typically built from a `Backtest` after `run`: the balance history
/// comes from its cash flows and the trades from the account's closed positions.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Metrics {
    initial_balance: f64,
    balance: f64,
    executed: usize,
    balances: Vec<f64>,
    closed_positions: Vec<Position>,
}

impl<S: Strategy> From<&Backtest<S>> for Metrics {
    fn from(value: &Backtest<S>) -> Self {
        Self {
            initial_balance: value.initial_balance(),
            balance: value.balance(),
            executed: value.executed_orders().count(),
            balances: value.cash_flows().map(|flow| flow.balance).collect(),
            closed_positions: value.closed_positions().cloned().collect(),
        }
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance from a balance history and the closed positions.
    pub fn new(initial_balance: f64, balances: Vec<f64>, closed_positions: Vec<Position>) -> Self {
        Self {
            initial_balance,
            balance: balances.last().copied().unwrap_or(initial_balance),
            executed: balances.len(),
            balances,
            closed_positions,
        }
    }

    /// Returns the initial balance.
    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// Returns the final balance.
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Returns the number of executed orders.
    pub fn executed(&self) -> usize {
        self.executed
    }

    /// Returns the change from the initial to the final balance, as a percentage.
    pub fn performance(&self) -> f64 {
        self.initial_balance.change(self.balance)
    }

    /// Computes the maximum drawdown of the balance history as a percentage.
    pub fn max_drawdown(&self) -> f64 {
        let mut max_peak = self.initial_balance;
        let mut max_drawdown = 0.0;

        for &balance in &self.balances {
            if balance > max_peak {
                max_peak = balance;
            }
            if max_peak <= 0.0 {
                continue;
            }
            let drawdown = (max_peak - balance) / max_peak;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        max_drawdown * 100.0
    }

    /// Computes the profit factor.
    pub fn profit_factor(&self) -> f64 {
        let mut total_gains = 0.0;
        let mut total_losses = 0.0;

        for pnl in self.closed_positions.iter().filter_map(Position::pnl) {
            if pnl > 0.0 {
                total_gains += pnl;
            } else {
                total_losses += pnl.abs();
            }
        }

        if total_losses == 0.0 {
            return f64::INFINITY;
        }

        total_gains / total_losses
    }

    /// Computes the win rate as a percentage of winning closed positions.
    pub fn win_rate(&self) -> f64 {
        let pnls = self.closed_positions.iter().filter_map(Position::pnl).collect::<Vec<_>>();
        if pnls.is_empty() {
            return 0.0;
        }

        let winning_trades = pnls.iter().filter(|&&pnl| pnl > 0.0).count();
        (winning_trades as f64 / pnls.len() as f64) * 100.0
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Backtest Metrics ===")?;
        writeln!(f, "Initial Balance: {:.2}", self.initial_balance)?;
        writeln!(f, "Final Balance: {:.2} ({:.2}%)", self.balance, self.performance())?;
        writeln!(f, "Executed Orders: {}", self.executed)?;
        #[allow(clippy::writeln_empty_string)]
        writeln!(f, "")?;
        writeln!(f, "Max Drawdown: {:.2}%", self.max_drawdown())?;
        writeln!(f, "Profit Factor: {:.2}", self.profit_factor())?;
        writeln!(f, "Win Rate: {:.2}%", self.win_rate())
    }
}

#[cfg(test)]
fn closed(entry_price: f64, exit_price: f64) -> Position {
    Position::from((entry_price, 1)).close(exit_price, 1)
}

#[cfg(test)]
#[test]
fn max_drawdown() {
    let metrics = Metrics::new(10000.0, vec![12000.0, 9000.0, 11000.0], vec![]);
    assert_eq!(metrics.max_drawdown(), 25.0); // (12000 - 9000) / 12000 = 25%
    assert_eq!(metrics.balance(), 11000.0);
}

#[cfg(test)]
#[test]
fn max_drawdown_no_flows() {
    let metrics = Metrics::new(10000.0, vec![], vec![]);
    assert_eq!(metrics.max_drawdown(), 0.0);
    assert_eq!(metrics.balance(), 10000.0);
    assert_eq!(metrics.performance(), 0.0);
}

#[cfg(test)]
#[test]
fn profit_factor() {
    let metrics = Metrics::new(10000.0, vec![], vec![closed(100.0, 120.0), closed(100.0, 90.0)]);
    assert_eq!(metrics.profit_factor(), 2.0); // 20 / 10 = 2.0
}

#[cfg(test)]
#[test]
fn profit_factor_no_losses() {
    let metrics = Metrics::new(10000.0, vec![], vec![closed(100.0, 120.0)]);
    assert_eq!(metrics.profit_factor(), f64::INFINITY);
}

#[cfg(test)]
#[test]
fn win_rate() {
    let metrics = Metrics::new(10000.0, vec![], vec![closed(100.0, 120.0), closed(100.0, 90.0)]);
    assert_eq!(metrics.win_rate(), 50.0);
}

#[cfg(test)]
#[test]
fn win_rate_no_trades() {
    let metrics = Metrics::new(10000.0, vec![], vec![]);
    assert_eq!(metrics.win_rate(), 0.0);
}

#[cfg(test)]
#[test]
fn from_backtest() {
    use std::sync::Arc;

    use chrono::{DateTime, Duration};

    struct BuyThenShort;

    impl Strategy for BuyThenShort {
        fn apply(&mut self, bar: &BarView<'_>, _window: &[Bar]) -> crate::errors::Result<Option<Order>> {
            let order = match bar.index() {
                0 => Order::buy().price(bar.close()).build()?,
                1 => Order::short().price(bar.close()).build()?,
                _ => return Ok(None),
            };
            Ok(Some(order))
        }
    }

    let data: Arc<[Bar]> = [100.0, 150.0, 120.0]
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar::from((DateTime::default() + Duration::days(i as i64), close, close, close, close, 1.0)))
        .collect();
    let mut bt = Backtest::with_account(data, BuyThenShort, Account::new(1000.0)).unwrap();
    bt.run().unwrap();

    let metrics = Metrics::from(&bt);
    assert_eq!(metrics.balance(), 1050.0);
    assert_eq!(metrics.executed(), 2);
    assert_eq!(metrics.win_rate(), 100.0);
    assert_eq!(metrics.performance(), 5.0);
    assert_eq!(metrics.max_drawdown(), 10.0); // 1000 -> 900
    assert!(metrics.to_string().contains("Final Balance: 1050.00"));
}
