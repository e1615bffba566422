//! # barsim: replay historical bars through a strategy
//!
//! **barsim** is a single-asset backtesting library. It replays historical price bars
//! through a user-supplied strategy, converts the strategy's decisions into orders and
//! applies those orders to a simulated brokerage account that tracks the cash balance
//! and the open positions.
//!
//! ## Core Components
//! | Component   | Description                                                                                     |
//! |-------------|-------------------------------------------------------------------------------------------------|
//! | **`Bar`** | One historical time-slice of OHLCV data.                                                        |
//! | **`Order`**  | A validated trade request: direction, type, shares, price, ticker.                            |
//! | **`Account`** | Balance, open positions, submission queue and executed-order log.                             |
//! | **`Indicator`** | A named series computed once over the whole history.                                         |
//! | **`Strategy`** | Decides, bar by bar, whether to place an order.                                               |
//! | **`Backtest`** | The driver that feeds every bar to the strategy and routes its orders to the account.        |
//! | **`Metrics`** | Drawdown, profit factor and win rate of a finished run.                                      |
//! | **`Optimizer`** | Runs independent backtests for many parameter sets in parallel.                              |
//!
//! ## Account Rules
//! Only market orders move cash; limit and stop orders are accepted but reported as
//! [`ProcessOutcome::Unsupported`](engine::ProcessOutcome::Unsupported).
//!
//! | Mode | BUY | SHORT |
//! |------|-----|-------|
//! | `max_positions == 1` | only when flat | only when in position, closes it |
//! | `max_positions > 1` | while fewer than `max_positions` are open | while one is open, closes the oldest |
//!
//! A disallowed transition (e.g. buying while already in position) is a
//! [`Rejection`](engine::Rejection), not an error.
//!
//! ## Getting Started
//! ```rust
//! use std::sync::Arc;
//!
//! use barsim::prelude::*;
//! use chrono::{DateTime, Duration};
//!
//! struct BuyAndHold;
//!
//! impl Strategy for BuyAndHold {
//!     fn apply(&mut self, bar: &BarView<'_>, _window: &[Bar]) -> Result<Option<Order>> {
//!         if bar.index() == 0 {
//!             return Ok(Some(Order::buy().shares(10).price(bar.close()).build()?));
//!         }
//!         Ok(None)
//!     }
//! }
//!
//! let start = DateTime::default();
//! let data: Arc<[Bar]> = [100.0, 105.0, 110.0]
//!     .iter()
//!     .enumerate()
//!     .map(|(i, &close)| Bar::from((start + Duration::days(i as i64), close, close, close, close, 1.0)))
//!     .collect();
//!
//! let mut backtest = Backtest::with_account(data, BuyAndHold, Account::new(10_000.0)).unwrap();
//! let balance = backtest.run().unwrap();
//! assert_eq!(balance, 9_000.0);
//! assert!(backtest.in_position());
//! ```
//!
//! ## Integrations
//! | Crate          | Purpose                                                                                     |
//! |----------------|---------------------------------------------------------------------------------------------|
//! | [`tracing`](https://crates.io/crates/tracing) | Structured logs of runs and executions.                                  |
//! | [`rayon`](https://crates.io/crates/rayon) | Parallel processing for optimization.                                                     |
//! | [`serde`](https://crates.io/crates/serde) | Serialize/deserialize orders, accounts and bars.                                          |
//!
//! ## License
//! MIT
#![warn(missing_docs)]

/// Core components: bars, orders, positions, account and backtest driver.
pub mod engine;

/// Error types for the library.
pub mod errors;

/// Data helpers: bar loading and query generation.
pub mod utils;

/// Performance metrics: drawdown, profit factor, win rate.
#[cfg(feature = "metrics")]
pub mod metrics;

/// Strategy parameter optimization.
#[cfg(feature = "optimizer")]
pub mod optimizer;

/// Re-exports of commonly used types and traits for convenience.
pub mod prelude {
    pub use super::*;
    pub use crate::engine::*;
    pub use crate::errors::*;
    pub use crate::utils::*;

    #[cfg(feature = "metrics")]
    pub use crate::metrics::*;

    #[cfg(feature = "optimizer")]
    pub use crate::optimizer::*;
}

/// Percentage arithmetic used by the reports.
pub trait PercentCalculus<Rhs = Self> {
    /// Calculates the percentage change between two values.
    ///
    /// ### Arguments
    /// * `new` - The new value to compare with.
    ///
    /// ### Returns
    /// The percentage change from `self` to `new`.
    fn change(self, new: Rhs) -> Self;
}

impl PercentCalculus for f64 {
    fn change(self, new: Self) -> Self {
        (new - self) / self * 100.0
    }
}

#[cfg(test)]
mod percent {
    use super::*;

    #[test]
    fn change() {
        assert_eq!(10.0, 100.0.change(110.0));
        assert_eq!(-50.0, 100.0.change(50.0));
    }
}
