/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by orders, accounts and backtests.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The order failed validation at construction.
    #[error("Invalid order: {0}")]
    InvalidOrder(#[from] InvalidOrder),

    /// The account configuration is not usable (e.g. `max_positions` below 1).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An argument is missing or out of the accepted range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A write-once field was written twice.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The historical data provided is empty. Backtesting requires at least one bar.
    #[error("Bar data is empty: backtesting requires at least one bar")]
    EmptyDataset,

    /// The order passed to `execute_order` is not the head of the submission queue.
    #[error("Order mismatch: queue head is #{0}, got #{1}")]
    OrderMismatch(u32, u32),

    /// Error raised by a strategy or an indicator.
    #[error("{0}")]
    Msg(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error occurred.
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Reasons an order is rejected at construction.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum InvalidOrder {
    /// Unknown direction tag.
    #[error("unknown direction '{0}'")]
    InvalidDirection(String),

    /// Unknown order type tag.
    #[error("unknown order type '{0}'")]
    InvalidOrderType(String),

    /// Shares must be strictly positive.
    #[error("shares must be positive (got: {0})")]
    InvalidShares(i64),

    /// Price must be strictly positive and finite.
    #[error("price must be positive (got: {0})")]
    InvalidPrice(f64),
}
