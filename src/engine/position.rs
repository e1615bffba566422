use chrono::{DateTime, Utc};

use crate::engine::Order;

/// One open lot created by an executed BUY.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    entry_price: f64,
    shares: u64,
    opened_at: Option<DateTime<Utc>>,
    exit_price: Option<f64>,
    // Shares of the closing order credited to this lot
    #[cfg_attr(feature = "serde", serde(default))]
    exit_shares: u64,
}

impl Position {
    /// Price paid per share.
    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    /// Shares bought when the position opened.
    pub fn shares(&self) -> u64 {
        self.shares
    }

    /// Submission time of the opening order, if it went through the queue.
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    /// Price of the order that closed the position.
    pub fn exit_price(&self) -> Option<f64> {
        self.exit_price
    }

    /// Shares of the closing order credited to this position. Zero while open.
    pub fn exit_shares(&self) -> u64 {
        self.exit_shares
    }

    /// Realized profit and loss, available once the position is closed.
    ///
    /// Proceeds are `exit_price * exit_shares`, which can differ from the
    /// shares bought when a closing order is smaller or larger than the lot.
    pub fn pnl(&self) -> Option<f64> {
        self.exit_price
            .map(|exit_price| exit_price * self.exit_shares as f64 - self.entry_price * self.shares as f64)
    }

    /// Marks the position closed, crediting `exit_shares` at `exit_price`.
    pub(crate) fn close(mut self, exit_price: f64, exit_shares: u64) -> Self {
        self.exit_price = Some(exit_price);
        self.exit_shares = exit_shares;
        self
    }
}

impl From<&Order> for Position {
    fn from(order: &Order) -> Self {
        Self {
            entry_price: order.price(),
            shares: order.shares(),
            opened_at: order.submitted_at(),
            exit_price: None,
            exit_shares: 0,
        }
    }
}

impl From<(f64, u64)> for Position {
    fn from((entry_price, shares): (f64, u64)) -> Self {
        Self {
            entry_price,
            shares,
            opened_at: None,
            exit_price: None,
            exit_shares: 0,
        }
    }
}

#[cfg(test)]
#[test]
fn closed_position_pnl() {
    let position = Position::from((100.0, 3));
    assert!(position.pnl().is_none());

    let position = position.close(110.0, 3);
    assert_eq!(position.exit_price(), Some(110.0));
    assert_eq!(position.exit_shares(), 3);
    assert_eq!(position.pnl(), Some(30.0));
}

#[cfg(test)]
#[test]
fn partial_close_pnl_matches_cash() {
    // 10 shares bought at 100, one share credited at 90
    let position = Position::from((100.0, 10)).close(90.0, 1);
    assert_eq!(position.pnl(), Some(90.0 - 1000.0));
}

#[cfg(test)]
#[test]
fn position_from_order() {
    let order = Order::buy().shares(4).price(25.0).build().unwrap();
    let position = Position::from(&order);
    assert_eq!(position.entry_price(), 25.0);
    assert_eq!(position.shares(), 4);
    assert!(position.opened_at().is_none());
}
