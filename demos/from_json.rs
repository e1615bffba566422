use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use barsim::prelude::*;
use tracing_subscriber::EnvFilter;

/// Buys on the first bar and sells on the last one.
struct BuyAndHold {
    last: usize,
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "buy-and-hold"
    }

    fn init(&mut self, data: &[Bar]) -> Result<()> {
        self.last = data.len() - 1;
        Ok(())
    }

    fn apply(&mut self, bar: &BarView<'_>, _window: &[Bar]) -> Result<Option<Order>> {
        let order = match bar.index() {
            0 => Order::buy(),
            i if i == self.last => Order::short(),
            _ => return Ok(None),
        };
        Ok(Some(order.shares(1).price(bar.close()).build()?))
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: json <bars.json>")?;
    let bars = get_data_from_file(path)?;
    let data: Arc<[Bar]> = bars.into();

    let mut bt = Backtest::with_account(data, BuyAndHold { last: 0 }, Account::new(10_000.0))?;
    let balance = bt.run()?;
    println!("final balance {balance:.2}");

    for order in bt.executed_orders() {
        println!("{}", serde_json::to_string(&order.to_record())?);
    }

    Ok(())
}
