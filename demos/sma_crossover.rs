mod utils;

use std::sync::Arc;

use barsim::prelude::*;
use ta::{Next, indicators::ExponentialMovingAverage};
use tracing_subscriber::EnvFilter;

/// Exponential moving average of close prices, backed by the `ta` crate.
struct Ema {
    name: String,
    period: usize,
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let Ok(mut ema) = ExponentialMovingAverage::new(self.period) else {
            return vec![f64::NAN; bars.len()];
        };
        bars.iter().map(|bar| ema.next(bar.close())).collect()
    }
}

/// Goes long when the fast SMA crosses above the slow one and exits on the
/// opposite cross. Entries also need the close above the trend EMA.
struct SmaCrossover {
    fast: usize,
    slow: usize,
    shares: i64,
    prev: Option<(f64, f64)>,
}

impl Strategy for SmaCrossover {
    fn name(&self) -> &str {
        "sma-crossover"
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![
            Box::new(Sma::new("fast", self.fast)),
            Box::new(Sma::new("slow", self.slow)),
            Box::new(Ema {
                name: "trend".to_owned(),
                period: 200,
            }),
        ]
    }

    fn apply(&mut self, bar: &BarView<'_>, _window: &[Bar]) -> Result<Option<Order>> {
        let (Some(fast), Some(slow), Some(trend)) = (bar.indicator("fast"), bar.indicator("slow"), bar.indicator("trend"))
        else {
            return Ok(None);
        };
        if fast.is_nan() || slow.is_nan() {
            return Ok(None);
        }
        let Some((prev_fast, prev_slow)) = self.prev.replace((fast, slow)) else {
            return Ok(None);
        };

        if crossover(&[prev_fast, fast], &[prev_slow, slow]) && bar.close() > trend {
            return Ok(Some(Order::buy().shares(self.shares).price(bar.close()).ticker("SPY").build()?));
        }
        if crossover(&[prev_slow, slow], &[prev_fast, fast]) {
            return Ok(Some(Order::short().shares(self.shares).price(bar.close()).ticker("SPY").build()?));
        }
        Ok(None)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bars = utils::example_bars();
    let data: Arc<[Bar]> = bars.iter().cloned().collect();
    let strategy = SmaCrossover {
        fast: 10,
        slow: 100,
        shares: 100,
        prev: None,
    };

    let mut bt = Backtest::with_account(data, strategy, Account::new(100_000.0))?;
    let balance = bt.run()?;
    println!("final balance {balance:.2} ({} orders)", bt.executed_orders().count());

    #[cfg(feature = "metrics")]
    utils::print_report(&Metrics::from(&bt), &bars);

    Ok(())
}
