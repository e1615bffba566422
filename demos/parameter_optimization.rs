mod utils;

use std::sync::Arc;

use barsim::prelude::*;
use tracing_subscriber::EnvFilter;

struct Parameters;

impl ParameterCombination for Parameters {
    type Output = (usize, usize);

    fn generate() -> Vec<Self::Output> {
        (5..=30)
            .step_by(5)
            .flat_map(|fast| (40..=200).step_by(20).map(move |slow| (fast, slow)))
            .collect()
    }
}

struct SmaCross {
    fast: usize,
    slow: usize,
}

impl Strategy for SmaCross {
    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(Sma::new("fast", self.fast)), Box::new(Sma::new("slow", self.slow))]
    }

    fn apply(&mut self, bar: &BarView<'_>, _window: &[Bar]) -> Result<Option<Order>> {
        let (Some(fast), Some(slow)) = (bar.indicator("fast"), bar.indicator("slow")) else {
            return Ok(None);
        };
        // NaN during warmup compares false both ways
        if fast > slow {
            return Ok(Some(Order::buy().shares(10).price(bar.close()).build()?));
        }
        if fast < slow {
            return Ok(Some(Order::short().shares(10).price(bar.close()).build()?));
        }
        Ok(None)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let data: Arc<[Bar]> = utils::example_bars().into();
    let config = AccountConfig {
        initial_balance: 10_000.0,
        max_positions: 1,
    };

    let optimizer = Optimizer::new(Arc::clone(&data), config);
    let mut results = optimizer.generate::<Parameters, _, _>(|&(fast, slow)| Ok(SmaCross { fast, slow }))?;
    results.sort_by(|a, b| b.1.total_cmp(&a.1));

    println!("{} runs", results.len());
    for ((fast, slow), balance) in results.iter().take(5) {
        let perf = config.initial_balance.change(*balance);
        println!("fast {fast:>3} slow {slow:>3} => {balance:.2} ({perf:.2}%)");
    }

    Ok(())
}
