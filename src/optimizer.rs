//! Strategy parameter optimization.
//!
//! This module runs one independent backtest per parameter combination. The
//! `Optimizer` struct spreads the runs over the available CPUs, while the
//! `ParameterCombination` trait defines how to generate parameter sets.

use std::sync::Arc;

use crate::engine::{Account, AccountConfig, Backtest, Bar, Strategy};
use crate::errors::Result;

use rayon::prelude::*;
use tracing::debug;

/// Trait defining how to generate parameter combinations for optimization.
///
/// Implement this trait for your parameter types to define how combinations should be generated.
pub trait ParameterCombination {
    /// Type representing a single parameter combination (e.g., `(usize, usize)`).
    type Output: Clone + Send + Sync;

    /// Generates all possible parameter combinations to test.
    fn generate() -> Vec<Self::Output>;
}

/// Runs a strategy over the same history with different parameters.
///
/// Every run owns its own `Account`; runs only share the read-only bars.
#[derive(Debug, Clone)]
pub struct Optimizer {
    data: Arc<[Bar]>,
    config: AccountConfig,
}

impl Optimizer {
    /// Creates a new `Optimizer` with the given data and account settings.
    pub fn new(data: Arc<[Bar]>, config: AccountConfig) -> Self {
        Self { data, config }
    }

    /// Runs a backtest for every combination generated by `PC`.
    pub fn generate<PC, F, S>(&self, factory: F) -> Result<Vec<(PC::Output, f64)>>
    where
        PC: ParameterCombination,
        F: Fn(&PC::Output) -> Result<S> + Sync,
        S: Strategy,
    {
        self.with(&PC::generate(), factory)
    }

    /// Runs a backtest for every parameter set.
    ///
    /// ### Arguments
    /// * `params` - Parameter sets to test.
    /// * `factory` - Builds a fresh strategy from one parameter set.
    ///
    /// ### Returns
    /// Each parameter set with the final balance of its run, in input order.
    ///
    /// ### Errors
    /// The first error raised while building a strategy or running a backtest.
    pub fn with<P, F, S>(&self, params: &[P], factory: F) -> Result<Vec<(P, f64)>>
    where
        P: Clone + Send + Sync,
        F: Fn(&P) -> Result<S> + Sync,
        S: Strategy,
    {
        let chunk_size = params.len().div_ceil(num_cpus::get()).max(1);

        params
            .par_chunks(chunk_size)
            .map::<_, Result<_>>(|chunk| {
                let mut local_results = Vec::with_capacity(chunk.len());
                for param_set in chunk {
                    let strategy = factory(param_set)?;
                    let account = Account::from_config(self.config)?;
                    let mut backtest = Backtest::with_account(Arc::clone(&self.data), strategy, account)?;
                    let balance = backtest.run()?;
                    local_results.push((param_set.clone(), balance));
                }
                debug!(runs = chunk.len(), "Optimizer chunk done");
                Ok(local_results)
            })
            .collect::<Result<Vec<_>>>()
            .map(|chunks| chunks.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BarView, Indicator, Order, Sma};
    use crate::errors::Error;

    use chrono::{DateTime, Duration};

    struct Parameters;

    impl ParameterCombination for Parameters {
        type Output = (usize, usize);

        fn generate() -> Vec<Self::Output> {
            (2..=4).flat_map(|fast| (5..=7).map(move |slow| (fast, slow))).collect()
        }
    }

    struct SmaCross {
        fast: usize,
        slow: usize,
    }

    impl Strategy for SmaCross {
        fn lookback(&self) -> usize {
            1
        }

        fn indicators(&self) -> Vec<Box<dyn Indicator>> {
            vec![Box::new(Sma::new("fast", self.fast)), Box::new(Sma::new("slow", self.slow))]
        }

        fn apply(&mut self, bar: &BarView<'_>, _window: &[Bar]) -> Result<Option<Order>> {
            let (Some(fast), Some(slow)) = (bar.indicator("fast"), bar.indicator("slow")) else {
                return Ok(None);
            };
            if fast > slow {
                return Ok(Some(Order::buy().price(bar.close()).build()?));
            }
            if fast < slow {
                return Ok(Some(Order::short().price(bar.close()).build()?));
            }
            Ok(None)
        }
    }

    fn get_data() -> Arc<[Bar]> {
        let start = DateTime::from_timestamp(1_515_151_515, 0).unwrap();
        (0..60)
            .map(|i| {
                let close = 100.0 + 10.0 * (i as f64 * 0.3).sin();
                Bar::from((start + Duration::days(i), close, close + 1.0, close - 1.0, close, 1.0))
            })
            .collect()
    }

    #[test]
    fn optimizer_with_sma_crossover() {
        let opt = Optimizer::new(get_data(), AccountConfig::default());
        let result = opt
            .generate::<Parameters, _, _>(|&(fast, slow)| Ok(SmaCross { fast, slow }))
            .unwrap();

        assert_eq!(result.len(), 9);
        assert_eq!(result[0].0, (2, 5));
        assert!(result.iter().all(|(_, balance)| balance.is_finite()));
    }

    #[test]
    fn optimizer_matches_single_run() {
        let data = get_data();
        let opt = Optimizer::new(Arc::clone(&data), AccountConfig::default());
        let result = opt.with(&[(3, 6)], |&(fast, slow)| Ok(SmaCross { fast, slow })).unwrap();

        let mut bt = Backtest::new(data, SmaCross { fast: 3, slow: 6 }).unwrap();
        assert_eq!(result[0].1, bt.run().unwrap());
    }

    #[test]
    fn optimizer_propagates_errors() {
        let opt = Optimizer::new(get_data(), AccountConfig::default());
        let result = opt.with(&[1_usize, 2], |&n| {
            if n == 2 {
                return Err(Error::Msg("bad parameter".to_string()));
            }
            Ok(SmaCross { fast: n, slow: n + 1 })
        });
        assert!(matches!(result, Err(Error::Msg(_))));
    }
}
