//! Indicators and the container for their precomputed series.
//!
//! Indicators are computed once over the whole history before the bar loop
//! starts, then read back by bar index.

use std::collections::HashMap;

use crate::engine::Bar;

/// A named series derived from the bar history.
///
/// `compute` must return one value per bar. The value at index `i` may only depend
/// on bars `0..=i`; warmup values are `f64::NAN`.
pub trait Indicator {
    /// Name the series is stored under (e.g. "10-Period SMA").
    fn name(&self) -> &str;

    /// Computes the series over the full history.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Precomputed indicator series, keyed by indicator name.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a named series, replacing any series with the same name.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    /// Returns the value of `name` at `index`.
    pub fn get(&self, name: &str, index: usize) -> Option<f64> {
        self.series.get(name).and_then(|v| v.get(index).copied())
    }

    /// Returns the full series of `name`.
    pub fn series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(Vec::as_slice)
    }

    /// Returns the names of every stored series.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Returns `true` if no series is stored.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Drops every series.
    pub fn clear(&mut self) {
        self.series.clear();
    }
}

/// Simple moving average of close prices.
#[derive(Debug, Clone)]
pub struct Sma {
    name: String,
    period: usize,
}

impl Sma {
    /// Creates an SMA over `period` bars. A zero period is treated as one.
    pub fn new(name: impl Into<String>, period: usize) -> Self {
        Self {
            name: name.into(),
            period: period.max(1),
        }
    }

    /// Returns the averaging period.
    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut result = vec![f64::NAN; bars.len()];
        let mut sum = 0.0;
        for (i, bar) in bars.iter().enumerate() {
            sum += bar.close();
            if i >= self.period {
                sum -= bars[i - self.period].close();
            }
            if i + 1 >= self.period {
                result[i] = sum / self.period as f64;
            }
        }
        result
    }
}

/// Returns `true` if `a` crossed above `b` on the last value of both series.
pub fn crossover(a: &[f64], b: &[f64]) -> bool {
    match (a, b) {
        ([.., a_prev, a_last], [.., b_prev, b_last]) => a_prev < b_prev && a_last > b_last,
        _ => false,
    }
}

#[cfg(test)]
fn bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::{DateTime, Duration};

    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let time = DateTime::default() + Duration::days(i as i64);
            Bar::from((time, close, close + 1.0, close - 1.0, close, 1000.0))
        })
        .collect()
}

#[cfg(test)]
#[test]
fn sma_values() {
    let sma = Sma::new("sma_3", 3);
    let values = sma.compute(&bars(&[1.0, 2.0, 3.0, 4.0, 5.0]));
    assert!(values[0].is_nan());
    assert!(values[1].is_nan());
    assert_eq!(&values[2..], &[2.0, 3.0, 4.0]);
}

#[cfg(test)]
#[test]
fn sma_shorter_than_period() {
    let values = Sma::new("sma_10", 10).compute(&bars(&[1.0, 2.0]));
    assert_eq!(values.len(), 2);
    assert!(values.iter().all(|v| v.is_nan()));
}

#[cfg(test)]
#[test]
fn sma_does_not_look_ahead() {
    let closes = [5.0, 3.0, 8.0, 1.0, 9.0, 2.0];
    let sma = Sma::new("sma_2", 2);
    let full = sma.compute(&bars(&closes));
    let truncated = sma.compute(&bars(&closes[..4]));
    assert_eq!(&full[1..4], &truncated[1..4]);
}

#[cfg(test)]
#[test]
fn indicator_values() {
    let mut values = IndicatorValues::new();
    assert!(values.is_empty());
    values.insert("sma", vec![1.0, 2.0]);
    assert_eq!(values.get("sma", 1), Some(2.0));
    assert_eq!(values.get("sma", 2), None);
    assert_eq!(values.get("ema", 0), None);
    assert_eq!(values.series("sma"), Some(&[1.0, 2.0][..]));
    assert_eq!(values.names().collect::<Vec<_>>(), vec!["sma"]);
}

#[cfg(test)]
#[test]
fn crossover_detection() {
    assert!(crossover(&[1.0, 3.0], &[2.0, 2.0]));
    assert!(!crossover(&[3.0, 1.0], &[2.0, 2.0]));
    assert!(!crossover(&[2.0, 3.0], &[2.0, 2.0]));
    assert!(!crossover(&[3.0], &[2.0]));
}
