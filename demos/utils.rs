use barsim::engine::Bar;
#[cfg(feature = "metrics")]
use barsim::metrics::Metrics;
use chrono::{DateTime, Duration};

/// Generates deterministic daily bars.
pub fn generate_sample_bars(max: i32, seed: i32, base_price: f64) -> Vec<Bar> {
    let start = DateTime::from_timestamp(1_515_151_515, 0).unwrap_or_default();
    let mut open = base_price;

    (0..=max)
        .map(|i| {
            // Base price with trend (+ 0.05*i)
            let base_price = base_price + 0.05 * (i as f64);

            // Slow wave for trends, fast wave for noise
            let variation = 8.0 * (i as f64 * 0.02 + seed as f64).sin() + 1.5 * (i as f64 * 0.7).sin();

            let close = base_price + variation;
            let high = close.max(open) + 0.5;
            let low = close.min(open) - 0.5;
            // Volume with seasonal pattern
            let volume = 1000.0 + 500.0 * ((i as f64 * 0.2).sin()).abs();

            let bar = Bar::from((start + Duration::days(i as i64), open, high, low, close, volume));
            open = close;
            bar
        })
        .collect()
}

pub fn example_bars() -> Vec<Bar> {
    generate_sample_bars(3000, 42, 100.0)
}

/// Prints the metrics next to a buy and hold of the same history.
#[cfg(feature = "metrics")]
#[allow(dead_code)]
pub fn print_report(metrics: &Metrics, bars: &[Bar]) {
    println!("{metrics}");
    if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
        use barsim::PercentCalculus;
        println!("Buy and Hold: {:.2}%", first.close().change(last.close()));
    }
}

#[allow(dead_code)]
fn main() {}
