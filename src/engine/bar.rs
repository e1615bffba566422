use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use chrono::serde::ts_milliseconds;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One historical time-slice of market data.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    #[cfg_attr(feature = "serde", serde(alias = "open_time", alias = "datetime", with = "ts_milliseconds"))]
    time: DateTime<Utc>,
    #[cfg_attr(feature = "serde", serde(alias = "open_price"))]
    open: f64,
    #[cfg_attr(feature = "serde", serde(alias = "high_price"))]
    high: f64,
    #[cfg_attr(feature = "serde", serde(alias = "low_price"))]
    low: f64,
    #[cfg_attr(feature = "serde", serde(alias = "close_price"))]
    close: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    volume: f64,
}

type B = (DateTime<Utc>, f64, f64, f64, f64, f64);
impl From<B> for Bar {
    fn from((time, open, high, low, close, volume): B) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl Bar {
    /// Returns the bar time.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Returns the open price.
    pub fn open(&self) -> f64 {
        self.open
    }

    /// Returns the high price.
    pub fn high(&self) -> f64 {
        self.high
    }

    /// Returns the low price.
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Returns the close price.
    pub fn close(&self) -> f64 {
        self.close
    }

    /// Returns the traded volume.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Looks up a price field by name (`open`, `high`, `low`, `close`, `volume`).
    pub fn get(&self, field: &str) -> Option<f64> {
        match field {
            "open" => Some(self.open),
            "high" => Some(self.high),
            "low" => Some(self.low),
            "close" => Some(self.close),
            "volume" => Some(self.volume),
            _ => None,
        }
    }
}

#[cfg(test)]
#[test]
fn named_fields() {
    let bar = Bar::from((DateTime::default(), 1.0, 2.0, 0.5, 1.5, 10.0));
    assert_eq!(bar.get("open"), Some(1.0));
    assert_eq!(bar.get("high"), Some(2.0));
    assert_eq!(bar.get("low"), Some(0.5));
    assert_eq!(bar.get("close"), Some(1.5));
    assert_eq!(bar.get("volume"), Some(10.0));
    assert_eq!(bar.get("vwap"), None);
}
