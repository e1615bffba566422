use std::fmt;

use crate::errors::{Error, Result};

#[cfg(feature = "serde")]
use crate::engine::Bar;

/// Bar resolution of a stored price table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeframe {
    /// One-minute bars.
    Min,
    /// Daily bars.
    #[default]
    Day,
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Min => f.write_str("MIN"),
            Self::Day => f.write_str("DAY"),
        }
    }
}

/// Builds the select statement reading `ticker` bars at `timeframe`.
///
/// Tables are named `{TICKER}_1{TIMEFRAME}`. An empty `columns` slice selects every column.
pub fn select_query(ticker: &str, timeframe: Timeframe, columns: &[&str]) -> Result<String> {
    let is_identifier = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !is_identifier(ticker) {
        return Err(Error::InvalidArgument(format!("invalid ticker '{ticker}'")));
    }
    if let Some(column) = columns.iter().find(|c| !is_identifier(**c)) {
        return Err(Error::InvalidArgument(format!("invalid column '{column}'")));
    }

    let selection = if columns.is_empty() {
        "*".to_string()
    } else {
        columns.join(", ")
    };
    Ok(format!("SELECT {selection} FROM {ticker}_1{timeframe}"))
}

#[cfg(feature = "serde")]
/// Reads bars from the JSON array at `filepath`.
pub fn get_data_from_file(filepath: std::path::PathBuf) -> Result<Vec<Bar>> {
    use std::{fs::File, io::BufReader};

    let file = File::open(filepath)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(Error::from)
}

/// Generates a random ID.
pub fn random_id() -> u32 {
    rand::random()
}

#[cfg(test)]
#[test]
fn select_all_columns() {
    let query = select_query("SPY", Timeframe::Day, &[]).unwrap();
    assert_eq!(query, "SELECT * FROM SPY_1DAY");
}

#[cfg(test)]
#[test]
fn select_some_columns() {
    let query = select_query("SPY", Timeframe::Min, &["datetime", "close", "open"]).unwrap();
    assert_eq!(query, "SELECT datetime, close, open FROM SPY_1MIN");
}

#[cfg(test)]
#[test]
fn select_rejects_bad_identifiers() {
    assert!(matches!(select_query("", Timeframe::Day, &[]), Err(Error::InvalidArgument(_))));
    assert!(matches!(
        select_query("SPY; DROP TABLE x", Timeframe::Day, &[]),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        select_query("SPY", Timeframe::Day, &["close", ""]),
        Err(Error::InvalidArgument(_))
    ));
}

#[cfg(all(test, feature = "serde"))]
#[test]
fn read_bars_from_json() {
    use std::io::Write;

    let path = std::env::temp_dir().join(format!("barsim-{}.json", random_id()));
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        r#"[{{"open_time": 1759813200000, "open_price": 1.0, "high_price": 2.0, "low_price": 0.5, "close_price": 1.5, "volume": 10.0}},
            {{"time": 1759816800000, "open": 1.5, "high": 2.5, "low": 1.0, "close": 2.0}}]"#
    )
    .unwrap();

    let bars = get_data_from_file(path.clone()).unwrap();
    std::fs::remove_file(path).unwrap();

    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].close(), 1.5);
    assert_eq!(bars[0].time().timestamp_millis(), 1759813200000);
    assert_eq!(bars[1].volume(), 0.0);
    assert!(bars[0].time() < bars[1].time());
}
