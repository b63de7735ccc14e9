//! CSV bar files.
//!
//! One file per market and timeframe, named `{broker}_{SYMBOL}_{tf}.csv`,
//! with a header row `start_time,open,high,low,close,volume[,is_final]`.
//! `start_time` is epoch milliseconds.

use crate::domain::bar::{Bar, Timeframe};
use crate::domain::error::RuleflowError;
use crate::ports::bar_source::BarSource;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CsvRow {
    start_time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default)]
    is_final: Option<bool>,
}

/// Read every bar in `path`, sorted oldest first.
pub fn read_bars(
    path: &Path,
    broker: &str,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<Vec<Bar>, RuleflowError> {
    let file = File::open(path).map_err(|e| RuleflowError::Database {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let mut bars = Vec::new();
    for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = result.map_err(|e| RuleflowError::Database {
            reason: format!("{} row {}: {}", path.display(), line + 1, e),
        })?;
        bars.push(Bar {
            symbol: symbol.to_string(),
            broker: broker.to_string(),
            timeframe,
            start_time: row.start_time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            is_final: row.is_final.unwrap_or(true),
        });
    }

    bars.sort_by_key(|b| b.start_time);
    bars.dedup_by_key(|b| b.start_time);
    Ok(bars)
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, broker: &str, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path
            .join(format!("{}_{}_{}.csv", broker, symbol, timeframe.as_str()))
    }
}

impl BarSource for CsvAdapter {
    fn bars_since(
        &self,
        broker: &str,
        symbol: &str,
        timeframe: Timeframe,
        since: i64,
    ) -> Result<Vec<Bar>, RuleflowError> {
        let path = self.csv_path(broker, symbol, timeframe);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut bars = read_bars(&path, broker, symbol, timeframe)?;
        bars.retain(|b| b.start_time >= since);
        Ok(bars)
    }
}
