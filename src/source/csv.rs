use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::model::{Candle, CandleRecord};
use crate::storage::CandleSource;

/// Daily candles for many symbols read from one CSV file.
///
/// The file needs a header row with `date,symbol,open,high,low,close,volume`;
/// numeric columns may be empty or absent. The whole file is read up front.
pub struct CsvCandleSource {
    series: BTreeMap<String, Vec<Candle>>,
}

#[derive(Deserialize)]
struct CsvRow {
    date: String,
    symbol: String,
    #[serde(default)]
    open: Option<String>,
    #[serde(default)]
    high: Option<String>,
    #[serde(default)]
    low: Option<String>,
    #[serde(default)]
    close: Option<String>,
    #[serde(default)]
    volume: Option<String>,
}

impl CsvCandleSource {
    pub fn open(path: &Path) -> Result<Self, Report<SourceError>> {
        let reader = std::fs::File::open(path)
            .change_context(SourceError::Open)
            .attach_with(|| format!("path: {}", path.display()))?;
        Self::from_reader(reader).attach_with(|| format!("path: {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Report<SourceError>> {
        let mut rdr = ::csv::ReaderBuilder::new()
            .trim(::csv::Trim::All)
            .from_reader(reader);

        let mut series: BTreeMap<String, Vec<Candle>> = BTreeMap::new();
        let mut dropped = 0usize;
        for (line, rec) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = rec
                .change_context(SourceError::Open)
                .attach_with(|| format!("record {}", line + 1))?;

            let record = CandleRecord {
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            };
            match Candle::from_record(&record) {
                Some(candle) => series.entry(row.symbol).or_default().push(candle),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            warn!(dropped, "skipped CSV rows with unparsable dates");
        }
        for candles in series.values_mut() {
            candles.sort_by_key(|c| c.date);
        }
        debug!(symbols = series.len(), "CSV candles loaded");

        Ok(Self { series })
    }
}

impl CandleSource for CsvCandleSource {
    fn list_symbols(&self) -> BoxFuture<'_, Result<Vec<String>, Report<SourceError>>> {
        Box::pin(async move { Ok(self.series.keys().cloned().collect()) })
    }

    fn load_series(&self, symbol: &str) -> BoxFuture<'_, Result<Vec<Candle>, Report<SourceError>>> {
        let candles = self.series.get(symbol).cloned().unwrap_or_default();
        Box::pin(async move { Ok(candles) })
    }
}
