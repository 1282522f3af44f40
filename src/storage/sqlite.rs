use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use sqlx::{
    Decode, SqlitePool, Type, TypeInfo, ValueRef,
    error::BoxDynError,
    sqlite::{Sqlite, SqliteConnectOptions, SqliteJournalMode, SqliteTypeInfo, SqliteValueRef},
};
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

use crate::error::{SourceError, StorageError};
use crate::model::{Candle, SignalValue, Snapshot, coerce_number, parse_date};
use crate::storage::{CandleSource, SnapshotSink};

type OhlcvRow = (
    String,
    NumericCell,
    NumericCell,
    NumericCell,
    NumericCell,
    NumericCell,
);

/// A price or volume cell read without trusting the column affinity.
///
/// SQLite keeps non-numeric text in a REAL column as TEXT; such cells go
/// through [`coerce_number`] so they become missing instead of failing the row.
struct NumericCell(Option<f64>);

impl Type<Sqlite> for NumericCell {
    fn type_info() -> SqliteTypeInfo {
        <f64 as Type<Sqlite>>::type_info()
    }

    fn compatible(_ty: &SqliteTypeInfo) -> bool {
        true
    }
}

impl<'r> Decode<'r, Sqlite> for NumericCell {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        if value.is_null() {
            return Ok(Self(None));
        }
        let kind = value.type_info().name().to_string();
        let number = match kind.as_str() {
            "REAL" | "INTEGER" | "NUMERIC" => {
                let v = <f64 as Decode<Sqlite>>::decode(value)?;
                v.is_finite().then_some(v)
            }
            "TEXT" => coerce_number(<&str as Decode<Sqlite>>::decode(value)?),
            _ => None,
        };
        Ok(Self(number))
    }
}

type SnapshotRow = (
    String,
    Option<f64>,
    Option<f64>,
    String,
    String,
    String,
    String,
);

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path` and run migrations.
    pub async fn open(path: &Path) -> Result<Self, Report<StorageError>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .change_context(StorageError::Migration)
                .attach_with(|| format!("cannot create data directory: {}", parent.display()))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .change_context(StorageError::Migration)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(opts)
            .await
            .change_context(StorageError::Migration)
            .attach_with(|| format!("database path: {}", path.display()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .change_context(StorageError::Migration)?;

        Ok(Self { pool })
    }

    /// Insert or replace daily candles for `symbol`, keyed by date.
    pub async fn upsert_candles(
        &self,
        symbol: &str,
        candles: &[Candle],
    ) -> Result<(), Report<StorageError>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .change_context(StorageError::Insert)?;

        for c in candles {
            sqlx::query(
                "INSERT OR REPLACE INTO ohlcv (symbol, date, open, high, low, close, volume) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(symbol)
            .bind(c.date.to_string())
            .bind(c.open)
            .bind(c.high)
            .bind(c.low)
            .bind(c.close)
            .bind(c.volume)
            .execute(&mut *tx)
            .await
            .change_context(StorageError::Insert)
            .attach_with(|| format!("symbol: {symbol}, date: {}", c.date))?;
        }

        tx.commit().await.change_context(StorageError::Insert)?;
        Ok(())
    }

    pub async fn list_snapshots(&self) -> Result<Vec<Snapshot>, Report<StorageError>> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            "SELECT symbol, price, volume_recent, daily_signal, weekly_signal, monthly_signal, \
             updated_at \
             FROM market_snapshots ORDER BY symbol ASC",
        )
        .fetch_all(&self.pool)
        .await
        .change_context(StorageError::Query)?;

        rows.into_iter().map(map_snapshot_row).collect()
    }

    pub async fn get_snapshot(
        &self,
        symbol: &str,
    ) -> Result<Option<Snapshot>, Report<StorageError>> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            "SELECT symbol, price, volume_recent, daily_signal, weekly_signal, monthly_signal, \
             updated_at \
             FROM market_snapshots WHERE symbol = ? LIMIT 1",
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .change_context(StorageError::Query)?;

        row.map(map_snapshot_row).transpose()
    }
}

impl CandleSource for SqliteStorage {
    fn list_symbols(&self) -> BoxFuture<'_, Result<Vec<String>, Report<SourceError>>> {
        Box::pin(async move {
            let rows: Vec<(String,)> =
                sqlx::query_as("SELECT DISTINCT symbol FROM ohlcv ORDER BY symbol ASC")
                    .fetch_all(&self.pool)
                    .await
                    .change_context(SourceError::ListSymbols)?;
            Ok(rows.into_iter().map(|(symbol,)| symbol).collect())
        })
    }

    fn load_series(&self, symbol: &str) -> BoxFuture<'_, Result<Vec<Candle>, Report<SourceError>>> {
        let symbol = symbol.to_string();
        Box::pin(async move {
            let rows: Vec<OhlcvRow> = sqlx::query_as(
                "SELECT date, open, high, low, close, volume \
                 FROM ohlcv WHERE symbol = ? ORDER BY date ASC",
            )
            .bind(&symbol)
            .fetch_all(&self.pool)
            .await
            .change_context(SourceError::Read {
                symbol: symbol.clone(),
            })?;

            let mut candles: Vec<Candle> = rows
                .into_iter()
                .filter_map(|(raw_date, open, high, low, close, volume)| {
                    let Some(date) = parse_date(&raw_date) else {
                        warn!(
                            symbol = %symbol,
                            date = %raw_date,
                            "skipping row with malformed date"
                        );
                        return None;
                    };
                    Some(Candle {
                        date,
                        open: open.0,
                        high: high.0,
                        low: low.0,
                        close: close.0,
                        volume: volume.0,
                    })
                })
                .collect();

            // Text order differs from date order once formats are mixed
            candles.sort_by_key(|c| c.date);
            let before = candles.len();
            candles.dedup_by_key(|c| c.date);
            if candles.len() < before {
                warn!(
                    symbol = %symbol,
                    dropped = before - candles.len(),
                    "dropping rows that repeat a date"
                );
            }

            Ok(candles)
        })
    }
}

impl SnapshotSink for SqliteStorage {
    fn replace_snapshots(
        &self,
        snapshots: Vec<Snapshot>,
    ) -> BoxFuture<'_, Result<(), Report<StorageError>>> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .change_context(StorageError::Insert)?;

            sqlx::query("DELETE FROM market_snapshots")
                .execute(&mut *tx)
                .await
                .change_context(StorageError::Insert)?;

            for s in &snapshots {
                sqlx::query(
                    "INSERT INTO market_snapshots \
                     (symbol, price, volume_recent, daily_signal, weekly_signal, monthly_signal, \
                      updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&s.symbol)
                .bind(s.price)
                .bind(s.volume_recent)
                .bind(s.daily_signal.as_str())
                .bind(s.weekly_signal.as_str())
                .bind(s.monthly_signal.as_str())
                .bind(s.updated_at.to_rfc3339())
                .execute(&mut *tx)
                .await
                .change_context(StorageError::Insert)
                .attach_with(|| format!("symbol: {}", s.symbol))?;
            }

            // Dropping `tx` on any error above rolls the delete back
            tx.commit().await.change_context(StorageError::Insert)?;
            Ok(())
        })
    }
}

fn map_snapshot_row(
    (symbol, price, volume_recent, daily, weekly, monthly, updated_at): SnapshotRow,
) -> Result<Snapshot, Report<StorageError>> {
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .change_context(StorageError::Query)
        .attach_with(|| format!("malformed updated_at for {symbol}: {updated_at}"))?
        .with_timezone(&Utc);

    Ok(Snapshot {
        daily_signal: parse_signal(&daily),
        weekly_signal: parse_signal(&weekly),
        monthly_signal: parse_signal(&monthly),
        symbol,
        price,
        volume_recent,
        updated_at,
    })
}

fn parse_signal(value: &str) -> SignalValue {
    SignalValue::parse(value).unwrap_or(SignalValue::Na)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Analyzer, MinCandles};
    use crate::signal::RuleThresholds;
    use crate::snapshot::rebuild;
    use chrono::{Days, NaiveDate};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    async fn in_memory_storage() -> SqliteStorage {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .create_if_missing(true);
        // One connection, otherwise each connection sees its own empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteStorage { pool }
    }

    fn candle(date: &str, close: f64) -> Candle {
        Candle {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: Some(close),
            high: Some(close + 1.0),
            low: Some(close - 1.0),
            close: Some(close),
            volume: Some(10.0),
        }
    }

    fn snapshot(symbol: &str, signal: SignalValue) -> Snapshot {
        Snapshot {
            symbol: symbol.into(),
            price: Some(101.5),
            volume_recent: None,
            daily_signal: signal,
            weekly_signal: SignalValue::Na,
            monthly_signal: SignalValue::Hold,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_and_load_series() {
        let storage = in_memory_storage().await;
        let candles = vec![candle("2024-01-03", 103.0), candle("2024-01-02", 102.0)];
        storage.upsert_candles("AAA", &candles).await.unwrap();

        let series = storage.load_series("AAA").await.unwrap();
        assert_eq!(series.len(), 2);
        // Ascending order: oldest first
        assert_eq!(series[0].close, Some(102.0));
        assert_eq!(series[1].close, Some(103.0));
    }

    #[tokio::test]
    async fn upsert_replaces_same_date() {
        let storage = in_memory_storage().await;
        storage
            .upsert_candles("AAA", &[candle("2024-01-02", 100.0)])
            .await
            .unwrap();

        let updated = Candle {
            close: Some(200.0),
            volume: None,
            ..candle("2024-01-02", 100.0)
        };
        storage.upsert_candles("AAA", &[updated]).await.unwrap();

        let series = storage.load_series("AAA").await.unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].close, Some(200.0));
        assert_eq!(series[0].volume, None);
    }

    #[tokio::test]
    async fn list_symbols_is_distinct_and_sorted() {
        let storage = in_memory_storage().await;
        for symbol in ["ZZZ", "AAA", "MMM"] {
            storage
                .upsert_candles(
                    symbol,
                    &[candle("2024-01-02", 1.0), candle("2024-01-03", 2.0)],
                )
                .await
                .unwrap();
        }
        let symbols = storage.list_symbols().await.unwrap();
        assert_eq!(symbols, vec!["AAA", "MMM", "ZZZ"]);
    }

    #[tokio::test]
    async fn unknown_symbol_loads_empty_series() {
        let storage = in_memory_storage().await;
        assert!(storage.load_series("NONE").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_snapshots_swaps_whole_table() {
        let storage = in_memory_storage().await;
        storage
            .replace_snapshots(vec![
                snapshot("OLD", SignalValue::Sell),
                snapshot("KEEP", SignalValue::Sell),
            ])
            .await
            .unwrap();

        storage
            .replace_snapshots(vec![snapshot("KEEP", SignalValue::Buy)])
            .await
            .unwrap();

        let all = storage.list_snapshots().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].symbol, "KEEP");
        assert_eq!(all[0].daily_signal, SignalValue::Buy);
        assert_eq!(all[0].weekly_signal, SignalValue::Na);
        assert_eq!(all[0].monthly_signal, SignalValue::Hold);
        assert_eq!(all[0].price, Some(101.5));
        assert_eq!(all[0].volume_recent, None);
    }

    #[tokio::test]
    async fn failed_replace_keeps_previous_snapshots() {
        let storage = in_memory_storage().await;
        storage
            .replace_snapshots(vec![snapshot("PREV", SignalValue::Hold)])
            .await
            .unwrap();

        // Duplicate primary key fails on the second insert, after the delete
        let result = storage
            .replace_snapshots(vec![
                snapshot("DUP", SignalValue::Buy),
                snapshot("DUP", SignalValue::Sell),
            ])
            .await;
        assert!(result.is_err());

        let all = storage.list_snapshots().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].symbol, "PREV");
    }

    #[tokio::test]
    async fn get_snapshot_by_symbol() {
        let storage = in_memory_storage().await;
        storage
            .replace_snapshots(vec![snapshot("AAA", SignalValue::Buy)])
            .await
            .unwrap();

        let found = storage.get_snapshot("AAA").await.unwrap().unwrap();
        assert_eq!(found.daily_signal, SignalValue::Buy);
        assert!(storage.get_snapshot("BBB").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_replace_clears_table() {
        let storage = in_memory_storage().await;
        storage
            .replace_snapshots(vec![snapshot("AAA", SignalValue::Buy)])
            .await
            .unwrap();
        storage.replace_snapshots(Vec::new()).await.unwrap();
        assert!(storage.list_snapshots().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn text_cell_reads_as_missing() {
        let storage = in_memory_storage().await;
        storage
            .upsert_candles(
                "AAA",
                &[candle("2024-01-02", 100.0), candle("2024-01-03", 101.0)],
            )
            .await
            .unwrap();
        sqlx::query("UPDATE ohlcv SET volume = 'n/a', high = '' WHERE date = '2024-01-03'")
            .execute(&storage.pool)
            .await
            .unwrap();

        let series = storage.load_series("AAA").await.unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].volume, Some(10.0));
        assert_eq!(series[1].volume, None);
        assert_eq!(series[1].high, None);
        assert_eq!(series[1].close, Some(101.0));
    }

    #[tokio::test]
    async fn datetime_formatted_dates_load() {
        let storage = in_memory_storage().await;
        for (date, close) in [
            ("2024-01-03 00:00:00", 3.0),
            ("2024-01-02T00:00:00Z", 2.0),
            ("2024-01-04", 4.0),
            ("yesterday", 9.0),
        ] {
            sqlx::query(
                "INSERT INTO ohlcv (symbol, date, open, high, low, close, volume) \
                 VALUES ('AAA', ?, ?, ?, ?, ?, 1.0)",
            )
            .bind(date)
            .bind(close)
            .bind(close)
            .bind(close)
            .bind(close)
            .execute(&storage.pool)
            .await
            .unwrap();
        }

        let series = storage.load_series("AAA").await.unwrap();
        let dates: Vec<String> = series.iter().map(|c| c.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-01-02", "2024-01-03", "2024-01-04"]);
        assert_eq!(series[0].close, Some(2.0));
    }

    #[tokio::test]
    async fn rebuild_survives_a_corrupted_symbol() {
        let storage = in_memory_storage().await;
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let candles: Vec<Candle> = (0..130u64)
            .map(|i| Candle {
                date: start + Days::new(i),
                ..candle("2023-01-02", 50.0 + (i as f64 / 5.0).sin())
            })
            .collect();
        storage.upsert_candles("AAA", &candles).await.unwrap();
        storage.upsert_candles("BBB", &candles).await.unwrap();
        sqlx::query("UPDATE ohlcv SET volume = 'n/a' WHERE symbol = 'BBB'")
            .execute(&storage.pool)
            .await
            .unwrap();

        let analyzer =
            Arc::new(Analyzer::new(MinCandles::default(), RuleThresholds::default()).unwrap());
        let summary = rebuild(&storage, &storage, analyzer, 2, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.snapshotted, 2);

        let all = storage.list_snapshots().await.unwrap();
        assert_eq!(all[0].symbol, "AAA");
        assert_eq!(all[0].volume_recent, Some(10.0));
        assert_eq!(all[1].symbol, "BBB");
        assert_eq!(all[1].volume_recent, None);
        assert_ne!(all[1].daily_signal, SignalValue::Na);
    }
}
