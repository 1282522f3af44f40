pub mod sqlite;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::{SourceError, StorageError};
use crate::model::{Candle, Snapshot};

/// Read access to per-symbol daily OHLCV history.
pub trait CandleSource: Send + Sync {
    /// Every symbol that has at least one candle, in ascending order.
    fn list_symbols(&self) -> BoxFuture<'_, Result<Vec<String>, Report<SourceError>>>;

    /// Full daily series for `symbol`, ascending by date.
    fn load_series(&self, symbol: &str) -> BoxFuture<'_, Result<Vec<Candle>, Report<SourceError>>>;
}

/// Destination for rebuilt snapshots.
pub trait SnapshotSink: Send + Sync {
    /// Replace the whole snapshot table with `snapshots`.
    ///
    /// Either every old row is gone and every new row is present, or nothing
    /// changed.
    fn replace_snapshots(
        &self,
        snapshots: Vec<Snapshot>,
    ) -> BoxFuture<'_, Result<(), Report<StorageError>>>;
}
