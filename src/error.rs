use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum StorageError {
    #[display("database migration failed")]
    Migration,
    #[display("failed to insert data")]
    Insert,
    #[display("failed to query data")]
    Query,
}

#[derive(Debug, Display, Error)]
pub enum SourceError {
    #[display("failed to open candle source")]
    Open,
    #[display("failed to read candles for {symbol}")]
    Read { symbol: String },
    #[display("failed to list symbols")]
    ListSymbols,
}

#[derive(Debug, Display, Error)]
pub enum IndicatorError {
    #[display("insufficient data: need {required}, got {available}")]
    InsufficientData { required: usize, available: usize },
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum TimeframeError {
    #[display("invalid timeframe: {value:?} (expected daily, weekly or monthly)")]
    InvalidTimeframe { value: String },
}

#[derive(Debug, Display, Error)]
pub enum AnalysisError {
    #[display("indicator computation failed")]
    Indicators,
}

#[derive(Debug, Display, Error)]
pub enum RebuildError {
    #[display("failed to load candles from source")]
    Source,
    #[display("failed to write snapshots")]
    Sink,
    #[display("rebuild cancelled")]
    Cancelled,
}
