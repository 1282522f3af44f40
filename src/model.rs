use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TimeframeError;

/// Candle timeframe supported by the engine.
///
/// String representations match the config file and CLI format
/// (`"daily"`, `"weekly"`, `"monthly"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Self::Daily, Self::Weekly, Self::Monthly];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(TimeframeError::InvalidTimeframe {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Categorical trading decision.
///
/// `Na` means the decision could not be made because inputs were missing;
/// `Hold` is a decided, neutral outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalValue {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "HOLD")]
    Hold,
    #[serde(rename = "N/A")]
    Na,
}

impl SignalValue {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
            Self::Na => "N/A",
        }
    }

    /// Parse the stored representation. Unknown strings map to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            "HOLD" => Some(Self::Hold),
            "N/A" => Some(Self::Na),
            _ => None,
        }
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw OHLCV record as delivered by a text-based source (CSV rows etc.).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandleRecord {
    pub date: String,
    #[serde(default)]
    pub open: Option<String>,
    #[serde(default)]
    pub high: Option<String>,
    #[serde(default)]
    pub low: Option<String>,
    #[serde(default)]
    pub close: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
}

/// One OHLCV bar. Any numeric field may be missing; missing is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl Candle {
    /// Coerce a raw record. Returns `None` when the date cannot be parsed.
    pub fn from_record(record: &CandleRecord) -> Option<Self> {
        let date = parse_date(&record.date)?;
        let field = |v: &Option<String>| v.as_deref().and_then(coerce_number);
        Some(Self {
            date,
            open: field(&record.open),
            high: field(&record.high),
            low: field(&record.low),
            close: field(&record.close),
            volume: field(&record.volume),
        })
    }

    pub fn has_ohlc(&self) -> bool {
        self.open.is_some() && self.high.is_some() && self.low.is_some() && self.close.is_some()
    }
}

/// Parse a calendar date from the formats sources commonly emit.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(value, "%Y/%m/%d").ok()
}

/// Coerce a numeric string to a finite float; anything else is missing.
pub fn coerce_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Materialized per-symbol summary, replaced wholesale on every rebuild.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub symbol: String,
    /// Latest daily close.
    pub price: Option<f64>,
    /// Latest daily bar's volume, not a trailing 24h sum.
    pub volume_recent: Option<f64>,
    pub daily_signal: SignalValue,
    pub weekly_signal: SignalValue,
    pub monthly_signal: SignalValue,
    pub updated_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn signal(&self, timeframe: Timeframe) -> SignalValue {
        match timeframe {
            Timeframe::Daily => self.daily_signal,
            Timeframe::Weekly => self.weekly_signal,
            Timeframe::Monthly => self.monthly_signal,
        }
    }
}
