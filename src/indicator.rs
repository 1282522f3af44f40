pub mod adx;
pub mod bollinger;
pub mod cci;
pub mod ma;
pub mod macd;
pub mod rsi;
pub mod smoothing;
pub mod stochastic;
pub mod volume;

use std::collections::BTreeMap;

use error_stack::{Report, bail};
use serde::Serialize;

use crate::error::IndicatorError;
use crate::model::Candle;

use adx::Adx;
use bollinger::BollingerBands;
use cci::Cci;
use ma::MovingAverage;
use macd::Macd;
use rsi::Rsi;
use stochastic::Stochastic;
use volume::VolumeMA;

/// Column names produced by [`IndicatorSet::standard`].
pub mod names {
    pub const RSI: &str = "rsi";
    pub const MACD: &str = "macd";
    pub const MACD_SIGNAL: &str = "macd_signal";
    pub const MACD_HIST: &str = "macd_hist";
    pub const STOCH_K: &str = "stoch_k";
    pub const STOCH_D: &str = "stoch_d";
    pub const ADX: &str = "adx";
    pub const CCI: &str = "cci";
    pub const SMA_20: &str = "sma_20";
    pub const EMA_20: &str = "ema_20";
    pub const WMA_20: &str = "wma_20";
    pub const BB_UPPER: &str = "bb_upper";
    pub const BB_MIDDLE: &str = "bb_middle";
    pub const BB_LOWER: &str = "bb_lower";
    pub const VOL_SMA_20: &str = "vol_sma_20";
}

/// One indicator output aligned to the input bars; `None` where undefined.
pub type Column = Vec<Option<f64>>;

/// A candle that has high, low and close present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub open: Option<f64>,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

impl Bar {
    pub fn from_candle(candle: &Candle) -> Option<Self> {
        Some(Self {
            open: candle.open,
            high: candle.high?,
            low: candle.low?,
            close: candle.close?,
            volume: candle.volume,
        })
    }

    /// Typical price `(high + low + close) / 3`.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// A technical analysis indicator that operates on a slice of bars.
///
/// Bars must be in ascending chronological order (oldest first).
pub trait Indicator: Send + Sync {
    /// Unique name of this indicator (e.g., "rsi", "sma").
    fn name(&self) -> &str;

    /// Minimum number of bars required to produce at least one output value.
    fn required_candles(&self) -> usize;

    /// Calculate the primary output from bars.
    ///
    /// Returns one value per output point. The number of values may be less
    /// than the number of input bars depending on the indicator's lookback.
    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>>;

    /// All outputs, each aligned to `bars.len()`.
    fn columns(&self, bars: &[Bar]) -> Result<Vec<Column>, Report<IndicatorError>> {
        Ok(vec![align_series(bars.len(), self.calculate(bars)?)])
    }
}

/// Reject a zero-length lookback.
pub(crate) fn check_period(param: &str, period: usize) -> Result<(), Report<IndicatorError>> {
    if period == 0 {
        bail!(IndicatorError::InvalidParameter {
            name: format!("{param} must be > 0"),
        });
    }
    Ok(())
}

pub(crate) fn check_len(available: usize, required: usize) -> Result<(), Report<IndicatorError>> {
    if available < required {
        bail!(IndicatorError::InsufficientData {
            required,
            available,
        });
    }
    Ok(())
}

/// Extract close prices from a slice of bars.
pub fn close_prices(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Right-align trailing indicator values to `total_len` rows.
///
/// Leading rows and non-finite values become `None`.
pub fn align_series(total_len: usize, values: Vec<f64>) -> Column {
    let offset = total_len.saturating_sub(values.len());
    let mut output = vec![None; total_len];
    for (index, value) in values.into_iter().enumerate().take(total_len) {
        output[offset + index] = value.is_finite().then_some(value);
    }
    output
}

/// A candle together with every indicator value defined at that row.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorRow {
    pub candle: Candle,
    pub values: BTreeMap<&'static str, Option<f64>>,
}

impl IndicatorRow {
    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied().flatten()
    }

    pub fn close(&self) -> Option<f64> {
        self.candle.close
    }

    pub fn volume(&self) -> Option<f64> {
        self.candle.volume
    }
}

struct Registered {
    outputs: &'static [&'static str],
    indicator: Box<dyn Indicator>,
}

/// A fixed collection of indicators computed together over one series.
pub struct IndicatorSet {
    entries: Vec<Registered>,
}

impl IndicatorSet {
    /// RSI(14), MACD(12,26,9), Stochastic(14,3), ADX(14), CCI(20), SMA/EMA/WMA(20),
    /// Bollinger(20, 2σ) and volume SMA(20).
    pub fn standard() -> Result<Self, Report<IndicatorError>> {
        use names::*;

        Ok(Self::new()
            .with(&[RSI], Rsi::new(14)?)
            .with(&[MACD, MACD_SIGNAL, MACD_HIST], Macd::new(12, 26, 9)?)
            .with(&[STOCH_K, STOCH_D], Stochastic::new(14, 3)?)
            .with(&[ADX], Adx::new(14)?)
            .with(&[CCI], Cci::new(20)?)
            .with(&[SMA_20], MovingAverage::sma(20)?)
            .with(&[EMA_20], MovingAverage::ema(20)?)
            .with(&[WMA_20], MovingAverage::wma(20)?)
            .with(&[BB_UPPER, BB_MIDDLE, BB_LOWER], BollingerBands::new(20, 2.0)?)
            .with(&[VOL_SMA_20], VolumeMA::new(20)?))
    }

    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register an indicator whose `columns` are stored under `outputs`, in order.
    pub fn with(
        mut self,
        outputs: &'static [&'static str],
        indicator: impl Indicator + 'static,
    ) -> Self {
        self.entries.push(Registered {
            outputs,
            indicator: Box::new(indicator),
        });
        self
    }

    /// Compute every registered indicator over `series`.
    ///
    /// Rows missing any of high/low/close are dropped first. Indicators whose
    /// lookback exceeds the series length yield all-missing columns.
    pub fn compute(&self, series: &[Candle]) -> Result<Vec<IndicatorRow>, Report<IndicatorError>> {
        let (candles, bars): (Vec<Candle>, Vec<Bar>) = series
            .iter()
            .filter_map(|c| Bar::from_candle(c).map(|b| (*c, b)))
            .unzip();
        let n = bars.len();

        let mut columns: Vec<(&'static str, Column)> = Vec::new();
        for entry in &self.entries {
            let computed = if n < entry.indicator.required_candles() {
                vec![vec![None; n]; entry.outputs.len()]
            } else {
                entry.indicator.columns(&bars)?
            };
            if computed.len() != entry.outputs.len() {
                return Err(Report::new(IndicatorError::InvalidParameter {
                    name: format!(
                        "{} produced {} columns, expected {}",
                        entry.indicator.name(),
                        computed.len(),
                        entry.outputs.len()
                    ),
                }));
            }
            columns.extend(entry.outputs.iter().copied().zip(computed));
        }

        Ok(candles
            .into_iter()
            .enumerate()
            .map(|(i, candle)| IndicatorRow {
                candle,
                values: columns
                    .iter()
                    .map(|(name, column)| (*name, column.get(i).copied().flatten()))
                    .collect(),
            })
            .collect())
    }
}

impl Default for IndicatorSet {
    fn default() -> Self {
        Self::new()
    }
}
