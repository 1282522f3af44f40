use std::collections::BTreeMap;

use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AnalysisError;
use crate::indicator::IndicatorSet;
use crate::model::{Candle, SignalValue, Timeframe};
use crate::signal::{CompactRule, RuleSet, RuleThresholds, SignalRule, aggregate};
use crate::timeframe::resample;

fn default_daily() -> usize {
    120
}

fn default_weekly() -> usize {
    60
}

fn default_monthly() -> usize {
    48
}

/// Minimum resampled bar count per timeframe before signals are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MinCandles {
    #[serde(default = "default_daily")]
    pub daily: usize,
    #[serde(default = "default_weekly")]
    pub weekly: usize,
    #[serde(default = "default_monthly")]
    pub monthly: usize,
}

impl MinCandles {
    pub fn floor(&self, timeframe: Timeframe) -> usize {
        match timeframe {
            Timeframe::Daily => self.daily,
            Timeframe::Weekly => self.weekly,
            Timeframe::Monthly => self.monthly,
        }
    }
}

impl Default for MinCandles {
    fn default() -> Self {
        Self {
            daily: default_daily(),
            weekly: default_weekly(),
            monthly: default_monthly(),
        }
    }
}

/// Detail of one analyzed timeframe, taken at the latest bar.
#[derive(Debug, Clone, Serialize)]
pub struct TimeframeReport {
    pub timeframe: Timeframe,
    pub bars: usize,
    pub latest: Candle,
    pub indicators: BTreeMap<&'static str, Option<f64>>,
    pub signals: BTreeMap<&'static str, SignalValue>,
    /// Majority vote of `signals`.
    pub overall: SignalValue,
    pub compact: SignalValue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TimeframeOutcome {
    Analyzed(TimeframeReport),
    InsufficientHistory {
        timeframe: Timeframe,
        required: usize,
        available: usize,
    },
}

impl TimeframeOutcome {
    /// The voted signal, or `Na` when history was too short.
    pub fn signal(&self) -> SignalValue {
        match self {
            Self::Analyzed(report) => report.overall,
            Self::InsufficientHistory { .. } => SignalValue::Na,
        }
    }
}

/// Every timeframe for one series plus the cross-timeframe vote.
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub timeframes: BTreeMap<Timeframe, TimeframeOutcome>,
    pub recommendation: SignalValue,
}

/// Runs resample, indicators, rules and vote for a single series.
pub struct Analyzer {
    min_candles: MinCandles,
    indicators: IndicatorSet,
    rules: RuleSet,
    compact: CompactRule,
}

impl Analyzer {
    pub fn new(
        min_candles: MinCandles,
        thresholds: RuleThresholds,
    ) -> Result<Self, Report<AnalysisError>> {
        let indicators = IndicatorSet::standard().change_context(AnalysisError::Indicators)?;
        Ok(Self::with_indicators(min_candles, indicators, thresholds))
    }

    /// Analyzer over a caller-built indicator set. The rules read the
    /// [`names`](crate::indicator::names) columns, so the set should provide them.
    pub fn with_indicators(
        min_candles: MinCandles,
        indicators: IndicatorSet,
        thresholds: RuleThresholds,
    ) -> Self {
        Self {
            min_candles,
            indicators,
            rules: RuleSet::standard(thresholds),
            compact: CompactRule::new(thresholds),
        }
    }

    pub fn min_candles(&self) -> MinCandles {
        self.min_candles
    }

    pub fn analyze(
        &self,
        series: &[Candle],
        timeframe: Timeframe,
    ) -> Result<TimeframeOutcome, Report<AnalysisError>> {
        let bars = resample(series, timeframe);
        let required = self.min_candles.floor(timeframe);
        if bars.len() < required {
            debug!(
                timeframe = %timeframe,
                required,
                available = bars.len(),
                "not enough bars"
            );
            return Ok(TimeframeOutcome::InsufficientHistory {
                timeframe,
                required,
                available: bars.len(),
            });
        }

        let rows = self
            .indicators
            .compute(&bars)
            .change_context(AnalysisError::Indicators)
            .attach_with(|| format!("timeframe: {timeframe}"))?;

        // Every row may have been dropped for missing high/low/close
        let Some(latest) = rows.last() else {
            return Ok(TimeframeOutcome::InsufficientHistory {
                timeframe,
                required,
                available: 0,
            });
        };

        let signals = self.rules.evaluate(latest);
        let votes: Vec<SignalValue> = signals.values().copied().collect();
        let overall = aggregate(&votes);
        let compact = self.compact.evaluate(latest);

        debug!(
            timeframe = %timeframe,
            bars = rows.len(),
            overall = %overall,
            compact = %compact,
            "timeframe analyzed"
        );

        Ok(TimeframeOutcome::Analyzed(TimeframeReport {
            timeframe,
            bars: rows.len(),
            latest: latest.candle,
            indicators: latest.values.clone(),
            signals,
            overall,
            compact,
        }))
    }

    pub fn overview(&self, series: &[Candle]) -> Result<Overview, Report<AnalysisError>> {
        let mut timeframes = BTreeMap::new();
        for timeframe in Timeframe::ALL {
            timeframes.insert(timeframe, self.analyze(series, timeframe)?);
        }
        let signals: Vec<SignalValue> = timeframes.values().map(TimeframeOutcome::signal).collect();
        Ok(Overview {
            recommendation: aggregate(&signals),
            timeframes,
        })
    }
}
