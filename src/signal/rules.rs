use std::collections::BTreeMap;

use crate::indicator::{IndicatorRow, names};
use crate::model::SignalValue;

/// Pseudo-inputs read from the candle rather than the indicator map.
pub const CLOSE: &str = "close";
pub const VOLUME: &str = "volume";

/// Decision thresholds shared by the rule set. All comparisons are strict
/// except the ADX trend floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleThresholds {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub stoch_oversold: f64,
    pub stoch_overbought: f64,
    pub adx_trend: f64,
    pub cci_oversold: f64,
    pub cci_overbought: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            stoch_oversold: 20.0,
            stoch_overbought: 80.0,
            adx_trend: 20.0,
            cci_oversold: -100.0,
            cci_overbought: 100.0,
        }
    }
}

/// Maps the latest indicator row to one categorical signal.
pub trait SignalRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inputs read from the row, in the order `decide` receives them.
    fn required_inputs(&self) -> &[&'static str];

    /// Decide from a complete set of inputs.
    fn decide(&self, inputs: &[f64]) -> SignalValue;

    /// Returns `Na` whenever a required input is missing.
    fn evaluate(&self, row: &IndicatorRow) -> SignalValue {
        match gather(row, self.required_inputs()) {
            Some(values) => self.decide(&values),
            None => SignalValue::Na,
        }
    }
}

fn lookup(row: &IndicatorRow, input: &str) -> Option<f64> {
    match input {
        CLOSE => row.close(),
        VOLUME => row.volume(),
        other => row.value(other),
    }
}

/// All inputs in order, or `None` if any is missing.
fn gather(row: &IndicatorRow, inputs: &[&'static str]) -> Option<Vec<f64>> {
    inputs.iter().map(|input| lookup(row, input)).collect()
}

#[derive(Debug, Clone, Copy)]
enum Decision {
    /// One value: BUY below `buy_below`, SELL above `sell_above`.
    Threshold { buy_below: f64, sell_above: f64 },
    /// Every value below `buy_below` buys, every value above `sell_above` sells.
    AllThreshold { buy_below: f64, sell_above: f64 },
    /// `[a, b]`: BUY when a > b, SELL when a < b.
    Above,
    /// `[close, lower, upper]`: BUY below the lower band, SELL above the upper.
    Band,
    /// `[strength, close, average]`: direction of close vs average once strength reaches the floor.
    Trend { min_strength: f64 },
}

impl Decision {
    fn decide(self, v: &[f64]) -> SignalValue {
        match self {
            Self::Threshold {
                buy_below,
                sell_above,
            } => {
                if v[0] < buy_below {
                    SignalValue::Buy
                } else if v[0] > sell_above {
                    SignalValue::Sell
                } else {
                    SignalValue::Hold
                }
            }
            Self::AllThreshold {
                buy_below,
                sell_above,
            } => {
                if v.iter().all(|x| *x < buy_below) {
                    SignalValue::Buy
                } else if v.iter().all(|x| *x > sell_above) {
                    SignalValue::Sell
                } else {
                    SignalValue::Hold
                }
            }
            Self::Above => compare(v[0], v[1]),
            Self::Band => {
                let (close, lower, upper) = (v[0], v[1], v[2]);
                if close < lower {
                    SignalValue::Buy
                } else if close > upper {
                    SignalValue::Sell
                } else {
                    SignalValue::Hold
                }
            }
            Self::Trend { min_strength } => {
                if v[0] >= min_strength {
                    compare(v[1], v[2])
                } else {
                    SignalValue::Hold
                }
            }
        }
    }
}

fn compare(a: f64, b: f64) -> SignalValue {
    if a > b {
        SignalValue::Buy
    } else if a < b {
        SignalValue::Sell
    } else {
        SignalValue::Hold
    }
}

/// A single-indicator rule.
pub struct IndicatorRule {
    name: &'static str,
    inputs: Vec<&'static str>,
    decision: Decision,
}

impl SignalRule for IndicatorRule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn required_inputs(&self) -> &[&'static str] {
        &self.inputs
    }

    fn decide(&self, inputs: &[f64]) -> SignalValue {
        self.decision.decide(inputs)
    }
}

/// Three-condition rule used when a single signal is wanted instead of a vote:
/// BUY iff RSI is oversold, MACD is above its signal and close is above SMA20;
/// SELL on the mirrored conditions; otherwise HOLD.
pub struct CompactRule {
    thresholds: RuleThresholds,
}

impl CompactRule {
    const INPUTS: [&'static str; 5] = [
        names::RSI,
        names::MACD,
        names::MACD_SIGNAL,
        names::SMA_20,
        CLOSE,
    ];

    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }
}

impl SignalRule for CompactRule {
    fn name(&self) -> &'static str {
        "compact"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &Self::INPUTS
    }

    fn decide(&self, v: &[f64]) -> SignalValue {
        let (rsi, macd, macd_signal, sma, close) = (v[0], v[1], v[2], v[3], v[4]);
        let t = &self.thresholds;

        if rsi < t.rsi_oversold && macd > macd_signal && close > sma {
            SignalValue::Buy
        } else if rsi > t.rsi_overbought && macd < macd_signal && close < sma {
            SignalValue::Sell
        } else {
            SignalValue::Hold
        }
    }
}

/// The ten per-indicator rules, evaluated together on one row.
pub struct RuleSet {
    rules: Vec<Box<dyn SignalRule>>,
}

impl RuleSet {
    pub fn standard(t: RuleThresholds) -> Self {
        let rule = |name, inputs: &[&'static str], decision| -> Box<dyn SignalRule> {
            Box::new(IndicatorRule {
                name,
                inputs: inputs.to_vec(),
                decision,
            })
        };

        Self {
            rules: vec![
                rule(
                    "rsi",
                    &[names::RSI],
                    Decision::Threshold {
                        buy_below: t.rsi_oversold,
                        sell_above: t.rsi_overbought,
                    },
                ),
                rule("macd", &[names::MACD, names::MACD_SIGNAL], Decision::Above),
                rule(
                    "stochastic",
                    &[names::STOCH_K, names::STOCH_D],
                    Decision::AllThreshold {
                        buy_below: t.stoch_oversold,
                        sell_above: t.stoch_overbought,
                    },
                ),
                rule(
                    "adx",
                    &[names::ADX, CLOSE, names::SMA_20],
                    Decision::Trend {
                        min_strength: t.adx_trend,
                    },
                ),
                rule(
                    "cci",
                    &[names::CCI],
                    Decision::Threshold {
                        buy_below: t.cci_oversold,
                        sell_above: t.cci_overbought,
                    },
                ),
                rule("sma_20", &[CLOSE, names::SMA_20], Decision::Above),
                rule("ema_20", &[CLOSE, names::EMA_20], Decision::Above),
                rule("wma_20", &[CLOSE, names::WMA_20], Decision::Above),
                rule(
                    "bollinger",
                    &[CLOSE, names::BB_LOWER, names::BB_UPPER],
                    Decision::Band,
                ),
                rule("volume_sma_20", &[VOLUME, names::VOL_SMA_20], Decision::Above),
            ],
        }
    }

    /// One signal per rule, keyed by rule name.
    pub fn evaluate(&self, row: &IndicatorRow) -> BTreeMap<&'static str, SignalValue> {
        self.rules
            .iter()
            .map(|rule| (rule.name(), rule.evaluate(row)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Candle;
    use chrono::NaiveDate;

    fn row(close: Option<f64>, volume: Option<f64>, values: &[(&'static str, f64)]) -> IndicatorRow {
        IndicatorRow {
            candle: Candle {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume,
            },
            values: values.iter().map(|&(k, v)| (k, Some(v))).collect(),
        }
    }

    fn standard() -> RuleSet {
        RuleSet::standard(RuleThresholds::default())
    }

    fn compact() -> CompactRule {
        CompactRule::new(RuleThresholds::default())
    }

    #[test]
    fn compact_rule_buy() {
        let r = row(
            Some(110.0),
            None,
            &[
                (names::RSI, 25.0),
                (names::MACD, 1.0),
                (names::MACD_SIGNAL, 0.5),
                (names::SMA_20, 100.0),
            ],
        );
        assert_eq!(compact().evaluate(&r), SignalValue::Buy);
    }

    #[test]
    fn compact_rule_sell() {
        let r = row(
            Some(90.0),
            None,
            &[
                (names::RSI, 75.0),
                (names::MACD, -1.0),
                (names::MACD_SIGNAL, 0.0),
                (names::SMA_20, 100.0),
            ],
        );
        assert_eq!(compact().evaluate(&r), SignalValue::Sell);
    }

    #[test]
    fn compact_rule_hold_on_neutral_rsi() {
        let r = row(
            Some(110.0),
            None,
            &[
                (names::RSI, 50.0),
                (names::MACD, 1.0),
                (names::MACD_SIGNAL, 0.5),
                (names::SMA_20, 100.0),
            ],
        );
        assert_eq!(compact().evaluate(&r), SignalValue::Hold);
    }

    #[test]
    fn compact_rule_na_when_rsi_missing() {
        let r = row(
            Some(110.0),
            None,
            &[
                (names::MACD, 1.0),
                (names::MACD_SIGNAL, 0.5),
                (names::SMA_20, 100.0),
            ],
        );
        assert_eq!(compact().evaluate(&r), SignalValue::Na);
    }

    #[test]
    fn standard_set_has_ten_rules() {
        let signals = standard().evaluate(&row(None, None, &[]));
        assert_eq!(signals.len(), 10);
        assert!(signals.values().all(|s| *s == SignalValue::Na));
    }

    #[test]
    fn threshold_rules_are_strict() {
        let set = standard();
        let at_edges = row(
            Some(100.0),
            None,
            &[(names::RSI, 30.0), (names::CCI, 100.0)],
        );
        let signals = set.evaluate(&at_edges);
        assert_eq!(signals["rsi"], SignalValue::Hold);
        assert_eq!(signals["cci"], SignalValue::Hold);

        let beyond = row(
            Some(100.0),
            None,
            &[(names::RSI, 71.0), (names::CCI, -150.0)],
        );
        let signals = set.evaluate(&beyond);
        assert_eq!(signals["rsi"], SignalValue::Sell);
        assert_eq!(signals["cci"], SignalValue::Buy);
    }

    #[test]
    fn stochastic_needs_both_lines() {
        let set = standard();
        let both_low = row(None, None, &[(names::STOCH_K, 10.0), (names::STOCH_D, 15.0)]);
        assert_eq!(set.evaluate(&both_low)["stochastic"], SignalValue::Buy);

        let mixed = row(None, None, &[(names::STOCH_K, 10.0), (names::STOCH_D, 25.0)]);
        assert_eq!(set.evaluate(&mixed)["stochastic"], SignalValue::Hold);

        let both_high = row(None, None, &[(names::STOCH_K, 85.0), (names::STOCH_D, 90.0)]);
        assert_eq!(set.evaluate(&both_high)["stochastic"], SignalValue::Sell);

        let k_only = row(None, None, &[(names::STOCH_K, 10.0)]);
        assert_eq!(set.evaluate(&k_only)["stochastic"], SignalValue::Na);
    }

    #[test]
    fn adx_follows_sma_only_in_a_trend() {
        let set = standard();
        let strong_up = row(Some(110.0), None, &[(names::ADX, 20.0), (names::SMA_20, 100.0)]);
        assert_eq!(set.evaluate(&strong_up)["adx"], SignalValue::Buy);

        let strong_down = row(Some(90.0), None, &[(names::ADX, 35.0), (names::SMA_20, 100.0)]);
        assert_eq!(set.evaluate(&strong_down)["adx"], SignalValue::Sell);

        let weak = row(Some(110.0), None, &[(names::ADX, 19.9), (names::SMA_20, 100.0)]);
        assert_eq!(set.evaluate(&weak)["adx"], SignalValue::Hold);

        let no_sma = row(Some(110.0), None, &[(names::ADX, 40.0)]);
        assert_eq!(set.evaluate(&no_sma)["adx"], SignalValue::Na);
    }

    #[test]
    fn moving_average_rules_compare_close() {
        let set = standard();
        let r = row(
            Some(100.0),
            None,
            &[
                (names::SMA_20, 90.0),
                (names::EMA_20, 110.0),
                (names::WMA_20, 100.0),
            ],
        );
        let signals = set.evaluate(&r);
        assert_eq!(signals["sma_20"], SignalValue::Buy);
        assert_eq!(signals["ema_20"], SignalValue::Sell);
        assert_eq!(signals["wma_20"], SignalValue::Hold);
    }

    #[test]
    fn bollinger_band_breaks() {
        let set = standard();
        let bands = [(names::BB_LOWER, 95.0), (names::BB_UPPER, 105.0)];
        assert_eq!(
            set.evaluate(&row(Some(94.0), None, &bands))["bollinger"],
            SignalValue::Buy
        );
        assert_eq!(
            set.evaluate(&row(Some(106.0), None, &bands))["bollinger"],
            SignalValue::Sell
        );
        assert_eq!(
            set.evaluate(&row(Some(105.0), None, &bands))["bollinger"],
            SignalValue::Hold
        );
    }

    #[test]
    fn volume_rule_uses_candle_volume() {
        let set = standard();
        let vol = [(names::VOL_SMA_20, 1_000.0)];
        assert_eq!(
            set.evaluate(&row(Some(1.0), Some(1_500.0), &vol))["volume_sma_20"],
            SignalValue::Buy
        );
        assert_eq!(
            set.evaluate(&row(Some(1.0), Some(500.0), &vol))["volume_sma_20"],
            SignalValue::Sell
        );
        assert_eq!(
            set.evaluate(&row(Some(1.0), None, &vol))["volume_sma_20"],
            SignalValue::Na
        );
    }

    #[test]
    fn missing_input_only_affects_its_rule() {
        let set = standard();
        let r = row(Some(100.0), None, &[(names::RSI, 20.0), (names::SMA_20, 90.0)]);
        let signals = set.evaluate(&r);
        assert_eq!(signals["rsi"], SignalValue::Buy);
        assert_eq!(signals["sma_20"], SignalValue::Buy);
        assert_eq!(signals["macd"], SignalValue::Na);
    }
}
