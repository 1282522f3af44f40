use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Bar, Indicator, check_len, check_period};

/// Lambert's scaling constant.
const CCI_CONSTANT: f64 = 0.015;

/// Commodity Channel Index over the typical price.
pub struct Cci {
    period: usize,
}

impl Cci {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        check_period("period", period)?;
        Ok(Self { period })
    }
}

impl Indicator for Cci {
    fn name(&self) -> &str {
        "cci"
    }

    fn required_candles(&self) -> usize {
        self.period
    }

    /// `NaN` where the mean deviation is zero.
    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>> {
        check_len(bars.len(), self.period)?;

        let typical: Vec<f64> = bars.iter().map(Bar::typical_price).collect();
        let n = self.period as f64;

        Ok(typical
            .windows(self.period)
            .map(|w| {
                let mean = w.iter().sum::<f64>() / n;
                let mean_deviation = w.iter().map(|tp| (tp - mean).abs()).sum::<f64>() / n;
                if mean_deviation == 0.0 {
                    return f64::NAN;
                }
                (w[w.len() - 1] - mean) / (CCI_CONSTANT * mean_deviation)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .map(|&c| Bar {
                open: Some(c),
                high: c,
                low: c,
                close: c,
                volume: None,
            })
            .collect()
    }

    #[test]
    fn cci_period_zero_invalid() {
        assert!(Cci::new(0).is_err());
    }

    #[test]
    fn cci_insufficient_data() {
        let cci = Cci::new(20).unwrap();
        assert!(cci.calculate(&bars_from_closes(&[1.0; 19])).is_err());
    }

    #[test]
    fn cci_known_value() {
        let cci = Cci::new(3).unwrap();
        // tp = 1, 2, 3: mean 2, mean deviation 2/3
        let values = cci.calculate(&bars_from_closes(&[1.0, 2.0, 3.0])).unwrap();
        let expected = 1.0 / (0.015 * 2.0 / 3.0);
        assert!((values[0] - expected).abs() < 1e-9);
    }

    #[test]
    fn flat_prices_have_no_cci() {
        let cci = Cci::new(3).unwrap();
        let values = cci.calculate(&bars_from_closes(&[5.0; 4])).unwrap();
        assert!(values.iter().all(|v| v.is_nan()));
    }
}
