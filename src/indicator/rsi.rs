use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Bar, Indicator, check_len, check_period, smoothing};

/// Relative Strength Index with Wilder-smoothed gains and losses.
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        check_period("period", period)?;
        Ok(Self { period })
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        "rsi"
    }

    /// One extra bar for the first close-to-close change.
    fn required_candles(&self) -> usize {
        self.period + 1
    }

    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>> {
        check_len(bars.len(), self.required_candles())?;

        let (gains, losses): (Vec<f64>, Vec<f64>) = bars
            .windows(2)
            .map(|w| {
                let change = w[1].close - w[0].close;
                (change.max(0.0), (-change).max(0.0))
            })
            .unzip();

        let avg_gain = smoothing::wilder(&gains, self.period);
        let avg_loss = smoothing::wilder(&losses, self.period);

        Ok(avg_gain
            .into_iter()
            .zip(avg_loss)
            .map(|(gain, loss)| strength_index(gain, loss))
            .collect())
    }
}

fn strength_index(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}
