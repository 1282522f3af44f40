use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{
    Bar, Column, Indicator, align_series, check_len, check_period, smoothing,
};

/// Stochastic oscillator: %K over `k_period` bars, %D as the SMA of %K.
pub struct Stochastic {
    k_period: usize,
    d_period: usize,
}

impl Stochastic {
    pub fn new(k_period: usize, d_period: usize) -> Result<Self, Report<IndicatorError>> {
        check_period("k_period", k_period)?;
        check_period("d_period", d_period)?;
        Ok(Self { k_period, d_period })
    }

    /// %K values; `NaN` where the window's high-low range is zero.
    fn percent_k(&self, bars: &[Bar]) -> Vec<f64> {
        bars.windows(self.k_period)
            .map(|w| {
                let highest = w.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
                let lowest = w.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
                let range = highest - lowest;
                if range == 0.0 {
                    return f64::NAN;
                }
                let close = w[w.len() - 1].close;
                100.0 * (close - lowest) / range
            })
            .collect()
    }
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        "stochastic"
    }

    fn required_candles(&self) -> usize {
        self.k_period
    }

    /// Returns %K values only.
    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>> {
        check_len(bars.len(), self.k_period)?;
        Ok(self.percent_k(bars))
    }

    /// `[%K, %D]`.
    fn columns(&self, bars: &[Bar]) -> Result<Vec<Column>, Report<IndicatorError>> {
        let k = self.calculate(bars)?;
        let d = smoothing::simple(&k, self.d_period);
        let n = bars.len();
        Ok(vec![align_series(n, k), align_series(n, d)])
    }
}
