use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::{
    Bar, Column, Indicator, align_series, check_len, check_period, close_prices, smoothing,
};

/// Moving Average Convergence Divergence.
pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

/// Trailing MACD outputs. `signal` and `histogram` cover the tail of `line`
/// and are empty until `line` holds `signal_period` values.
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl Macd {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
    ) -> Result<Self, Report<IndicatorError>> {
        check_period("fast_period", fast_period)?;
        check_period("slow_period", slow_period)?;
        check_period("signal_period", signal_period)?;
        if fast_period >= slow_period {
            bail!(IndicatorError::InvalidParameter {
                name: "fast_period must be < slow_period".into(),
            });
        }
        Ok(Self {
            fast_period,
            slow_period,
            signal_period,
        })
    }

    pub fn series(&self, bars: &[Bar]) -> Result<MacdSeries, Report<IndicatorError>> {
        check_len(bars.len(), self.required_candles())?;
        let closes = close_prices(bars);

        let fast = smoothing::exponential(&closes, self.fast_period);
        let slow = smoothing::exponential(&closes, self.slow_period);
        // Both end on the last bar; the fast average starts earlier
        let skip = fast.len() - slow.len();
        let line: Vec<f64> = fast[skip..].iter().zip(&slow).map(|(f, s)| f - s).collect();

        let signal = smoothing::exponential(&line, self.signal_period);
        let tail = &line[line.len() - signal.len()..];
        let histogram = tail.iter().zip(&signal).map(|(m, s)| m - s).collect();

        Ok(MacdSeries {
            line,
            signal,
            histogram,
        })
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        "macd"
    }

    fn required_candles(&self) -> usize {
        self.slow_period
    }

    /// MACD line only.
    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>> {
        Ok(self.series(bars)?.line)
    }

    /// `[line, signal, histogram]`.
    fn columns(&self, bars: &[Bar]) -> Result<Vec<Column>, Report<IndicatorError>> {
        let MacdSeries {
            line,
            signal,
            histogram,
        } = self.series(bars)?;
        let n = bars.len();
        Ok(vec![
            align_series(n, line),
            align_series(n, signal),
            align_series(n, histogram),
        ])
    }
}
