use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::{
    Bar, Column, Indicator, align_series, check_len, check_period, close_prices, smoothing,
};

/// One window's bands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bollinger Bands: an SMA of closes plus and minus a multiple of the
/// population standard deviation of the same window.
pub struct BollingerBands {
    period: usize,
    width: f64,
}

impl BollingerBands {
    pub fn new(period: usize, width: f64) -> Result<Self, Report<IndicatorError>> {
        check_period("period", period)?;
        if width <= 0.0 {
            bail!(IndicatorError::InvalidParameter {
                name: "band width must be > 0".into(),
            });
        }
        Ok(Self { period, width })
    }

    pub fn bands(&self, bars: &[Bar]) -> Result<Vec<Bands>, Report<IndicatorError>> {
        check_len(bars.len(), self.period)?;
        let closes = close_prices(bars);
        let means = smoothing::simple(&closes, self.period);
        let n = self.period as f64;

        Ok(closes
            .windows(self.period)
            .zip(means)
            .map(|(window, middle)| {
                let variance = window.iter().map(|c| (c - middle).powi(2)).sum::<f64>() / n;
                let offset = self.width * variance.sqrt();
                Bands {
                    upper: middle + offset,
                    middle,
                    lower: middle - offset,
                }
            })
            .collect())
    }
}

impl Indicator for BollingerBands {
    fn name(&self) -> &str {
        "bollinger"
    }

    fn required_candles(&self) -> usize {
        self.period
    }

    /// Middle band only.
    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>> {
        Ok(self.bands(bars)?.into_iter().map(|b| b.middle).collect())
    }

    /// `[upper, middle, lower]`.
    fn columns(&self, bars: &[Bar]) -> Result<Vec<Column>, Report<IndicatorError>> {
        let bands = self.bands(bars)?;
        let n = bars.len();
        let column = |pick: fn(&Bands) -> f64| align_series(n, bands.iter().map(pick).collect());
        Ok(vec![
            column(|b| b.upper),
            column(|b| b.middle),
            column(|b| b.lower),
        ])
    }
}
