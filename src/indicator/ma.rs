use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Bar, Indicator, check_len, check_period, close_prices, smoothing};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Simple,
    /// Seeded with the simple average of the first window.
    Exponential,
    /// Linear weights 1..=period, newest heaviest.
    Weighted,
}

/// Moving average of closing prices.
pub struct MovingAverage {
    kind: Kind,
    period: usize,
}

impl MovingAverage {
    pub fn new(kind: Kind, period: usize) -> Result<Self, Report<IndicatorError>> {
        check_period("period", period)?;
        Ok(Self { kind, period })
    }

    pub fn sma(period: usize) -> Result<Self, Report<IndicatorError>> {
        Self::new(Kind::Simple, period)
    }

    pub fn ema(period: usize) -> Result<Self, Report<IndicatorError>> {
        Self::new(Kind::Exponential, period)
    }

    pub fn wma(period: usize) -> Result<Self, Report<IndicatorError>> {
        Self::new(Kind::Weighted, period)
    }
}

impl Indicator for MovingAverage {
    fn name(&self) -> &str {
        match self.kind {
            Kind::Simple => "sma",
            Kind::Exponential => "ema",
            Kind::Weighted => "wma",
        }
    }

    fn required_candles(&self) -> usize {
        self.period
    }

    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>> {
        check_len(bars.len(), self.period)?;
        let closes = close_prices(bars);
        Ok(match self.kind {
            Kind::Simple => smoothing::simple(&closes, self.period),
            Kind::Exponential => smoothing::exponential(&closes, self.period),
            Kind::Weighted => smoothing::weighted(&closes, self.period),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closes(values: &[f64]) -> Vec<Bar> {
        values
            .iter()
            .map(|&c| Bar {
                open: None,
                high: c,
                low: c,
                close: c,
                volume: None,
            })
            .collect()
    }

    #[test]
    fn zero_period_rejected_for_every_kind() {
        for kind in [Kind::Simple, Kind::Exponential, Kind::Weighted] {
            assert!(MovingAverage::new(kind, 0).is_err());
        }
    }

    #[test]
    fn short_series_is_an_error() {
        let sma = MovingAverage::sma(5).unwrap();
        assert!(sma.calculate(&closes(&[1.0; 4])).is_err());
    }

    #[test]
    fn names_follow_kind() {
        assert_eq!(MovingAverage::sma(3).unwrap().name(), "sma");
        assert_eq!(MovingAverage::ema(3).unwrap().name(), "ema");
        assert_eq!(MovingAverage::wma(3).unwrap().name(), "wma");
    }

    #[test]
    fn kinds_diverge_on_a_ramp() {
        let bars = closes(&[1.0, 2.0, 3.0, 4.0]);
        let sma = MovingAverage::sma(3).unwrap().calculate(&bars).unwrap();
        let ema = MovingAverage::ema(3).unwrap().calculate(&bars).unwrap();
        let wma = MovingAverage::wma(3).unwrap().calculate(&bars).unwrap();
        assert_eq!(sma, vec![2.0, 3.0]);
        // ema seed equals the first sma, then moves halfway toward 4
        assert_eq!(ema, vec![2.0, 3.0]);
        assert!(wma[1] > sma[1]);
    }

    #[test]
    fn window_twenty_output_length() {
        let wma = MovingAverage::wma(20).unwrap();
        let values = wma.calculate(&closes(&[5.0; 25])).unwrap();
        assert_eq!(values.len(), 6);
    }
}
