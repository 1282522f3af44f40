use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Bar, Indicator, check_len, check_period};

/// Simple average of trading volume over a period.
///
/// A window containing a missing volume has no average.
pub struct VolumeMA {
    period: usize,
}

impl VolumeMA {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        check_period("period", period)?;
        Ok(Self { period })
    }
}

impl Indicator for VolumeMA {
    fn name(&self) -> &str {
        "volume_ma"
    }

    fn required_candles(&self) -> usize {
        self.period
    }

    /// Returns volume MA values; `NaN` marks windows with missing volume.
    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>> {
        check_len(bars.len(), self.period)?;
        Ok(bars
            .windows(self.period)
            .map(|w| {
                w.iter()
                    .map(|b| b.volume)
                    .sum::<Option<f64>>()
                    .map_or(f64::NAN, |total| total / self.period as f64)
            })
            .collect())
    }
}
