use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Bar, Indicator, check_len, check_period, smoothing};

/// Average Directional Index (trend strength, not direction).
///
/// True range and directional movement are Wilder-smoothed over `period`,
/// turned into DX, and DX is Wilder-smoothed again. The first value needs
/// `2 * period` bars.
pub struct Adx {
    period: usize,
}

impl Adx {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        check_period("period", period)?;
        Ok(Self { period })
    }
}

/// `(true range, +DM, -DM)` between two consecutive bars.
fn movement(prev: &Bar, cur: &Bar) -> (f64, f64, f64) {
    let true_range = (cur.high - cur.low)
        .max((cur.high - prev.close).abs())
        .max((cur.low - prev.close).abs());
    let up = cur.high - prev.high;
    let down = prev.low - cur.low;
    let plus = if up > down && up > 0.0 { up } else { 0.0 };
    let minus = if down > up && down > 0.0 { down } else { 0.0 };
    (true_range, plus, minus)
}

fn directional_index(true_range: f64, plus_dm: f64, minus_dm: f64) -> f64 {
    if true_range == 0.0 {
        return 0.0;
    }
    let plus_di = 100.0 * plus_dm / true_range;
    let minus_di = 100.0 * minus_dm / true_range;
    let total = plus_di + minus_di;
    if total == 0.0 {
        return 0.0;
    }
    100.0 * (plus_di - minus_di).abs() / total
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        "adx"
    }

    fn required_candles(&self) -> usize {
        2 * self.period
    }

    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>> {
        check_len(bars.len(), self.required_candles())?;

        let mut true_range = Vec::with_capacity(bars.len() - 1);
        let mut plus_dm = Vec::with_capacity(bars.len() - 1);
        let mut minus_dm = Vec::with_capacity(bars.len() - 1);
        for w in bars.windows(2) {
            let (tr, plus, minus) = movement(&w[0], &w[1]);
            true_range.push(tr);
            plus_dm.push(plus);
            minus_dm.push(minus);
        }

        let tr = smoothing::wilder(&true_range, self.period);
        let plus = smoothing::wilder(&plus_dm, self.period);
        let minus = smoothing::wilder(&minus_dm, self.period);
        let dx: Vec<f64> = tr
            .iter()
            .zip(&plus)
            .zip(&minus)
            .map(|((&tr, &plus), &minus)| directional_index(tr, plus, minus))
            .collect();

        Ok(smoothing::wilder(&dx, self.period))
    }
}
