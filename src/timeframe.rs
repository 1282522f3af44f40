use chrono::{Datelike, Days, Months, NaiveDate};
use error_stack::Report;

use crate::error::TimeframeError;
use crate::model::{Candle, Timeframe};

/// Resample an OHLCV series into `timeframe` bars.
///
/// The input is copied and sorted ascending by date. Daily is the identity.
/// Weekly periods run Monday to Sunday and are labelled by their Sunday;
/// monthly periods are labelled by their last calendar day. Periods whose
/// aggregate lacks any of open/high/low/close are dropped.
pub fn resample(series: &[Candle], timeframe: Timeframe) -> Vec<Candle> {
    let mut sorted = series.to_vec();
    sorted.sort_by_key(|c| c.date);

    if timeframe == Timeframe::Daily {
        return sorted;
    }

    let mut bars = Vec::new();
    let mut current: Option<Period> = None;

    for candle in &sorted {
        let Some(label) = period_end(candle.date, timeframe) else {
            continue;
        };
        match current.as_mut() {
            Some(period) if period.label == label => period.push(candle),
            _ => {
                if let Some(done) = current.take().and_then(Period::finish) {
                    bars.push(done);
                }
                let mut period = Period::new(label);
                period.push(candle);
                current = Some(period);
            }
        }
    }
    if let Some(done) = current.and_then(Period::finish) {
        bars.push(done);
    }

    bars
}

/// Resample using a timeframe identifier, failing on unknown identifiers.
pub fn resample_named(
    series: &[Candle],
    timeframe: &str,
) -> Result<Vec<Candle>, Report<TimeframeError>> {
    let timeframe: Timeframe = timeframe.parse()?;
    Ok(resample(series, timeframe))
}

/// Last calendar day of the period containing `date`.
fn period_end(date: NaiveDate, timeframe: Timeframe) -> Option<NaiveDate> {
    match timeframe {
        Timeframe::Daily => Some(date),
        Timeframe::Weekly => {
            let to_sunday = 6 - u64::from(date.weekday().num_days_from_monday());
            date.checked_add_days(Days::new(to_sunday))
        }
        Timeframe::Monthly => date
            .with_day(1)?
            .checked_add_months(Months::new(1))?
            .pred_opt(),
    }
}

struct Period {
    label: NaiveDate,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

impl Period {
    fn new(label: NaiveDate) -> Self {
        Self {
            label,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
        }
    }

    fn push(&mut self, candle: &Candle) {
        self.open = self.open.or(candle.open);
        self.high = merge(self.high, candle.high, f64::max);
        self.low = merge(self.low, candle.low, f64::min);
        self.close = candle.close.or(self.close);
        self.volume = merge(self.volume, candle.volume, |a, b| a + b);
    }

    fn finish(self) -> Option<Candle> {
        let candle = Candle {
            date: self.label,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        };
        candle.has_ohlc().then_some(candle)
    }
}

fn merge(acc: Option<f64>, value: Option<f64>, f: impl Fn(f64, f64) -> f64) -> Option<f64> {
    match (acc, value) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (a, b) => a.or(b),
    }
}
