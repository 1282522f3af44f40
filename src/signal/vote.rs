use crate::model::SignalValue;

/// Collapse signals into one by strict plurality.
///
/// `Na` entries are ignored; if nothing remains the result is `Na`. BUY, SELL
/// or HOLD wins only when its count is strictly greater than both others;
/// every tie resolves to `Hold`.
pub fn aggregate(signals: &[SignalValue]) -> SignalValue {
    let (mut buy, mut sell, mut hold) = (0usize, 0usize, 0usize);
    for signal in signals {
        match signal {
            SignalValue::Buy => buy += 1,
            SignalValue::Sell => sell += 1,
            SignalValue::Hold => hold += 1,
            SignalValue::Na => {}
        }
    }

    if buy + sell + hold == 0 {
        return SignalValue::Na;
    }
    if buy > sell && buy > hold {
        SignalValue::Buy
    } else if sell > buy && sell > hold {
        SignalValue::Sell
    } else {
        SignalValue::Hold
    }
}
