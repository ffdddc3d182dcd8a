use kline_types::{Candle, KlineError};
use rust_decimal::Decimal;

/// Check basic OHLC sanity for a single candle.
///
/// # Errors
/// Returns `KlineError::DataIntegrity` if any price or volume is negative, if
/// `high < max(open, close)`, or if `low > min(open, close)`.
pub fn validate_candle(c: &Candle) -> Result<(), KlineError> {
    let ms = c.open_time_ms();
    if [c.open, c.high, c.low, c.close]
        .iter()
        .any(|px| *px < Decimal::ZERO)
    {
        return Err(KlineError::integrity(ms, "negative price"));
    }
    if c.volume < Decimal::ZERO || c.quote_volume < Decimal::ZERO {
        return Err(KlineError::integrity(ms, "negative volume"));
    }
    if c.high < c.open.max(c.close) {
        return Err(KlineError::integrity(
            ms,
            format!("high {} below body max {}", c.high, c.open.max(c.close)),
        ));
    }
    if c.low > c.open.min(c.close) {
        return Err(KlineError::integrity(
            ms,
            format!("low {} above body min {}", c.low, c.open.min(c.close)),
        ));
    }
    Ok(())
}

/// Split candles into those passing [`validate_candle`] and the errors for the rest.
#[must_use]
pub fn partition_valid(candles: Vec<Candle>) -> (Vec<Candle>, Vec<KlineError>) {
    let mut ok = Vec::with_capacity(candles.len());
    let mut rejected = Vec::new();
    for c in candles {
        match validate_candle(&c) {
            Ok(()) => ok.push(c),
            Err(e) => rejected.push(e),
        }
    }
    (ok, rejected)
}
