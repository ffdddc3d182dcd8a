//! Deterministic synthetic candle generation.

use chrono::{DateTime, Utc};
use kline_core::{Candle, FetchRequest};
use rust_decimal::Decimal;

fn symbol_seed(symbol: &str) -> i64 {
    let sum: i64 = symbol.bytes().map(i64::from).sum();
    50 + sum % 100
}

fn aligned(t: i64, step: i64) -> i64 {
    t.div_euclid(step) * step
}

/// Build the candle opening at `open_s` as seen at `now_s`.
///
/// Closed bars are a pure function of (symbol, open time). The bar containing
/// `now_s` drifts with the clock, like a live exchange's in-progress bar.
#[must_use]
pub fn synthetic_candle(symbol: &str, step: i64, open_s: i64, now_s: i64) -> Candle {
    let idx = open_s.div_euclid(step);
    let base = symbol_seed(symbol) * 100 + idx.rem_euclid(97);
    let in_progress = now_s >= open_s && now_s < open_s + step;
    let drift = if in_progress {
        ((now_s - open_s) / 60).rem_euclid(5)
    } else {
        idx.rem_euclid(5)
    };
    let open = base;
    let close = base + drift - 2;
    let high = open.max(close) + 3;
    let low = open.min(close) - 3;
    let volume = if in_progress { now_s - open_s + 1 } else { step };
    let open_time = DateTime::<Utc>::from_timestamp(open_s, 0).unwrap_or_default();
    Candle::new(
        open_time,
        Decimal::new(open, 2),
        Decimal::new(high, 2),
        Decimal::new(low, 2),
        Decimal::new(close, 2),
        Decimal::from(volume),
    )
    .with_quote_volume(Decimal::new(volume * close, 2))
    .with_trade_count(u64::try_from(volume / 10).unwrap_or(0))
}

/// Answer a fetch request with synthetic candles as of `now`.
///
/// With `from` set, the first `limit` candles at or after `from` are returned;
/// otherwise the newest `limit` candles ending at `to` (or the open bar).
/// Candles never extend past the bar containing `now`.
#[must_use]
pub fn synthesize(req: &FetchRequest, now: DateTime<Utc>) -> Vec<Candle> {
    if req.limit == 0 {
        return Vec::new();
    }
    let step = req.period.seconds();
    let now_s = now.timestamp();
    let open_now = aligned(now_s, step);
    let last = aligned(req.to.map_or(open_now, |t| t.timestamp()).min(open_now), step);
    let span = i64::try_from(req.limit - 1)
        .unwrap_or(i64::MAX)
        .saturating_mul(step);

    let (first, last) = match req.from {
        Some(from) => {
            let f = from.timestamp();
            let first = if f.rem_euclid(step) == 0 {
                f
            } else {
                aligned(f, step) + step
            };
            (first, last.min(first.saturating_add(span)))
        }
        None => (last.saturating_sub(span), last),
    };

    let mut out = Vec::new();
    let mut t = first;
    while t <= last {
        out.push(synthetic_candle(req.symbol.as_str(), step, t, now_s));
        t += step;
    }
    out
}
