use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use kline_types::{CandleSeries, FetchGap};

/// Find the first hole in a series' calendar-date coverage.
///
/// Distinct UTC dates are collected and scanned in order; the first adjacent
/// pair further apart than the period's day step (one day for sub-daily
/// periods) is reported. The gap starts one step after the last contiguous
/// date. Only the first gap is returned; callers re-run detection after
/// resolving it.
///
/// ```
/// use chrono::{DateTime, Utc};
/// use kline_core::{Candle, CandleSeries, Decimal, Period, Symbol, detect_gap};
///
/// let day = |d: i64| DateTime::<Utc>::from_timestamp(d * 86_400, 0).unwrap();
/// let mk = |d: i64| Candle::new(day(d), Decimal::ONE, Decimal::ONE, Decimal::ONE, Decimal::ONE, Decimal::ONE);
/// let series = CandleSeries::new(
///     Symbol::new("BTCUSDT").unwrap(),
///     Period::D1,
///     vec![mk(0), mk(1), mk(5), mk(6)],
/// );
/// let gap = detect_gap(&series).unwrap();
/// assert_eq!(gap.start, day(2).date_naive());
/// assert_eq!(gap.missing_days(), 3);
/// ```
#[must_use]
pub fn detect_gap(series: &CandleSeries) -> Option<FetchGap> {
    if series.len() < 2 {
        return None;
    }
    let step = series.period().day_step();
    let dates: BTreeSet<NaiveDate> = series.iter().map(|c| c.date()).collect();

    let mut iter = dates.into_iter();
    let mut prev = iter.next()?;
    for next in iter {
        if (next - prev).num_days() > step {
            let start = prev.checked_add_days(Days::new(step.unsigned_abs()))?;
            return Some(FetchGap {
                after_date: prev,
                before_date: next,
                start,
            });
        }
        prev = next;
    }
    None
}
