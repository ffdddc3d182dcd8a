use chrono::{DateTime, TimeZone, Utc};
use kline_core::{Candle, CandleSeries, Decimal, ErrorKind, Period, Symbol, merge_series};

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn bar(t: DateTime<Utc>, close: i64) -> Candle {
    let c = Decimal::from(close);
    Candle::new(t, c, c + Decimal::ONE, c - Decimal::ONE, c, Decimal::from(10))
}

fn daily(candles: Vec<Candle>) -> CandleSeries {
    CandleSeries::new(Symbol::new("ETHUSDT").unwrap(), Period::D1, candles)
}

#[test]
fn todays_bar_is_always_replaced() {
    let now = at(2024, 3, 10, 15);
    let stored = daily(vec![bar(at(2024, 3, 9, 0), 100), bar(at(2024, 3, 10, 0), 105)]);
    let fetched = vec![bar(at(2024, 3, 10, 0), 111)];

    let out = merge_series(&stored, fetched, now);
    assert_eq!(out.overwritten, 1);
    assert_eq!(out.modified, 1);
    assert_eq!(out.series.last().unwrap().close, Decimal::from(111));
}

#[test]
fn yesterdays_bar_is_finalized_even_when_not_newest() {
    let now = at(2024, 3, 10, 1);
    let stored = daily(vec![
        bar(at(2024, 3, 8, 0), 90),
        bar(at(2024, 3, 9, 0), 100),
        bar(at(2024, 3, 10, 0), 101),
    ]);
    let out = merge_series(&stored, vec![bar(at(2024, 3, 9, 0), 100)], now);
    assert_eq!(out.overwritten, 1);
    assert_eq!(out.unchanged, 0);
    assert_eq!(out.modified, 0);
    assert!(!out.changed());
}

#[test]
fn newest_stored_bar_is_replaced_even_if_old() {
    // Series last stored weeks ago; its final bar may have been captured mid-period.
    let now = at(2024, 4, 1, 0);
    let stored = daily(vec![bar(at(2024, 3, 1, 0), 50), bar(at(2024, 3, 2, 0), 51)]);
    let fetched = vec![bar(at(2024, 3, 2, 0), 51), bar(at(2024, 3, 3, 0), 52)];

    let out = merge_series(&stored, fetched, now);
    assert_eq!(out.inserted, 1);
    assert_eq!(out.overwritten, 1);
    assert_eq!(out.modified, 0);
}

#[test]
fn historical_bar_is_only_rewritten_when_values_differ() {
    let now = at(2024, 4, 1, 0);
    let stored = daily(vec![
        bar(at(2024, 3, 1, 0), 50),
        bar(at(2024, 3, 2, 0), 51),
        bar(at(2024, 3, 3, 0), 52),
    ]);

    let same = merge_series(&stored, vec![bar(at(2024, 3, 1, 0), 50)], now);
    assert_eq!(same.overwritten, 0);
    assert_eq!(same.unchanged, 1);
    assert!(!same.changed());

    let corrected = merge_series(&stored, vec![bar(at(2024, 3, 1, 0), 49)], now);
    assert_eq!(corrected.overwritten, 1);
    assert!(corrected.changed());
    assert_eq!(corrected.series.first().unwrap().close, Decimal::from(49));
}

#[test]
fn trade_count_difference_counts_as_a_correction() {
    let now = at(2024, 4, 1, 0);
    let stored = daily(vec![bar(at(2024, 3, 1, 0), 50), bar(at(2024, 3, 2, 0), 51)]);
    let fixed = bar(at(2024, 3, 1, 0), 50).with_trade_count(7);
    let out = merge_series(&stored, vec![fixed], now);
    assert_eq!(out.modified, 1);
    assert_eq!(out.series.first().unwrap().trade_count, 7);
}

#[test]
fn insane_candle_is_dropped_without_affecting_the_batch() {
    let now = at(2024, 3, 10, 0);
    let stored = daily(vec![]);
    let mut broken = bar(at(2024, 3, 5, 0), 10);
    broken.high = Decimal::from(1);
    let fetched = vec![bar(at(2024, 3, 4, 0), 9), broken, bar(at(2024, 3, 6, 0), 11)];

    let out = merge_series(&stored, fetched, now);
    assert_eq!(out.series.len(), 2);
    assert_eq!(out.rejected.len(), 1);
    assert_eq!(out.rejected[0].kind(), ErrorKind::DataIntegrity);
}

#[test]
fn merging_into_empty_series_keeps_order() {
    let now = at(2024, 3, 10, 0);
    let fetched = vec![bar(at(2024, 3, 3, 0), 3), bar(at(2024, 3, 1, 0), 1)];
    let out = merge_series(&daily(vec![]), fetched, now);
    assert_eq!(out.inserted, 2);
    assert!(out.series.first().unwrap().open_time < out.series.last().unwrap().open_time);
}
