mod helpers;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use helpers::{at, now, sym};
use kline::{Candle, CandleSeries, Decimal, Direction, ExtremumTracker, Period};

fn series(symbol: &str, bars: &[(DateTime<Utc>, i64)]) -> CandleSeries {
    let candles = bars
        .iter()
        .map(|&(t, close)| {
            let c = Decimal::from(close);
            Candle::new(t, c, c, c, c, Decimal::ONE)
        })
        .collect();
    CandleSeries::new(sym(symbol), Period::H1, candles)
}

fn closes(symbol: &str, closes: &[i64]) -> CandleSeries {
    let first = at(10, 12) - TimeDelta::hours(closes.len() as i64 - 1);
    let bars: Vec<_> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| (first + TimeDelta::hours(i as i64), c))
        .collect();
    series(symbol, &bars)
}

fn four_hours(direction: Direction) -> ExtremumTracker {
    ExtremumTracker::new(direction, TimeDelta::hours(4))
}

#[test]
fn new_high_reports_previous_extreme_and_change() {
    let hit = four_hours(Direction::Max)
        .evaluate(&closes("BTCUSDT", &[10, 11, 12, 15]), now())
        .unwrap();

    assert_eq!(hit.symbol, sym("BTCUSDT"));
    assert_eq!(hit.open_time, at(10, 12));
    assert_eq!(hit.close, Decimal::from(15));
    assert_eq!(hit.previous, Decimal::from(12));
    assert_eq!(hit.change_pct, Decimal::from(50));
}

#[test]
fn latest_close_must_strictly_beat_the_window() {
    let max = four_hours(Direction::Max);
    assert!(max.evaluate(&closes("X", &[10, 15, 12, 14]), now()).is_none());
    assert!(max.evaluate(&closes("X", &[10, 12, 11, 12]), now()).is_none());
    assert!(max.evaluate(&closes("X", &[10]), now()).is_none());
    assert!(max.evaluate(&CandleSeries::empty(sym("X"), Period::H1), now()).is_none());
}

#[test]
fn new_low_mirrors_new_high() {
    let min = four_hours(Direction::Min);
    assert_eq!(min.direction(), Direction::Min);

    let hit = min.evaluate(&closes("ETHUSDT", &[10, 9, 8, 7]), now()).unwrap();
    assert_eq!(hit.previous, Decimal::from(8));
    assert_eq!(hit.change_pct, Decimal::from(-30));

    assert!(min.evaluate(&closes("ETHUSDT", &[10, 11, 12, 15]), now()).is_none());
}

#[test]
fn candles_before_the_lookback_are_ignored() {
    let s = series(
        "SOLUSDT",
        &[
            (at(10, 5), 20),
            (at(10, 9), 10),
            (at(10, 10), 11),
            (at(10, 11), 12),
            (at(10, 12), 15),
        ],
    );

    assert!(four_hours(Direction::Max).evaluate(&s, now()).is_some());
    let wide = ExtremumTracker::new(Direction::Max, TimeDelta::hours(8));
    assert!(wide.evaluate(&s, now()).is_none());
}

#[test]
fn change_from_a_zero_base_is_not_reported() {
    let s = closes("ZERO", &[0, 1, 2]);
    assert!(four_hours(Direction::Max).evaluate(&s, now()).is_none());
}

#[test]
fn filter_excludes_series() {
    let tracker = four_hours(Direction::Max).with_filter(|s| s.symbol().as_str().ends_with("USDT"));
    assert!(tracker.evaluate(&closes("BTCUSDT", &[10, 15]), now()).is_some());
    assert!(tracker.evaluate(&closes("BTCEUR", &[10, 15]), now()).is_none());
}

#[test]
fn rank_orders_by_strength_then_symbol() {
    let mut map = HashMap::new();
    for (name, cs) in [
        ("AAA", vec![10, 11, 15]),
        ("BBB", vec![10, 10, 11]),
        ("CCC", vec![10, 20, 12]),
        ("DDD", vec![20, 25, 30]),
        ("EEE", vec![30, 20, 10]),
    ] {
        map.insert(sym(name), Arc::new(closes(name, &cs)));
    }

    let highs: Vec<_> = four_hours(Direction::Max)
        .rank(&map, now())
        .into_iter()
        .map(|h| h.symbol.as_str().to_string())
        .collect();
    assert_eq!(highs, vec!["AAA", "DDD", "BBB"]);

    let lows = four_hours(Direction::Min).rank(&map, now());
    assert_eq!(lows.len(), 1);
    assert_eq!(lows[0].symbol, sym("EEE"));
    assert_eq!(lows[0].change_pct, Decimal::new(-666_667, 4));
}
