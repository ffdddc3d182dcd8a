use chrono::{DateTime, Utc};
use kline_core::{Candle, CandleSeries, Decimal, Period, Symbol, merge_series};
use proptest::prelude::*;

const HOUR: i64 = 3_600;
// 2024-01-01T00:00:00Z
const BASE: i64 = 1_704_067_200;

fn ts(sec: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(sec, 0).unwrap()
}

fn candle(sec: i64, close_cents: i64) -> Candle {
    let px = Decimal::new(close_cents, 2);
    Candle::new(ts(sec), px, px, px, px, Decimal::ONE)
}

fn series(candles: Vec<Candle>) -> CandleSeries {
    CandleSeries::new(Symbol::new("BTCUSDT").unwrap(), Period::H1, candles)
}

fn arb_candle() -> impl Strategy<Value = Candle> {
    (0i64..2_000, 1i64..100_000).prop_map(|(h, c)| candle(BASE + h * HOUR, c))
}

fn arb_batch() -> impl Strategy<Value = Vec<Candle>> {
    proptest::collection::vec(arb_candle(), 0..120)
}

fn strictly_ascending(s: &CandleSeries) -> bool {
    s.candles().windows(2).all(|w| w[0].open_time < w[1].open_time)
}

proptest! {
    #[test]
    fn merge_with_itself_is_identity(batch in arb_batch(), now_h in 0i64..4_000) {
        let s = series(batch);
        let now = ts(BASE + now_h * HOUR);
        let out = merge_series(&s, s.candles().to_vec(), now);
        prop_assert_eq!(&out.series, &s);
        prop_assert_eq!(out.inserted, 0);
        prop_assert!(!out.changed());
    }

    #[test]
    fn repeated_merges_stay_sorted_and_unique(
        batches in proptest::collection::vec(arb_batch(), 1..6),
        now_h in 0i64..4_000,
    ) {
        let now = ts(BASE + now_h * HOUR);
        let mut s = series(vec![]);
        let mut expected_keys = std::collections::BTreeSet::new();
        for b in batches {
            for c in &b { expected_keys.insert(c.open_time); }
            s = merge_series(&s, b, now).series;
            prop_assert!(strictly_ascending(&s));
        }
        let keys: std::collections::BTreeSet<_> = s.iter().map(|c| c.open_time).collect();
        prop_assert_eq!(keys, expected_keys);
    }

    #[test]
    fn inserted_count_matches_new_keys(a in arb_batch(), b in arb_batch()) {
        let now = ts(BASE);
        let s = series(a);
        let before: std::collections::BTreeSet<_> = s.iter().map(|c| c.open_time).collect();
        let fresh: std::collections::BTreeSet<_> = b.iter().map(|c| c.open_time).collect();
        let out = merge_series(&s, b, now);
        prop_assert_eq!(out.inserted, fresh.difference(&before).count());
        prop_assert_eq!(out.series.len(), before.union(&fresh).count());
    }
}
