mod helpers;

use chrono::TimeDelta;
use helpers::{Rig, at, hourly, hours, sym};
use kline::{CandleStore, Period, SyncConfig};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn catch_up_leaves_a_contiguous_current_series(
        stored_len in 1i64..=300,
        hours_behind in 0i64..=72,
        limit in 1usize..=400,
    ) {
        tokio_test::block_on(async move {
            let rig = Rig::new();
            let last = at(10, 12) - TimeDelta::hours(hours_behind);
            let first = last - TimeDelta::hours(stored_len - 1);
            rig.store.insert(hourly("BTCUSDT", &hours(first, last))).await;

            let report = rig
                .coordinator(SyncConfig::default())
                .ensure_fresh(&sym("BTCUSDT"), Period::H1, limit)
                .await;

            assert!(report.error.is_none(), "{:?}", report.error);
            let series = &report.series;
            assert_eq!(series.last_open_time(), Some(at(10, 12)));
            assert!(series.len() >= limit, "len {} < limit {limit}", series.len());

            let head = series.first().unwrap().open_time;
            assert!(head <= first);
            assert_eq!(series.len(), hours(head, at(10, 12)).len());

            let saved = rig
                .store()
                .load(&sym("BTCUSDT"), Period::H1)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(&saved, series);
        });
    }
}
