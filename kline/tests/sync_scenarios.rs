mod helpers;

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use helpers::{Rig, at, hours, hourly, now, sym};
use kline::{
    CandleStore, ErrorKind, Klines, KlineError, Period, SyncConfig, SyncCoordinator,
};
use kline_core::detect_gap;
use kline_mock::MockBehavior;

#[tokio::test]
async fn scenario_a_catches_up_from_five_hours_behind() {
    let rig = Rig::new();
    // 600 contiguous hourly bars, newest opened at 07:00 (5.5h before now)
    let stored = hourly("BTCUSDT", &hours(at(10, 7) - TimeDelta::hours(599), at(10, 7)));
    rig.store.insert(stored.clone()).await;

    let sync = rig.coordinator(SyncConfig::default());
    let report = sync.ensure_fresh(&sym("BTCUSDT"), Period::H1, 500).await;

    assert!(report.error.is_none(), "{:?}", report.error);
    let reqs = rig.ctrl.requests_for(&sym("BTCUSDT")).await;
    assert_eq!(reqs.len(), 1);
    assert!(reqs[0].limit >= 6, "requested {}", reqs[0].limit);
    assert!(reqs[0].from.is_none());

    let last = report.series.last_open_time().unwrap();
    assert!(now() - last < Period::H1.duration());
    assert_eq!(report.series.len(), 605);
    assert_eq!(report.stats.inserted, 5);
    assert!(report.stats.persisted);
    assert_eq!(rig.store.get(&sym("BTCUSDT"), Period::H1).await.unwrap(), report.series);
}

#[tokio::test]
async fn scenario_b_refills_a_three_day_gap() {
    let rig = Rig::new();
    let mut opens = hours(at(1, 0), at(3, 23));
    opens.extend(hours(at(7, 0), at(10, 12)));
    let stored = hourly("ETHUSDT", &opens);
    let gap = detect_gap(&stored).unwrap();
    assert_eq!(gap.missing_days(), 3);
    rig.store.insert(stored).await;

    let sync = rig.coordinator(SyncConfig::default());
    let report = sync.ensure_fresh(&sym("ETHUSDT"), Period::H1, 100).await;

    assert!(report.error.is_none());
    assert!(report.stats.gap_filled);
    let reqs = rig.ctrl.requests_for(&sym("ETHUSDT")).await;
    assert_eq!(reqs[0].from, Some(at(3, 23)));
    assert_eq!(reqs[0].to, Some(now()));
    assert!(detect_gap(&report.series).is_none());
    assert_eq!(report.series.len(), hours(at(1, 0), at(10, 12)).len());
}

#[tokio::test]
async fn scenario_c_network_failure_keeps_local_series() {
    let rig = Rig::new();
    let stored = hourly("SOLUSDT", &hours(at(9, 0), at(10, 9)));
    rig.store.insert(stored.clone()).await;
    rig.ctrl
        .set_behavior(
            sym("SOLUSDT"),
            MockBehavior::Fail(KlineError::network("dyn", "connection reset")),
        )
        .await;

    let sync = rig.coordinator(SyncConfig::default());
    let report = sync.ensure_fresh(&sym("SOLUSDT"), Period::H1, 10).await;

    assert_eq!(report.series, stored);
    assert!(matches!(report.error, Some(KlineError::Network { .. })));
    assert!(!report.stats.persisted);
    assert_eq!(rig.store.saves(), 0);
}

#[tokio::test(start_paused = true)]
async fn scenario_d_batch_respects_concurrency_ceiling() {
    let rig = Rig::new();
    rig.ctrl
        .set_default_behavior(MockBehavior::Delay(Duration::from_millis(10)))
        .await;
    let klines = Klines::builder()
        .source(Arc::clone(&rig.source))
        .store(rig.store())
        .clock(rig.clock())
        .build()
        .unwrap();

    let symbols: Vec<_> = (0..500).map(|i| sym(&format!("SYM{i}"))).collect();
    let report = klines
        .run_batch(&symbols, Period::M15, 50, 20, None)
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 500);
    assert!(report.failures.is_empty());
    assert_eq!(rig.ctrl.calls(), 500);
    let peak = rig.ctrl.max_in_flight();
    assert!(peak <= 20, "peak in-flight {peak}");
    assert!(peak > 1, "batch ran serially");
}

#[tokio::test]
async fn empty_store_fetches_the_default_window_or_limit() {
    let rig = Rig::new();
    let sync = rig.coordinator(SyncConfig::default());

    let small = sync.ensure_fresh(&sym("AAA"), Period::H1, 50).await;
    assert_eq!(rig.ctrl.requests_for(&sym("AAA")).await[0].limit, 500);
    assert_eq!(small.series.len(), 500);

    let large = sync.ensure_fresh(&sym("BBB"), Period::H1, 800).await;
    assert_eq!(rig.ctrl.requests_for(&sym("BBB")).await[0].limit, 800);
    assert_eq!(large.series.len(), 800);
    assert_eq!(large.stats.requests, 1);
}

#[tokio::test]
async fn steady_state_only_refreshes_the_open_bar() {
    let rig = Rig::new();
    rig.store
        .insert(hourly("BTCUSDT", &hours(at(1, 0), at(10, 12))))
        .await;
    rig.clock.advance(TimeDelta::minutes(5));

    let sync = rig.coordinator(SyncConfig::default());
    let report = sync.ensure_fresh(&sym("BTCUSDT"), Period::H1, 100).await;

    assert!(report.stats.steady_state);
    assert_eq!(report.stats.requests, 1);
    let reqs = rig.ctrl.requests_for(&sym("BTCUSDT")).await;
    assert_eq!(reqs[0].limit, SyncConfig::default().slack + 1);
    assert_eq!(report.stats.inserted, 0);
}

#[tokio::test]
async fn short_series_triggers_one_fallback_request() {
    let rig = Rig::new();
    rig.store
        .insert(hourly("BTCUSDT", &hours(at(10, 3), at(10, 12))))
        .await;

    let sync = rig.coordinator(SyncConfig::default());
    let report = sync.ensure_fresh(&sym("BTCUSDT"), Period::H1, 100).await;

    assert!(!report.stats.steady_state);
    assert_eq!(report.stats.requests, 2);
    let reqs = rig.ctrl.requests_for(&sym("BTCUSDT")).await;
    assert_eq!(reqs[1].limit, 100);
    assert_eq!(report.series.len(), 100);
}

#[tokio::test(start_paused = true)]
async fn hung_upstream_times_out_and_serves_stored_series() {
    let rig = Rig::new();
    let stored = hourly("BTCUSDT", &hours(at(10, 0), at(10, 12)));
    rig.store.insert(stored.clone()).await;
    rig.ctrl.set_default_behavior(MockBehavior::Hang).await;

    let sync = rig.coordinator(SyncConfig {
        upstream_timeout: Duration::from_secs(2),
        ..SyncConfig::default()
    });
    let report = sync.ensure_fresh(&sym("BTCUSDT"), Period::H1, 5).await;

    assert_eq!(report.series, stored);
    assert_eq!(
        report.error,
        Some(KlineError::UpstreamTimeout {
            provider: "dyn".into(),
            timeout_ms: 2_000
        })
    );
}

#[tokio::test]
async fn unreadable_record_resyncs_and_reports_the_load_error() {
    let rig = Rig::new();
    rig.store.set_fail_loads(true);

    let sync = rig.coordinator(SyncConfig::default());
    let report = sync.ensure_fresh(&sym("BTCUSDT"), Period::H1, 10).await;

    assert_eq!(report.series.len(), 500);
    assert_eq!(report.error.as_ref().map(KlineError::kind), Some(ErrorKind::Storage));
    assert!(report.stats.load_failed);
    assert!(report.stats.persisted);
}

#[tokio::test]
async fn unreadable_record_during_outage_is_still_flagged() {
    let rig = Rig::new();
    rig.store.set_fail_loads(true);
    rig.ctrl
        .set_default_behavior(MockBehavior::Fail(KlineError::network("dyn", "down")))
        .await;

    let sync = rig.coordinator(SyncConfig::default());
    let report = sync.ensure_fresh(&sym("BTCUSDT"), Period::H1, 10).await;

    assert!(report.series.is_empty());
    assert!(matches!(report.error, Some(KlineError::Network { .. })));
    assert!(report.stats.load_failed);
    assert_eq!(report.stats.requests, 1);
}

#[tokio::test]
async fn failed_save_is_reported_with_fresh_series() {
    let rig = Rig::new();
    rig.store.set_fail_saves(true);

    let sync = rig.coordinator(SyncConfig::default());
    let report = sync.ensure_fresh(&sym("BTCUSDT"), Period::H1, 10).await;

    assert_eq!(report.series.len(), 500);
    assert!(report.error.unwrap().is_storage());
    assert!(!report.stats.persisted);
    assert!(rig.store.get(&sym("BTCUSDT"), Period::H1).await.is_none());
}

#[tokio::test]
async fn retention_trims_to_max_candles() {
    let rig = Rig::new();
    let sync = rig.coordinator(SyncConfig {
        max_candles: Some(50),
        ..SyncConfig::default()
    });
    let report = sync.ensure_fresh(&sym("BTCUSDT"), Period::H1, 20).await;

    assert_eq!(report.series.len(), 50);
    assert_eq!(report.series.last_open_time(), Some(at(10, 12)));
    let saved = rig.store.load(&sym("BTCUSDT"), Period::H1).await.unwrap().unwrap();
    assert_eq!(saved.len(), 50);
}

#[tokio::test]
async fn insane_upstream_candles_are_dropped_and_counted() {
    let rig = Rig::new();
    let good = hourly("BTCUSDT", &[at(10, 11)]).into_candles().remove(0);
    let mut bad = hourly("BTCUSDT", &[at(10, 12)]).into_candles().remove(0);
    bad.low = bad.high + kline::Decimal::ONE;
    rig.ctrl
        .set_default_behavior(MockBehavior::Return(vec![good.clone(), bad]))
        .await;

    let sync: SyncCoordinator = rig.coordinator(SyncConfig::default());
    let report = sync.ensure_fresh(&sym("BTCUSDT"), Period::H1, 1).await;

    assert_eq!(report.stats.rejected, 1);
    assert_eq!(report.series.candles(), &[good]);
}
