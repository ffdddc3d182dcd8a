use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use kline_core::{
    CandleSource, FetchRequest, KlineError, Period, QuotaConfig, QuotaConsumptionStrategy, Symbol,
};
use kline_middleware::QuotaAwareSource;
use kline_mock::{ManualClock, MockSource};

fn make_wrapper(limit: u64, window_ms: u64, strategy: QuotaConsumptionStrategy) -> QuotaAwareSource {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ));
    let inner: Arc<dyn CandleSource> = Arc::new(MockSource::new(clock));
    QuotaAwareSource::new(
        inner,
        QuotaConfig {
            limit,
            window: Duration::from_millis(window_ms),
            strategy,
        },
    )
}

fn req() -> FetchRequest {
    FetchRequest::latest(Symbol::new("BTCUSDT").unwrap(), Period::M1, 2)
}

#[tokio::test(start_paused = true)]
async fn window_budget_is_enforced_and_resets() {
    let q = make_wrapper(2, 60_000, QuotaConsumptionStrategy::Unit);

    assert!(q.fetch_candles(&req()).await.is_ok());
    assert!(q.fetch_candles(&req()).await.is_ok());
    assert_eq!(q.remaining(), 0);

    let err = q.fetch_candles(&req()).await.unwrap_err();
    assert_eq!(
        err,
        KlineError::QuotaExceeded {
            remaining: 0,
            reset_in_ms: 60_000
        }
    );

    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(q.remaining(), 2);
    assert!(q.fetch_candles(&req()).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn even_spread_blocks_within_a_slice() {
    // 2400ms window -> 100ms slices with one call each
    let q = make_wrapper(24, 2_400, QuotaConsumptionStrategy::EvenSpreadHourly);

    assert!(q.should_allow_call().is_ok());
    match q.should_allow_call() {
        Err(KlineError::QuotaExceeded {
            remaining,
            reset_in_ms,
        }) => {
            assert_eq!(remaining, 23);
            assert_eq!(reset_in_ms, 100);
        }
        other => panic!("expected slice block, got {other:?}"),
    }

    tokio::time::advance(Duration::from_millis(100)).await;
    assert!(q.should_allow_call().is_ok());
}

#[tokio::test(start_paused = true)]
async fn window_stays_aligned_after_idle_gaps() {
    let q = make_wrapper(1, 1_000, QuotaConsumptionStrategy::Unit);
    assert!(q.should_allow_call().is_ok());

    // Idle for 2.5 windows: the current window started 500ms ago.
    tokio::time::advance(Duration::from_millis(2_500)).await;
    assert!(q.should_allow_call().is_ok());
    match q.should_allow_call() {
        Err(KlineError::QuotaExceeded { reset_in_ms, .. }) => assert_eq!(reset_in_ms, 500),
        other => panic!("expected window block, got {other:?}"),
    }
}
