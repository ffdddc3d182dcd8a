//! Warm a few hourly series into a JSON store, then rank fresh 24h highs.
//!
//! Run with `RUST_LOG=kline=debug cargo run -p kline --example warm_cache --features tracing`.

use std::sync::Arc;

use chrono::TimeDelta;
use kline::{Clock, Direction, ExtremumTracker, Klines, Period, ProgressFn, Symbol, SystemClock};
use kline_mock::MockSource;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let root = std::env::temp_dir().join("kline-warm-cache");
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let klines = Klines::builder()
        .source(Arc::new(MockSource::new(Arc::clone(&clock))))
        .clock(Arc::clone(&clock))
        .storage_root(&root)
        .build()?;

    let symbols = ["BTCUSDT", "ETHUSDT", "SOLUSDT", "FAIL"]
        .into_iter()
        .map(Symbol::new)
        .collect::<Result<Vec<_>, _>>()?;

    let progress: &ProgressFn = &|p| {
        println!("[{}/{}] {} ok={}", p.completed, p.total, p.symbol, p.ok);
    };
    let report = klines
        .run_batch(&symbols, Period::H1, 200, 4, Some(progress))
        .await?;
    for (symbol, err) in &report.failures {
        println!("failed: {symbol}: {err}");
    }

    let tracker = ExtremumTracker::new(Direction::Max, TimeDelta::hours(24));
    for hit in tracker.rank(&report.series, clock.now()) {
        println!(
            "{} new 24h high {} (prev {}, {}%)",
            hit.symbol, hit.close, hit.previous, hit.change_pct
        );
    }

    println!("stored under {}: {:?}", root.display(), klines.stored_symbols(Period::H1).await?);
    Ok(())
}
