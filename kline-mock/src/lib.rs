//! Test doubles for the kline workspace.
//!
//! - [`MockSource`]: deterministic synthetic candles with a few magic symbols
//!   that fail in specific ways.
//! - [`DynamicMockSource`]: per-symbol scripted behavior, call counting, and
//!   in-flight tracking, driven through a [`DynamicMockController`].
//! - [`MemoryStore`]: in-memory `CandleStore` with injectable failures.
//! - [`ManualClock`]: a clock that only moves when told to.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kline_core::{CandleSource, Candle, Clock, FetchRequest, KlineError};

mod clock;
mod dynamic;
pub mod fixtures;
mod store;

pub use clock::ManualClock;
pub use dynamic::{DynamicMockController, DynamicMockSource, MockBehavior};
pub use store::MemoryStore;

/// Mock source for CI-safe tests and demos. Generates candles from the clock.
///
/// Magic symbols:
/// - `FAIL`: network error
/// - `RATELIMIT`: rate-limited error
/// - `INVALID`: invalid-symbol error
/// - `TIMEOUT`: sleeps far longer than any sane upstream timeout
pub struct MockSource {
    clock: Arc<dyn Clock>,
}

impl MockSource {
    /// Create a mock that answers as of `clock.now()`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    async fn maybe_fail_or_timeout(symbol: &str) -> Result<(), KlineError> {
        match symbol {
            "FAIL" => Err(KlineError::network("kline-mock", "forced failure")),
            "RATELIMIT" => Err(KlineError::RateLimited {
                provider: "kline-mock".into(),
                retry_after_ms: Some(1_000),
            }),
            "INVALID" => Err(KlineError::invalid_symbol(symbol)),
            "TIMEOUT" => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CandleSource for MockSource {
    fn name(&self) -> &'static str {
        "kline-mock"
    }

    async fn fetch_candles(&self, req: &FetchRequest) -> Result<Vec<Candle>, KlineError> {
        Self::maybe_fail_or_timeout(req.symbol.as_str()).await?;
        Ok(fixtures::synthesize(req, self.clock.now()))
    }
}
