//! Quota-aware source wrapper.
//!
//! Every upstream call consumes one unit from a fixed window budget. With
//! [`QuotaConsumptionStrategy::EvenSpreadHourly`] the window is additionally cut
//! into 24 slices so a burst cannot drain the whole budget at once.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use kline_core::{Candle, CandleSource, FetchRequest, KlineError, Middleware};
use kline_types::{QuotaConfig, QuotaConsumptionStrategy};
use tokio::time::Instant;

const SLICES_PER_WINDOW: u64 = 24;

/// Wrapper that enforces a request budget in front of an inner source.
pub struct QuotaAwareSource {
    inner: Arc<dyn CandleSource>,
    config: QuotaConfig,
    runtime: Mutex<QuotaRuntime>,
}

struct QuotaRuntime {
    calls_made_in_window: u64,
    window_start: Instant,

    allowed_per_slice: u64,
    slice_duration: Duration,
    calls_made_in_slice: u64,
    slice_start: Instant,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Advance `start` to the beginning of the span containing `now`.
///
/// Returns `true` when at least one full span elapsed.
fn align(start: &mut Instant, span: Duration, now: Instant) -> bool {
    let elapsed = now.duration_since(*start);
    if span.is_zero() || elapsed < span {
        return false;
    }
    let passed = elapsed.as_nanos() / span.as_nanos();
    let offset = u64::try_from(passed * span.as_nanos()).unwrap_or(u64::MAX);
    *start += Duration::from_nanos(offset);
    true
}

impl QuotaAwareSource {
    /// Create a new quota-aware wrapper around an existing source.
    pub fn new(inner: Arc<dyn CandleSource>, config: QuotaConfig) -> Self {
        let (allowed_per_slice, slice_duration) = match config.strategy {
            QuotaConsumptionStrategy::EvenSpreadHourly => {
                let per_slice = std::cmp::max(1, config.limit / SLICES_PER_WINDOW);
                let slice_ms = std::cmp::max(1, millis(config.window) / SLICES_PER_WINDOW);
                (per_slice, Duration::from_millis(slice_ms))
            }
            _ => (0, Duration::ZERO),
        };
        let now = Instant::now();
        Self {
            inner,
            config,
            runtime: Mutex::new(QuotaRuntime {
                calls_made_in_window: 0,
                window_start: now,
                allowed_per_slice,
                slice_duration,
                calls_made_in_slice: 0,
                slice_start: now,
            }),
        }
    }

    /// Access the inner source.
    pub fn inner(&self) -> &Arc<dyn CandleSource> {
        &self.inner
    }

    /// Units still available in the current window.
    pub fn remaining(&self) -> u64 {
        let mut rt = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        if align(&mut rt.window_start, self.config.window, Instant::now()) {
            rt.calls_made_in_window = 0;
        }
        self.config.limit.saturating_sub(rt.calls_made_in_window)
    }

    /// Consume one unit if the budget allows it.
    ///
    /// # Errors
    /// Returns `KlineError::QuotaExceeded` when the slice (for `EvenSpreadHourly`)
    /// or the window budget is exhausted. A slice block reports `remaining > 0`
    /// and a `reset_in_ms` pointing at the next slice boundary.
    pub fn should_allow_call(&self) -> Result<(), KlineError> {
        let mut rt = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let limit = self.config.limit;
        let spread = matches!(
            self.config.strategy,
            QuotaConsumptionStrategy::EvenSpreadHourly
        );

        if align(&mut rt.window_start, self.config.window, now) {
            rt.calls_made_in_window = 0;
        }

        if spread {
            let span = rt.slice_duration;
            if align(&mut rt.slice_start, span, now) {
                rt.calls_made_in_slice = 0;
            }
            if rt.calls_made_in_slice >= rt.allowed_per_slice && rt.calls_made_in_window < limit {
                let into_slice = now.duration_since(rt.slice_start);
                return Err(KlineError::QuotaExceeded {
                    remaining: limit.saturating_sub(rt.calls_made_in_window),
                    reset_in_ms: millis(rt.slice_duration.saturating_sub(into_slice)),
                });
            }
        }

        if rt.calls_made_in_window < limit {
            rt.calls_made_in_window += 1;
            if spread {
                rt.calls_made_in_slice += 1;
            }
            return Ok(());
        }

        let into_window = now.duration_since(rt.window_start);
        let err = KlineError::QuotaExceeded {
            remaining: 0,
            reset_in_ms: millis(self.config.window.saturating_sub(into_window)),
        };
        drop(rt);
        Err(err)
    }
}

#[async_trait]
impl CandleSource for QuotaAwareSource {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch_candles(&self, req: &FetchRequest) -> Result<Vec<Candle>, KlineError> {
        if let Err(e) = self.should_allow_call() {
            #[cfg(feature = "tracing")]
            tracing::debug!(source = self.inner.name(), symbol = %req.symbol, error = %e, "quota blocked call");
            return Err(e);
        }
        self.inner.fetch_candles(req).await
    }
}

/// Middleware config for constructing a [`QuotaAwareSource`].
pub struct QuotaMiddleware {
    /// Budget applied by the wrapper.
    pub config: QuotaConfig,
}

impl QuotaMiddleware {
    /// Describe a quota layer with `config`.
    #[must_use]
    pub const fn new(config: QuotaConfig) -> Self {
        Self { config }
    }
}

impl Middleware for QuotaMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn CandleSource>) -> Arc<dyn CandleSource> {
        Arc::new(QuotaAwareSource::new(inner, self.config))
    }

    fn name(&self) -> &'static str {
        "QuotaAwareSource"
    }

    fn config_json(&self) -> serde_json::Value {
        let strategy = match self.config.strategy {
            QuotaConsumptionStrategy::EvenSpreadHourly => "EvenSpreadHourly",
            _ => "Unit",
        };
        serde_json::json!({
            "limit": self.config.limit,
            "window_ms": millis(self.config.window),
            "strategy": strategy,
        })
    }
}
