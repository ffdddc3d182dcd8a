use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use kline_core::{Candle, CandleSource, FetchRequest, KlineError, Middleware};
use tokio::time::Instant;

/// Middleware that benches its inner source for a while after it reports
/// rate limiting or quota exhaustion.
///
/// While benched, calls fail fast with `KlineError::TemporarilyBlacklisted`
/// instead of hitting the upstream again.
pub struct BlacklistingSource {
    inner: Arc<dyn CandleSource>,
    state: Mutex<Option<Instant>>, // blacklist-until; None means active
    default_duration: Duration,
}

impl BlacklistingSource {
    /// Wrap `inner`, benching it for `default_duration` when an error has no reset hint.
    pub fn new(inner: Arc<dyn CandleSource>, default_duration: Duration) -> Self {
        Self {
            inner,
            state: Mutex::new(None),
            default_duration,
        }
    }

    /// Remaining blacklist time, or `None` when the source is active.
    pub fn blacklisted_for(&self) -> Option<Duration> {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        match *guard {
            Some(until) if now < until => Some(until - now),
            Some(_) => {
                *guard = None;
                None
            }
            None => None,
        }
    }

    fn blacklist_for(&self, duration: Duration) {
        let until = Instant::now() + duration;
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        // Never shorten an existing, longer penalty.
        if guard.is_none_or(|cur| cur < until) {
            *guard = Some(until);
        }
    }

    fn handle_error(&self, err: KlineError) -> KlineError {
        let duration = match &err {
            KlineError::QuotaExceeded {
                remaining,
                reset_in_ms,
            } => {
                if *remaining == 0 && *reset_in_ms == 0 {
                    Some(self.default_duration)
                } else {
                    // slice exhaustion still backs off until the slice boundary
                    Some(Duration::from_millis((*reset_in_ms).max(1)))
                }
            }
            KlineError::RateLimited { retry_after_ms, .. } => Some(
                retry_after_ms
                    .map(Duration::from_millis)
                    .unwrap_or(self.default_duration),
            ),
            _ => None,
        };
        if let Some(d) = duration {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                source = self.inner.name(),
                backoff_ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX),
                "source blacklisted"
            );
            self.blacklist_for(d);
        }
        err
    }
}

#[async_trait]
impl CandleSource for BlacklistingSource {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch_candles(&self, req: &FetchRequest) -> Result<Vec<Candle>, KlineError> {
        if let Some(left) = self.blacklisted_for() {
            return Err(KlineError::TemporarilyBlacklisted {
                reset_in_ms: u64::try_from(left.as_millis()).unwrap_or(u64::MAX),
            });
        }
        self.inner
            .fetch_candles(req)
            .await
            .map_err(|e| self.handle_error(e))
    }
}

/// Middleware config for constructing a [`BlacklistingSource`].
pub struct BlacklistMiddleware {
    /// Penalty used when an error carries no reset hint.
    pub default_duration: Duration,
}

impl BlacklistMiddleware {
    /// Describe a blacklist layer benching the source for `default_duration` by default.
    #[must_use]
    pub const fn new(default_duration: Duration) -> Self {
        Self { default_duration }
    }
}

impl Middleware for BlacklistMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn CandleSource>) -> Arc<dyn CandleSource> {
        Arc::new(BlacklistingSource::new(inner, self.default_duration))
    }

    fn name(&self) -> &'static str {
        "BlacklistingSource"
    }

    fn config_json(&self) -> serde_json::Value {
        serde_json::json!({
            "default_duration_ms": u64::try_from(self.default_duration.as_millis()).unwrap_or(u64::MAX),
        })
    }
}
