use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use kline_core::{Candle, CandleSource, Clock, FetchRequest, KlineError, Symbol};

use crate::fixtures;

/// Instruction for how `fetch_candles` should behave for a given symbol.
#[derive(Clone)]
pub enum MockBehavior {
    /// Answer with synthetic candles generated from the clock.
    Generate,
    /// Sleep for the given duration, then behave like `Generate`.
    Delay(Duration),
    /// Return the provided candles verbatim.
    Return(Vec<Candle>),
    /// Fail immediately with the provided error.
    Fail(KlineError),
    /// Sleep for the given duration, then fail with the provided error.
    DelayFail(Duration, KlineError),
    /// Hang indefinitely (simulate a stalled connection).
    Hang,
}

#[derive(Default)]
struct InternalState {
    rules: HashMap<Symbol, MockBehavior>,
    default_rule: Option<MockBehavior>,
    requests: Vec<FetchRequest>,
}

#[derive(Default)]
struct Counters {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Decrements the in-flight counter even when the call future is dropped.
struct InFlightGuard<'a>(&'a Counters);

impl<'a> InFlightGuard<'a> {
    fn enter(c: &'a Counters) -> Self {
        c.calls.fetch_add(1, Ordering::SeqCst);
        let now = c.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        c.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(c)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Controller handle used by tests to drive the dynamic mock from the outside.
pub struct DynamicMockController {
    state: Arc<Mutex<InternalState>>,
    counters: Arc<Counters>,
}

impl DynamicMockController {
    /// Set the behavior for a specific symbol.
    pub async fn set_behavior(&self, symbol: Symbol, behavior: MockBehavior) {
        let mut guard = self.state.lock().await;
        guard.rules.insert(symbol, behavior);
    }

    /// Set the behavior for symbols without a specific rule.
    pub async fn set_default_behavior(&self, behavior: MockBehavior) {
        let mut guard = self.state.lock().await;
        guard.default_rule = Some(behavior);
    }

    /// Return a copy of the request log.
    pub async fn requests(&self) -> Vec<FetchRequest> {
        self.state.lock().await.requests.clone()
    }

    /// Requests issued for one symbol, in call order.
    pub async fn requests_for(&self, symbol: &Symbol) -> Vec<FetchRequest> {
        let guard = self.state.lock().await;
        guard
            .requests
            .iter()
            .filter(|r| &r.symbol == symbol)
            .cloned()
            .collect()
    }

    /// Total number of `fetch_candles` calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously running calls observed.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    /// Clear all configured behaviors, logs, and counters.
    pub async fn reset(&self) {
        let mut guard = self.state.lock().await;
        guard.rules.clear();
        guard.default_rule = None;
        guard.requests.clear();
        drop(guard);
        self.counters.calls.store(0, Ordering::SeqCst);
        self.counters.max_in_flight.store(0, Ordering::SeqCst);
    }
}

/// A source that defers all behavior to an external controller.
///
/// Symbols without a rule fall back to the default rule, or `Generate` if none is set.
pub struct DynamicMockSource {
    name: &'static str,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<InternalState>>,
    counters: Arc<Counters>,
}

impl DynamicMockSource {
    /// Create a new dynamic mock source and its controller.
    #[must_use]
    pub fn new_with_controller(
        name: &'static str,
        clock: Arc<dyn Clock>,
    ) -> (Arc<dyn CandleSource>, DynamicMockController) {
        let state = Arc::new(Mutex::new(InternalState::default()));
        let counters = Arc::new(Counters::default());
        let controller = DynamicMockController {
            state: Arc::clone(&state),
            counters: Arc::clone(&counters),
        };
        let me = Arc::new(Self {
            name,
            clock,
            state,
            counters,
        });
        (me as Arc<dyn CandleSource>, controller)
    }
}

#[async_trait]
impl CandleSource for DynamicMockSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_candles(&self, req: &FetchRequest) -> Result<Vec<Candle>, KlineError> {
        let _guard = InFlightGuard::enter(&self.counters);
        // Acquire behavior snapshot without holding the lock across await points
        let behavior = {
            let mut guard = self.state.lock().await;
            guard.requests.push(req.clone());
            guard
                .rules
                .get(&req.symbol)
                .or(guard.default_rule.as_ref())
                .cloned()
                .unwrap_or(MockBehavior::Generate)
        };

        match behavior {
            MockBehavior::Generate => Ok(fixtures::synthesize(req, self.clock.now())),
            MockBehavior::Delay(d) => {
                tokio::time::sleep(d).await;
                Ok(fixtures::synthesize(req, self.clock.now()))
            }
            MockBehavior::Return(candles) => Ok(candles),
            MockBehavior::Fail(e) => Err(e),
            MockBehavior::DelayFail(d, e) => {
                tokio::time::sleep(d).await;
                Err(e)
            }
            MockBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}
