use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use kline_core::{CandleSeries, CandleStore, KlineError, Period, SeriesKey, Symbol};
use tokio::sync::Mutex;

/// In-memory `CandleStore`.
///
/// Saves replace the whole entry under one lock, matching the atomic-replace
/// contract. Loads and saves can be forced to fail to exercise fallback paths.
#[derive(Default)]
pub struct MemoryStore {
    series: Mutex<HashMap<SeriesKey, CandleSeries>>,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a series without counting it as a save.
    pub async fn insert(&self, series: CandleSeries) {
        self.series.lock().await.insert(series.key(), series);
    }

    /// Peek at the stored series.
    pub async fn get(&self, symbol: &Symbol, period: Period) -> Option<CandleSeries> {
        let key = SeriesKey::new(symbol.clone(), period);
        self.series.lock().await.get(&key).cloned()
    }

    /// Make subsequent loads fail (or succeed again).
    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandleStore for MemoryStore {
    async fn load(
        &self,
        symbol: &Symbol,
        period: Period,
    ) -> Result<Option<CandleSeries>, KlineError> {
        let key = SeriesKey::new(symbol.clone(), period);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(KlineError::storage(key.to_string(), "forced load failure"));
        }
        Ok(self.series.lock().await.get(&key).cloned())
    }

    async fn save(&self, series: &CandleSeries) -> Result<(), KlineError> {
        let key = series.key();
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(KlineError::storage(key.to_string(), "forced save failure"));
        }
        self.series.lock().await.insert(key, series.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, symbol: &Symbol, period: Period) -> Result<bool, KlineError> {
        let key = SeriesKey::new(symbol.clone(), period);
        Ok(self.series.lock().await.remove(&key).is_some())
    }

    async fn list_symbols(&self, period: Period) -> Result<Vec<Symbol>, KlineError> {
        let guard = self.series.lock().await;
        let mut out: Vec<Symbol> = guard
            .keys()
            .filter(|k| k.period == period)
            .map(|k| k.symbol.clone())
            .collect();
        drop(guard);
        out.sort();
        Ok(out)
    }
}
