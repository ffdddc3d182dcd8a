#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use kline::{CandleSeries, CandleSource, CandleStore, Clock, Period, Symbol, SyncConfig, SyncCoordinator};
use kline_mock::fixtures::synthetic_candle;
use kline_mock::{DynamicMockController, DynamicMockSource, ManualClock, MemoryStore};

/// 2024-06-10T12:30:00Z; the open hourly bar started at 12:00.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 10, 12, 30, 0).unwrap()
}

pub fn at(d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, d, h, 0, 0).unwrap()
}

pub fn sym(s: &str) -> Symbol {
    Symbol::new(s).unwrap()
}

/// Inclusive hourly open times from `first` to `last`.
pub fn hours(first: DateTime<Utc>, last: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut out = Vec::new();
    let mut t = first;
    while t <= last {
        out.push(t);
        t += TimeDelta::hours(1);
    }
    out
}

/// Hourly series with the same values the mock source would return at `now()`.
pub fn hourly(symbol: &str, opens: &[DateTime<Utc>]) -> CandleSeries {
    let now_s = now().timestamp();
    let candles = opens
        .iter()
        .map(|t| synthetic_candle(symbol, Period::H1.seconds(), t.timestamp(), now_s))
        .collect();
    CandleSeries::new(sym(symbol), Period::H1, candles)
}

pub struct Rig {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub source: Arc<dyn CandleSource>,
    pub ctrl: DynamicMockController,
}

impl Rig {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(now()));
        let (source, ctrl) = DynamicMockSource::new_with_controller("dyn", clock.clone());
        Self {
            clock,
            store: Arc::new(MemoryStore::new()),
            source,
            ctrl,
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn store(&self) -> Arc<dyn CandleStore> {
        self.store.clone()
    }

    pub fn coordinator(&self, cfg: SyncConfig) -> SyncCoordinator {
        SyncCoordinator::new(Arc::clone(&self.source), self.store(), self.clock(), cfg)
    }
}

/// Fresh, empty directory removed when the guard drops.
pub fn temp_root() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}
