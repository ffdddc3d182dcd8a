//! kline keeps per-symbol candle series fresh without re-downloading history.
//!
//! Overview
//! - [`JsonFileStore`] persists one record per (symbol, period) and is the
//!   source of truth.
//! - [`SyncCoordinator`] loads a stored series, works out how much is missing,
//!   fetches only that from the upstream [`CandleSource`], merges, and persists.
//! - [`TtlCache`] fronts the coordinator with per-period TTLs and single-flight
//!   population per pair.
//! - [`BatchScheduler`] and [`RefreshHandle`] refresh many symbols with a
//!   concurrency ceiling, once or on an interval.
//! - [`ExtremumTracker`] ranks cached series by new N-period highs or lows.
//!
//! Key behaviors and trade-offs
//! - The newest bar of a series is always refetched; closed bars are only
//!   rewritten when the upstream corrects them.
//! - Readers get stale data rather than an error whenever anything is stored.
//! - Failed syncs are not cached, so the next read retries immediately.
//!
//! Example
//! ```rust,ignore
//! use std::sync::Arc;
//! use kline::{Klines, Period, Symbol};
//!
//! let klines = Klines::builder()
//!     .source(Arc::new(MyExchange::new()))
//!     .storage_root("data/klines")
//!     .build()?;
//!
//! let btc = Symbol::new("BTCUSDT")?;
//! let hourly = klines.get_candles(&btc, Period::H1, 200).await?;
//! ```
#![warn(missing_docs)]

mod batch;
mod cache;
pub(crate) mod core;
mod refresh;
mod store;
mod sync;
mod tracker;

pub use crate::batch::{BatchScheduler, ProgressFn};
pub use crate::cache::{CacheLookup, TtlCache};
pub use crate::core::{Klines, KlinesBuilder};
pub use crate::refresh::{RefreshHandle, RefreshPlan, spawn_refresh};
pub use crate::store::JsonFileStore;
pub use crate::sync::SyncCoordinator;
pub use crate::tracker::{Direction, ExtremumHit, ExtremumTracker};

pub use kline_middleware::{
    BlacklistMiddleware, BlacklistingSource, QuotaAwareSource, QuotaMiddleware, SourceBuilder,
};

// Re-export core types for convenience
pub use kline_core::{
    BatchConfig, BatchProgress, BatchReport, CacheConfig, Candle, CandleSeries, CandleSource,
    CandleStore, Clock, Decimal, EngineConfig, ErrorKind, FetchGap, FetchRequest, KlineError,
    Middleware, Period, QuotaConfig, QuotaConsumptionStrategy, SeriesKey, Symbol, SyncConfig,
    SyncReport, SyncStats, SystemClock,
};
