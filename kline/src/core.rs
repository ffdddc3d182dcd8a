use std::sync::Arc;
use std::time::Duration;

use kline_core::{
    BatchConfig, BatchReport, CacheConfig, CandleSeries, CandleSource, CandleStore, Clock,
    EngineConfig, KlineError, Period, QuotaConfig, Symbol, SyncConfig, SyncReport, SystemClock,
};
use kline_middleware::SourceBuilder;

use crate::batch::{BatchScheduler, ProgressFn};
use crate::cache::{CacheLookup, TtlCache};
use crate::refresh::{RefreshHandle, RefreshPlan, spawn_refresh};
use crate::store::JsonFileStore;
use crate::sync::SyncCoordinator;

/// Candle engine: durable store, incremental sync, and TTL read cache behind
/// one handle.
pub struct Klines {
    store: Arc<dyn CandleStore>,
    cache: Arc<TtlCache>,
    batch: Arc<BatchScheduler>,
    cfg: EngineConfig,
}

/// Builder for constructing a [`Klines`] engine.
pub struct KlinesBuilder {
    source: Option<Arc<dyn CandleSource>>,
    store: Option<Arc<dyn CandleStore>>,
    clock: Option<Arc<dyn Clock>>,
    cfg: EngineConfig,
    quota: Option<QuotaConfig>,
    blacklist: Option<Duration>,
}

impl Default for KlinesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KlinesBuilder {
    /// Create a builder with default configuration.
    ///
    /// A source is mandatory. Without an explicit store, records are kept as
    /// JSON files under `EngineConfig::storage_root`; without a clock, the
    /// system clock is used.
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: None,
            store: None,
            clock: None,
            cfg: EngineConfig::default(),
            quota: None,
            blacklist: None,
        }
    }

    /// Upstream candle source.
    #[must_use]
    pub fn source(mut self, source: Arc<dyn CandleSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Persistence backend; replaces the default JSON file store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn CandleStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Clock for freshness and TTL decisions.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, cfg: EngineConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Root directory for the default JSON file store.
    #[must_use]
    pub fn storage_root(mut self, root: impl Into<std::path::PathBuf>) -> Self {
        self.cfg.storage_root = root.into();
        self
    }

    /// Cache TTL settings.
    #[must_use]
    pub fn cache_config(mut self, cfg: CacheConfig) -> Self {
        self.cfg.cache = cfg;
        self
    }

    /// Override the TTL for one period. A zero TTL disables caching for it.
    #[must_use]
    pub fn ttl(mut self, period: Period, ttl: Duration) -> Self {
        self.cfg.cache = self.cfg.cache.with_ttl(period, ttl);
        self
    }

    /// Sync sizing and timeout settings.
    #[must_use]
    pub fn sync_config(mut self, cfg: SyncConfig) -> Self {
        self.cfg.sync = cfg;
        self
    }

    /// Per-call upstream timeout.
    #[must_use]
    pub const fn upstream_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.sync.upstream_timeout = timeout;
        self
    }

    /// Keep at most this many candles per stored series.
    #[must_use]
    pub const fn max_candles(mut self, max: usize) -> Self {
        self.cfg.sync.max_candles = Some(max);
        self
    }

    /// Batch concurrency settings used by refresh tasks.
    #[must_use]
    pub const fn batch_config(mut self, cfg: BatchConfig) -> Self {
        self.cfg.batch = cfg;
        self
    }

    /// Put a request budget in front of the source.
    #[must_use]
    pub fn quota(mut self, cfg: QuotaConfig) -> Self {
        self.quota = Some(cfg);
        self
    }

    /// Bench the source after rate-limit or quota errors, for `duration` when
    /// the error carries no reset hint.
    #[must_use]
    pub const fn blacklist(mut self, duration: Duration) -> Self {
        self.blacklist = Some(duration);
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    /// Returns `InvalidArg` when no source was provided or the configuration is
    /// unusable (zero slack, zero timeout, zero batch concurrency).
    pub fn build(self) -> Result<Klines, KlineError> {
        let raw = self.source.ok_or_else(|| {
            KlineError::InvalidArg("no source configured; call source(...)".into())
        })?;
        if self.cfg.sync.slack == 0 {
            return Err(KlineError::InvalidArg("sync slack must be at least 1".into()));
        }
        if self.cfg.sync.upstream_timeout.is_zero() {
            return Err(KlineError::InvalidArg(
                "upstream timeout must be non-zero".into(),
            ));
        }
        if self.cfg.batch.max_concurrency == 0 {
            return Err(KlineError::InvalidArg(
                "batch max_concurrency must be at least 1".into(),
            ));
        }

        let mut layered = SourceBuilder::new(raw);
        if let Some(q) = &self.quota {
            layered = layered.with_quota(q);
        }
        if let Some(d) = self.blacklist {
            layered = layered.with_blacklist(d);
        }
        let source = layered.build();

        let clock: Arc<dyn Clock> = match self.clock {
            Some(c) => c,
            None => Arc::new(SystemClock),
        };
        let store: Arc<dyn CandleStore> = match self.store {
            Some(s) => s,
            None => Arc::new(
                JsonFileStore::new(self.cfg.storage_root.clone()).with_clock(Arc::clone(&clock)),
            ),
        };

        let sync = Arc::new(SyncCoordinator::new(
            source,
            Arc::clone(&store),
            clock,
            self.cfg.sync.clone(),
        ));
        let cache = Arc::new(TtlCache::new(sync, self.cfg.cache.clone()));
        let batch = Arc::new(BatchScheduler::new(Arc::clone(&cache)));

        Ok(Klines {
            store,
            cache,
            batch,
            cfg: self.cfg,
        })
    }
}

impl Klines {
    /// Start building an engine.
    #[must_use]
    pub fn builder() -> KlinesBuilder {
        KlinesBuilder::new()
    }

    /// Effective configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// The read cache.
    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    /// Newest `limit` candles for the pair.
    ///
    /// Stale data is returned as `Ok` when the upstream is unavailable; the
    /// call only fails when nothing is stored locally.
    ///
    /// # Errors
    /// `InvalidArg` for a zero `limit`; otherwise the sync error (or
    /// `NotFound` when the upstream had no candles) if no local data exists.
    pub async fn get_candles(
        &self,
        symbol: &Symbol,
        period: Period,
        limit: usize,
    ) -> Result<CandleSeries, KlineError> {
        if limit == 0 {
            return Err(KlineError::InvalidArg("limit must be at least 1".into()));
        }
        let lookup = self.cache.get_or_sync(symbol, period, limit).await;
        if lookup.series.is_empty() {
            return Err(lookup
                .error
                .unwrap_or_else(|| KlineError::not_found(format!("candles for {symbol}/{period}"))));
        }
        Ok(lookup.series.tail(limit))
    }

    /// Cached series for the pair with freshness metadata.
    pub async fn get_or_sync(&self, symbol: &Symbol, period: Period, limit: usize) -> CacheLookup {
        self.cache.get_or_sync(symbol, period, limit).await
    }

    /// Sync the pair now, ignoring any live cache entry.
    ///
    /// A successful result replaces the cache entry. If a sync for the pair is
    /// already running, its outcome is returned instead of starting another.
    pub async fn ensure_fresh(&self, symbol: &Symbol, period: Period, limit: usize) -> SyncReport {
        self.cache.refresh(symbol, period, limit).await
    }

    /// Drop the cache entry for one pair.
    pub async fn invalidate(&self, symbol: &Symbol, period: Period) -> bool {
        self.cache.invalidate(symbol, period).await
    }

    /// Drop every cache entry. Stored series are untouched.
    pub async fn clear(&self) {
        self.cache.clear().await;
    }

    /// Refresh many symbols with bounded concurrency.
    ///
    /// # Errors
    /// Returns `InvalidArg` if `max_concurrency` is zero. Per-symbol failures
    /// are reported inside the [`BatchReport`].
    pub async fn run_batch(
        &self,
        symbols: &[Symbol],
        period: Period,
        limit: usize,
        max_concurrency: usize,
        progress: Option<&ProgressFn>,
    ) -> Result<BatchReport, KlineError> {
        self.batch
            .run(symbols, period, limit, max_concurrency, progress)
            .await
    }

    /// Keep `symbols` warm by running a batch every `every`.
    ///
    /// Uses `BatchConfig::max_concurrency`. Must be called within a Tokio runtime.
    ///
    /// # Errors
    /// Returns `InvalidArg` for a zero interval.
    pub fn spawn_refresh(
        &self,
        symbols: Vec<Symbol>,
        period: Period,
        limit: usize,
        every: Duration,
    ) -> Result<RefreshHandle, KlineError> {
        spawn_refresh(
            Arc::clone(&self.batch),
            RefreshPlan {
                symbols,
                period,
                limit,
                every,
                max_concurrency: self.cfg.batch.max_concurrency,
            },
        )
    }

    /// Symbols with a stored series for `period`.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn stored_symbols(&self, period: Period) -> Result<Vec<Symbol>, KlineError> {
        self.store.list_symbols(period).await
    }
}
