//! Time-bounded read cache in front of the sync coordinator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use kline_core::{
    CacheConfig, CandleSeries, Clock, KlineError, Period, SeriesKey, Symbol, SyncReport, SyncStats,
};
use moka::Expiry;
use moka::future::Cache;
use moka::ops::compute::Op;

use crate::sync::SyncCoordinator;

/// Result of a cache read.
#[derive(Debug, Clone)]
pub struct CacheLookup {
    /// Best available series; possibly stale when `error` is set.
    pub series: Arc<CandleSeries>,
    /// Failure encountered while syncing, if any.
    pub error: Option<KlineError>,
    /// Whether the series was served without this caller running a sync.
    pub hit: bool,
}

impl CacheLookup {
    fn hit(entry: &CacheEntry) -> Self {
        Self {
            series: Arc::clone(&entry.series),
            error: None,
            hit: true,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    series: Arc<CandleSeries>,
    stats: SyncStats,
    cached_at: DateTime<Utc>,
    synced_limit: usize,
}

impl CacheEntry {
    fn covers(&self, limit: usize) -> bool {
        self.synced_limit >= limit || self.series.len() >= limit
    }
}

/// A sync that ended with an error. Shared with every caller that waited on it.
#[derive(Debug)]
struct SyncFailure {
    series: Arc<CandleSeries>,
    error: KlineError,
    stats: SyncStats,
}

impl SyncFailure {
    fn lookup(&self) -> CacheLookup {
        CacheLookup {
            series: Arc::clone(&self.series),
            error: Some(self.error.clone()),
            hit: false,
        }
    }
}

/// Evicts entries once their period's TTL has elapsed in wall-clock time.
///
/// Freshness seen by readers is still judged against the injected [`Clock`];
/// this only bounds how long memory is held.
struct PeriodTtl(CacheConfig);

impl Expiry<SeriesKey, Arc<CacheEntry>> for PeriodTtl {
    fn expire_after_create(
        &self,
        key: &SeriesKey,
        _value: &Arc<CacheEntry>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.0.ttl_for(key.period).unwrap_or(Duration::ZERO))
    }

    fn expire_after_update(
        &self,
        key: &SeriesKey,
        _value: &Arc<CacheEntry>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.0.ttl_for(key.period).unwrap_or(Duration::ZERO))
    }
}

/// Per-(symbol, period) TTL cache with single-flight population.
///
/// Concurrent callers for the same key share one [`SyncCoordinator::ensure_fresh`]
/// run and its outcome, failure included. Different keys never contend.
/// Failed syncs are not stored, so the next caller after a failure retries.
pub struct TtlCache {
    sync: Arc<SyncCoordinator>,
    clock: Arc<dyn Clock>,
    cfg: CacheConfig,
    entries: Cache<SeriesKey, Arc<CacheEntry>>,
}

impl TtlCache {
    /// Create a cache over `sync`, stamping entries with the coordinator's clock.
    pub fn new(sync: Arc<SyncCoordinator>, cfg: CacheConfig) -> Self {
        let clock = Arc::clone(sync.clock());
        let entries = Cache::builder()
            .name("kline-series")
            .expire_after(PeriodTtl(cfg.clone()))
            .build();
        Self {
            sync,
            clock,
            cfg,
            entries,
        }
    }

    /// Coordinator used to populate entries.
    pub fn sync(&self) -> &Arc<SyncCoordinator> {
        &self.sync
    }

    fn serves(&self, entry: &CacheEntry, period: Period, limit: usize) -> bool {
        let Some(ttl) = self.cfg.ttl_for(period) else {
            return false;
        };
        let age = (self.clock.now() - entry.cached_at)
            .to_std()
            .unwrap_or_default();
        age < ttl && entry.covers(limit)
    }

    /// Remove `stale` only if it is still the entry stored under `key`.
    async fn evict_if_same(&self, key: &SeriesKey, stale: &Arc<CacheEntry>) {
        let stale = Arc::clone(stale);
        let _ = self
            .entries
            .entry(key.clone())
            .and_compute_with(|current| {
                let op = match current {
                    Some(e) if Arc::ptr_eq(e.value(), &stale) => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
    }

    /// Sync `key` for `limit`, or join the sync already in flight for it.
    ///
    /// The flag is true when this call ran the sync itself.
    async fn populate(
        &self,
        key: &SeriesKey,
        limit: usize,
    ) -> Result<(Arc<CacheEntry>, bool), Arc<SyncFailure>> {
        let init = async {
            let report = self.sync.ensure_fresh(&key.symbol, key.period, limit).await;
            let series = Arc::new(report.series);
            match report.error {
                None => Ok(Arc::new(CacheEntry {
                    series,
                    stats: report.stats,
                    cached_at: self.clock.now(),
                    synced_limit: limit,
                })),
                Some(error) => Err(SyncFailure {
                    series,
                    error,
                    stats: report.stats,
                }),
            }
        };
        let entry = self.entries.entry(key.clone()).or_try_insert_with(init).await?;
        let ran = entry.is_fresh();
        let value = entry.into_value();
        if ran && self.cfg.ttl_for(key.period).is_none() {
            self.entries.invalidate(key).await;
        }
        Ok((value, ran))
    }

    /// Return the cached series for the pair, syncing it first when the entry
    /// is missing, expired, or was populated for a smaller `limit`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "kline::cache::get_or_sync",
            skip(self),
            fields(symbol = %symbol, period = %period, limit = limit),
        )
    )]
    pub async fn get_or_sync(&self, symbol: &Symbol, period: Period, limit: usize) -> CacheLookup {
        let key = SeriesKey::new(symbol.clone(), period);
        loop {
            if let Some(current) = self.entries.get(&key).await {
                if self.serves(&current, period, limit) {
                    return CacheLookup::hit(&current);
                }
                self.evict_if_same(&key, &current).await;
            }
            match self.populate(&key, limit).await {
                Ok((entry, true)) => {
                    return CacheLookup {
                        series: Arc::clone(&entry.series),
                        error: None,
                        hit: false,
                    };
                }
                Ok((entry, false)) if entry.covers(limit) => return CacheLookup::hit(&entry),
                // Joined a sync for a smaller limit.
                Ok(_) => {}
                Err(failure) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        error = %failure.error,
                        len = failure.series.len(),
                        "serving series with sync error"
                    );
                    return failure.lookup();
                }
            }
        }
    }

    /// Sync the pair now even when a live entry exists, and store the result.
    ///
    /// Uses the same per-pair slot as [`TtlCache::get_or_sync`]: when a sync
    /// for the pair is already running, its outcome is returned instead of
    /// starting a second one.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "kline::cache::refresh",
            skip(self),
            fields(symbol = %symbol, period = %period, limit = limit),
        )
    )]
    pub async fn refresh(&self, symbol: &Symbol, period: Period, limit: usize) -> SyncReport {
        let key = SeriesKey::new(symbol.clone(), period);
        loop {
            if let Some(current) = self.entries.get(&key).await {
                self.evict_if_same(&key, &current).await;
            }
            match self.populate(&key, limit).await {
                Ok((entry, ran)) if ran || entry.covers(limit) => {
                    return SyncReport {
                        series: CandleSeries::clone(&entry.series),
                        error: None,
                        stats: entry.stats,
                    };
                }
                Ok(_) => {}
                Err(failure) => {
                    return SyncReport {
                        series: CandleSeries::clone(&failure.series),
                        error: Some(failure.error.clone()),
                        stats: failure.stats,
                    };
                }
            }
        }
    }

    /// Drop the entry for one pair; returns whether one existed.
    pub async fn invalidate(&self, symbol: &Symbol, period: Period) -> bool {
        let key = SeriesKey::new(symbol.clone(), period);
        self.entries.remove(&key).await.is_some()
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        let keys: Vec<SeriesKey> = self
            .entries
            .iter()
            .map(|(k, _)| SeriesKey::clone(&k))
            .collect();
        for key in keys {
            self.entries.invalidate(&key).await;
        }
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        self.entries.iter().count()
    }

    /// Whether the cache holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
