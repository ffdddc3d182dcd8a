//! Configuration types consumed by the engine and middleware.
//!
//! Loading these values (files, environment) is the caller's job; every struct
//! derives serde traits and carries conservative defaults.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::period::Period;

/// In-memory cache configuration.
///
/// TTLs are keyed by the period's short form (`"5m"`, `"1d"`, ...). A TTL of
/// zero disables caching for that period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL applied to periods without an explicit override.
    pub default_ttl_ms: u64,
    /// Per-period TTL overrides.
    pub per_period_ttl_ms: HashMap<String, u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let per_period_ttl_ms = [
            (Period::M1, 30_000),
            (Period::M3, 60_000),
            (Period::M5, 60_000),
            (Period::M15, 120_000),
            (Period::M30, 180_000),
            (Period::H1, 300_000),
            (Period::H2, 600_000),
            (Period::H4, 900_000),
            (Period::H6, 1_200_000),
            (Period::H8, 1_200_000),
            (Period::H12, 1_800_000),
            (Period::D1, 1_800_000),
            (Period::D3, 3_600_000),
            (Period::W1, 6 * 3_600_000),
        ]
        .into_iter()
        .map(|(p, ms)| (p.as_str().to_string(), ms))
        .collect();
        Self {
            default_ttl_ms: 60_000,
            per_period_ttl_ms,
        }
    }
}

impl CacheConfig {
    /// Effective TTL for `period`; `None` when caching is disabled for it.
    #[must_use]
    pub fn ttl_for(&self, period: Period) -> Option<Duration> {
        let ms = self
            .per_period_ttl_ms
            .get(period.as_str())
            .copied()
            .unwrap_or(self.default_ttl_ms);
        (ms > 0).then(|| Duration::from_millis(ms))
    }

    /// Override the TTL for a single period.
    #[must_use]
    pub fn with_ttl(mut self, period: Period, ttl: Duration) -> Self {
        let ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self.per_period_ttl_ms.insert(period.as_str().to_string(), ms);
        self
    }
}

/// Synchronization policy for bringing a series up to date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Number of periods to pull when no local data exists.
    pub default_window: usize,
    /// Extra periods re-requested beyond the computed lag (at least one, so the
    /// still-open bar is always refreshed).
    pub slack: usize,
    /// Timeout applied to each individual upstream call.
    pub upstream_timeout: Duration,
    /// Optional retention cap on persisted candles per series.
    pub max_candles: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_window: 500,
            slack: 1,
            upstream_timeout: Duration::from_secs(10),
            max_candles: None,
        }
    }
}

/// Batch fan-out configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum number of simultaneous per-symbol syncs.
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrency: 8 }
    }
}

/// Strategy for consuming units from a quota when handling requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum QuotaConsumptionStrategy {
    /// Each request deducts exactly one unit from the quota budget.
    #[default]
    Unit,
    /// Spread the window budget evenly across 24 slices.
    EvenSpreadHourly,
}

/// Configuration for a request budget over a fixed window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Maximum number of units that may be consumed within a single window.
    pub limit: u64,
    /// Duration of the accounting window.
    pub window: Duration,
    /// Strategy for how requests consume units from the budget.
    pub strategy: QuotaConsumptionStrategy,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            limit: 1200,
            window: Duration::from_secs(60),
            strategy: QuotaConsumptionStrategy::Unit,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root directory for persisted series.
    pub storage_root: PathBuf,
    /// Cache TTLs.
    pub cache: CacheConfig,
    /// Sync policy.
    pub sync: SyncConfig,
    /// Batch fan-out.
    pub batch: BatchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("data/klines"),
            cache: CacheConfig::default(),
            sync: SyncConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}
