//! Incremental synchronization of one (symbol, period) series.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kline_core::{
    Candle, CandleSeries, CandleSource, CandleStore, Clock, FetchRequest, KlineError, MergeOutcome,
    Period, Symbol, SyncConfig, SyncReport, SyncStats, detect_gap, merge_series,
};

/// Keeps the stored series for a pair up to date with the upstream source.
///
/// Every call loads the stored series, decides how much history is missing,
/// fetches only that, merges, and persists. Upstream and storage failures are
/// reported alongside the best series available; they never discard local data.
pub struct SyncCoordinator {
    source: Arc<dyn CandleSource>,
    store: Arc<dyn CandleStore>,
    clock: Arc<dyn Clock>,
    cfg: SyncConfig,
}

/// Number of whole periods from `last_open` to `now`, rounded up.
fn periods_behind(last_open: DateTime<Utc>, now: DateTime<Utc>, period: Period) -> usize {
    let elapsed = (now - last_open).num_seconds().max(0);
    let step = period.seconds();
    usize::try_from((elapsed + step - 1) / step).unwrap_or(usize::MAX)
}

impl SyncCoordinator {
    /// Create a coordinator over the given collaborators.
    pub fn new(
        source: Arc<dyn CandleSource>,
        store: Arc<dyn CandleStore>,
        clock: Arc<dyn Clock>,
        cfg: SyncConfig,
    ) -> Self {
        Self {
            source,
            store,
            clock,
            cfg,
        }
    }

    /// Active configuration.
    pub const fn config(&self) -> &SyncConfig {
        &self.cfg
    }

    /// Backing store.
    pub fn store(&self) -> &Arc<dyn CandleStore> {
        &self.store
    }

    /// Clock used for freshness decisions.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Bring the stored series for `symbol`/`period` up to date and return it.
    ///
    /// Behavior:
    /// - Nothing stored: fetch `max(default_window, limit)` candles.
    /// - Stored, no gap, at most one period behind and at least `limit` long:
    ///   refresh only the still-open bar (`slack + 1` candles).
    /// - Gap in the stored dates: refetch from one period before the gap.
    /// - Otherwise fetch the periods elapsed since the newest stored bar plus `slack`.
    /// - Still shorter than `limit` afterwards: one more request for `limit` candles.
    ///
    /// The returned report is never empty when local data exists.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "kline::sync::ensure_fresh",
            skip(self),
            fields(symbol = %symbol, period = %period, limit = limit),
        )
    )]
    pub async fn ensure_fresh(&self, symbol: &Symbol, period: Period, limit: usize) -> SyncReport {
        let now = self.clock.now();
        let mut stats = SyncStats::default();
        let mut load_error = None;

        let stored = match self.store.load(symbol, period).await {
            Ok(Some(s)) if !s.is_empty() => Some(s),
            Ok(_) => None,
            Err(e) => {
                // A corrupt record is treated as absent and overwritten on the next save.
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, "load failed; resyncing from scratch");
                stats.load_failed = true;
                load_error = Some(e);
                None
            }
        };

        let Some(stored) = stored else {
            let empty = CandleSeries::empty(symbol.clone(), period);
            let want = self.cfg.default_window.max(limit);
            let req = FetchRequest::latest(symbol.clone(), period, want);
            return match self.fetch(&req, &mut stats).await {
                Ok(candles) => {
                    let out = merge_series(&empty, candles, now);
                    Self::absorb(&mut stats, &out);
                    let changed = out.changed();
                    self.finish(out.series, changed, limit, load_error, stats)
                        .await
                }
                Err(e) => {
                    if let Some(_load) = &load_error {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(error = %_load, "stored record unreadable and upstream unavailable");
                    }
                    SyncReport {
                        series: empty,
                        error: Some(e),
                        stats,
                    }
                }
            };
        };

        let step = period.duration();
        let last_open = stored.last_open_time().unwrap_or(now);
        let behind = periods_behind(last_open, now, period);
        let gap = detect_gap(&stored);

        let req = if let Some(gap) = gap {
            stats.gap_filled = true;
            let from = gap.start_instant() - step;
            let span = periods_behind(from, now, period).saturating_add(1);
            #[cfg(feature = "tracing")]
            tracing::debug!(gap_start = %gap.start, missing_days = gap.missing_days(), "refilling gap");
            FetchRequest::window(symbol.clone(), period, from, now, span)
        } else if behind <= 1 && stored.len() >= limit {
            stats.steady_state = true;
            FetchRequest::latest(symbol.clone(), period, self.cfg.slack + 1)
        } else {
            FetchRequest::latest(symbol.clone(), period, behind + self.cfg.slack)
        };

        let mut series = stored;
        let mut changed = false;
        match self.fetch(&req, &mut stats).await {
            Ok(candles) => {
                let out = merge_series(&series, candles, now);
                Self::absorb(&mut stats, &out);
                changed |= out.changed();
                series = out.series;
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, "upstream refresh failed; serving stored series");
                return SyncReport {
                    series,
                    error: Some(e),
                    stats,
                };
            }
        }

        let mut error = load_error;
        if series.len() < limit {
            let req = FetchRequest::latest(symbol.clone(), period, limit);
            match self.fetch(&req, &mut stats).await {
                Ok(candles) => {
                    let out = merge_series(&series, candles, now);
                    Self::absorb(&mut stats, &out);
                    changed |= out.changed();
                    series = out.series;
                }
                Err(e) => error = Some(e),
            }
        }

        self.finish(series, changed, limit, error, stats).await
    }

    /// Apply retention, persist if anything changed, and assemble the report.
    async fn finish(
        &self,
        mut series: CandleSeries,
        mut changed: bool,
        limit: usize,
        mut error: Option<KlineError>,
        mut stats: SyncStats,
    ) -> SyncReport {
        if let Some(max) = self.cfg.max_candles {
            let before = series.len();
            series.retain_newest(max.max(limit));
            changed |= series.len() != before;
        }
        if changed {
            match self.store.save(&series).await {
                Ok(()) => stats.persisted = true,
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(key = %series.key(), error = %e, "persist failed");
                    error = Some(e);
                }
            }
        }
        SyncReport {
            series,
            error,
            stats,
        }
    }

    fn absorb(stats: &mut SyncStats, out: &MergeOutcome) {
        stats.inserted += out.inserted;
        stats.overwritten += out.overwritten;
        stats.rejected += out.rejected.len();
    }

    async fn fetch(
        &self,
        req: &FetchRequest,
        stats: &mut SyncStats,
    ) -> Result<Vec<Candle>, KlineError> {
        stats.requests += 1;
        let timeout = self.cfg.upstream_timeout;
        match tokio::time::timeout(timeout, self.source.fetch_candles(req)).await {
            Ok(res) => res,
            Err(_) => Err(KlineError::upstream_timeout(self.source.name(), timeout)),
        }
    }
}
