//! Bounded-concurrency multi-symbol refresh.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use kline_core::{BatchProgress, BatchReport, KlineError, Period, Symbol};

use crate::cache::TtlCache;

/// Callback invoked once per symbol as it completes.
pub type ProgressFn = dyn Fn(BatchProgress) + Send + Sync;

/// Fans `get_or_sync` out over many symbols with a fixed concurrency ceiling.
pub struct BatchScheduler {
    cache: Arc<TtlCache>,
}

impl BatchScheduler {
    /// Create a scheduler reading through `cache`.
    pub const fn new(cache: Arc<TtlCache>) -> Self {
        Self { cache }
    }

    /// Refresh every symbol for `period` and collect the results.
    ///
    /// Behavior:
    /// - At most `max_concurrency` syncs run at once; completion order is arbitrary.
    /// - Duplicate symbols are processed once.
    /// - A symbol that failed but still has stored candles counts as a success;
    ///   its error is recorded in `warnings`. A failure with nothing stored goes
    ///   to `failures`. One symbol never aborts the others.
    ///
    /// # Errors
    /// Returns `InvalidArg` if `max_concurrency` is zero.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "kline::batch::run",
            skip(self, symbols, progress),
            fields(symbols = symbols.len(), period = %period, limit = limit, max_concurrency = max_concurrency),
        )
    )]
    pub async fn run(
        &self,
        symbols: &[Symbol],
        period: Period,
        limit: usize,
        max_concurrency: usize,
        progress: Option<&ProgressFn>,
    ) -> Result<BatchReport, KlineError> {
        if max_concurrency == 0 {
            return Err(KlineError::InvalidArg(
                "max_concurrency must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        let unique: Vec<Symbol> = symbols
            .iter()
            .filter(|s| seen.insert(*s))
            .cloned()
            .collect();
        let total = unique.len();

        let cache = &self.cache;
        let mut results = futures::stream::iter(unique.into_iter().map(|symbol| async move {
            let lookup = cache.get_or_sync(&symbol, period, limit).await;
            (symbol, lookup)
        }))
        .buffer_unordered(max_concurrency);

        let mut report = BatchReport::default();
        let mut completed = 0;
        while let Some((symbol, lookup)) = results.next().await {
            completed += 1;
            let ok = match lookup.error {
                None => {
                    report.series.insert(symbol.clone(), lookup.series);
                    true
                }
                Some(e) if !lookup.series.is_empty() => {
                    report.series.insert(symbol.clone(), lookup.series);
                    report.warnings.push((symbol.clone(), e));
                    true
                }
                Some(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(symbol = %symbol, error = %e, "symbol failed with no local data");
                    report.failures.push((symbol.clone(), e));
                    false
                }
            };
            if let Some(cb) = progress {
                cb(BatchProgress {
                    completed,
                    total,
                    symbol,
                    ok,
                });
            }
        }
        Ok(report)
    }
}
