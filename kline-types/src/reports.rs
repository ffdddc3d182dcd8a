//! Report envelopes produced by the engine.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::candle::CandleSeries;
use crate::error::KlineError;
use crate::symbol::Symbol;

/// Counters describing one `ensure_fresh` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SyncStats {
    /// Upstream calls issued (including failed ones).
    pub requests: u32,
    /// Candles added that were not present before.
    pub inserted: usize,
    /// Existing candles replaced with fetched values.
    pub overwritten: usize,
    /// Fetched candles dropped by integrity checks.
    pub rejected: usize,
    /// The series was already current and only the open bar was refreshed.
    pub steady_state: bool,
    /// A gap was detected and re-synchronized.
    pub gap_filled: bool,
    /// The merged series was written back to the store.
    pub persisted: bool,
    /// The stored record could not be read and was treated as absent.
    pub load_failed: bool,
}

/// Outcome of bringing one series up to date.
///
/// `series` is always the best available data, even when `error` is set:
/// an upstream outage yields the previously stored series plus the error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Freshest series the engine could produce.
    pub series: CandleSeries,
    /// First error that prevented a full refresh, if any.
    pub error: Option<KlineError>,
    /// Per-run counters.
    pub stats: SyncStats,
}

impl SyncReport {
    /// True when the run completed without error.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Progress notification emitted by batch runs as symbols complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    /// Symbols finished so far, including this one.
    pub completed: usize,
    /// Symbols in the batch.
    pub total: usize,
    /// Symbol that just finished.
    pub symbol: Symbol,
    /// Whether the symbol produced a usable series.
    pub ok: bool,
}

/// Summary of a multi-symbol batch.
///
/// Symbols that produced no usable data appear only in `failures`. Symbols
/// served from stale local data appear in `series` and in `warnings`.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Series for every symbol that produced usable data.
    pub series: HashMap<Symbol, Arc<CandleSeries>>,
    /// Symbols that produced nothing, with the reason.
    pub failures: Vec<(Symbol, KlineError)>,
    /// Symbols served from stale data, with the refresh error.
    pub warnings: Vec<(Symbol, KlineError)>,
}

impl BatchReport {
    /// Number of symbols with usable data.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.series.len()
    }
}
