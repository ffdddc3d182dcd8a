use async_trait::async_trait;

use kline_types::{CandleSeries, KlineError, Period, Symbol};

/// Durable per-(symbol, period) series persistence.
///
/// The store is the single source of truth. `save` replaces the whole record
/// atomically: readers observe either the previous or the new series, never a
/// partial write, and a failed save leaves the previous record authoritative.
#[async_trait]
pub trait CandleStore: Send + Sync {
    /// Load the stored series, or `None` if nothing was ever saved for the pair.
    async fn load(&self, symbol: &Symbol, period: Period)
    -> Result<Option<CandleSeries>, KlineError>;

    /// Replace the stored series for `series.key()`.
    async fn save(&self, series: &CandleSeries) -> Result<(), KlineError>;

    /// Remove the stored series; returns whether one existed.
    async fn delete(&self, symbol: &Symbol, period: Period) -> Result<bool, KlineError>;

    /// Symbols that have a stored series for `period`, sorted.
    async fn list_symbols(&self, period: Period) -> Result<Vec<Symbol>, KlineError>;
}
