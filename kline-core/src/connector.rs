use async_trait::async_trait;
use chrono::{DateTime, Utc};

use kline_types::{Candle, KlineError, Period, Symbol};

/// Parameters for one upstream candle request.
///
/// `from`/`to` bound the open times of returned candles when set; `limit`
/// caps the number of candles. A request with neither bound asks for the
/// newest `limit` candles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Symbol to fetch.
    pub symbol: Symbol,
    /// Candle period.
    pub period: Period,
    /// Earliest open time to include.
    pub from: Option<DateTime<Utc>>,
    /// Latest open time to include.
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of candles.
    pub limit: usize,
}

impl FetchRequest {
    /// Request the newest `limit` candles.
    #[must_use]
    pub const fn latest(symbol: Symbol, period: Period, limit: usize) -> Self {
        Self {
            symbol,
            period,
            from: None,
            to: None,
            limit,
        }
    }

    /// Request candles opening within `[from, to]`, at most `limit` of them.
    #[must_use]
    pub const fn window(
        symbol: Symbol,
        period: Period,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Self {
        Self {
            symbol,
            period,
            from: Some(from),
            to: Some(to),
            limit,
        }
    }
}

/// Remote market-data source of candles.
///
/// Implementations wrap a concrete exchange binding (signing, transport, wire
/// format). Failures are reported as upstream variants of [`KlineError`]:
/// `RateLimited`, `Network`, `InvalidSymbol`, or `Malformed`.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Short identifier used in logs and error tags.
    fn name(&self) -> &'static str;

    /// Fetch candles for the request.
    ///
    /// Returned candles must be ascending by open time with no duplicates.
    async fn fetch_candles(&self, req: &FetchRequest) -> Result<Vec<Candle>, KlineError>;
}
