//! Candle, series, and gap types.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::period::Period;
use crate::symbol::Symbol;

/// One OHLCV bar.
///
/// Serialized with the field names used by the persisted record
/// (`openTime` in epoch milliseconds, decimals as strings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open instant; unique key within a series.
    #[serde(rename = "openTime", with = "chrono::serde::ts_milliseconds")]
    pub open_time: DateTime<Utc>,
    /// Opening price.
    #[serde(rename = "openPrice")]
    pub open: Decimal,
    /// Highest traded price.
    #[serde(rename = "highPrice")]
    pub high: Decimal,
    /// Lowest traded price.
    #[serde(rename = "lowPrice")]
    pub low: Decimal,
    /// Closing (or latest, for an open bar) price.
    #[serde(rename = "closePrice")]
    pub close: Decimal,
    /// Base-asset volume.
    pub volume: Decimal,
    /// Quote-asset volume.
    #[serde(rename = "quoteVolume", default)]
    pub quote_volume: Decimal,
    /// Number of trades in the bar.
    #[serde(rename = "tradeCount", default)]
    pub trade_count: u64,
}

impl Candle {
    /// Build a candle with zero quote volume and trade count.
    #[must_use]
    pub const fn new(
        open_time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
            quote_volume: Decimal::ZERO,
            trade_count: 0,
        }
    }

    /// Set the quote-asset volume.
    #[must_use]
    pub const fn with_quote_volume(mut self, quote_volume: Decimal) -> Self {
        self.quote_volume = quote_volume;
        self
    }

    /// Set the trade count.
    #[must_use]
    pub const fn with_trade_count(mut self, trade_count: u64) -> Self {
        self.trade_count = trade_count;
        self
    }

    /// UTC calendar date of the bar's open.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.open_time.date_naive()
    }

    /// Open time as epoch milliseconds.
    #[must_use]
    pub fn open_time_ms(&self) -> i64 {
        self.open_time.timestamp_millis()
    }

    /// True when every value field matches `other`; the open time is not compared.
    #[must_use]
    pub fn same_values(&self, other: &Self) -> bool {
        self.open == other.open
            && self.high == other.high
            && self.low == other.low
            && self.close == other.close
            && self.volume == other.volume
            && self.quote_volume == other.quote_volume
            && self.trade_count == other.trade_count
    }
}

/// Identity of one persisted series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    /// Trading symbol.
    pub symbol: Symbol,
    /// Candle period.
    pub period: Period,
}

impl SeriesKey {
    /// Build a key from its parts.
    #[must_use]
    pub const fn new(symbol: Symbol, period: Period) -> Self {
        Self { symbol, period }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.period)
    }
}

/// Ordered, duplicate-free candles for one (symbol, period) pair.
///
/// Every constructor normalizes its input, so `candles()` is always strictly
/// ascending by `open_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandleSeries {
    symbol: Symbol,
    period: Period,
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series, sorting by open time and keeping the last occurrence of
    /// any duplicated open time.
    #[must_use]
    pub fn new(symbol: Symbol, period: Period, candles: Vec<Candle>) -> Self {
        let already_sorted = candles
            .windows(2)
            .all(|w| w[0].open_time < w[1].open_time);
        let candles = if already_sorted {
            candles
        } else {
            let mut by_time: BTreeMap<DateTime<Utc>, Candle> = BTreeMap::new();
            for c in candles {
                by_time.insert(c.open_time, c);
            }
            by_time.into_values().collect()
        };
        Self {
            symbol,
            period,
            candles,
        }
    }

    /// An empty series.
    #[must_use]
    pub const fn empty(symbol: Symbol, period: Period) -> Self {
        Self {
            symbol,
            period,
            candles: Vec::new(),
        }
    }

    /// Trading symbol.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Candle period.
    #[must_use]
    pub const fn period(&self) -> Period {
        self.period
    }

    /// Series identity.
    #[must_use]
    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(self.symbol.clone(), self.period)
    }

    /// Candles in ascending open-time order.
    #[must_use]
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// Consume the series and return its candles.
    #[must_use]
    pub fn into_candles(self) -> Vec<Candle> {
        self.candles
    }

    /// Number of candles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// True when the series holds no candles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Oldest candle.
    #[must_use]
    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    /// Newest candle.
    #[must_use]
    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Open time of the newest candle.
    #[must_use]
    pub fn last_open_time(&self) -> Option<DateTime<Utc>> {
        self.candles.last().map(|c| c.open_time)
    }

    /// Copy of the newest `limit` candles.
    #[must_use]
    pub fn tail(&self, limit: usize) -> Self {
        let start = self.candles.len().saturating_sub(limit);
        Self {
            symbol: self.symbol.clone(),
            period: self.period,
            candles: self.candles[start..].to_vec(),
        }
    }

    /// Drop all but the newest `keep` candles in place.
    pub fn retain_newest(&mut self, keep: usize) {
        let excess = self.candles.len().saturating_sub(keep);
        if excess > 0 {
            self.candles.drain(..excess);
        }
    }

    /// Iterate candles in ascending order.
    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }
}

impl<'a> IntoIterator for &'a CandleSeries {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;

    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}

/// A detected hole in a series' day coverage.
///
/// Transient: computed on demand and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchGap {
    /// Last date present before the hole.
    pub after_date: NaiveDate,
    /// First date present after the hole.
    pub before_date: NaiveDate,
    /// First missing date.
    pub start: NaiveDate,
}

impl FetchGap {
    /// Midnight UTC of the first missing date.
    #[must_use]
    pub fn start_instant(&self) -> DateTime<Utc> {
        self.start.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// Number of calendar days strictly between the two surrounding dates.
    #[must_use]
    pub fn missing_days(&self) -> i64 {
        (self.before_date - self.after_date).num_days() - 1
    }
}
