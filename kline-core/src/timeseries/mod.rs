//! Time-series utilities shared by the sync coordinator and tests.
//!
//! Modules include:
//! - `merge`: merge freshly fetched candles into a stored series
//! - `gaps`: detect the first missing date range in a series
//! - `validate`: per-candle OHLC sanity checks
/// First-gap detection over calendar dates.
pub mod gaps;
/// Freshness-aware merge of fetched candles into a stored series.
pub mod merge;
/// Per-candle sanity checks.
pub mod validate;
