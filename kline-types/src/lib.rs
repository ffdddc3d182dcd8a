//! Kline-specific data transfer objects and configuration primitives.
#![warn(missing_docs)]

mod candle;
mod config;
mod error;
mod period;
mod reports;
mod symbol;

pub use candle::{Candle, CandleSeries, FetchGap, SeriesKey};
pub use config::{
    BatchConfig, CacheConfig, EngineConfig, QuotaConfig, QuotaConsumptionStrategy, SyncConfig,
};
pub use error::{ErrorKind, KlineError};
pub use period::Period;
pub use reports::{BatchProgress, BatchReport, SyncReport, SyncStats};
pub use symbol::Symbol;

pub use rust_decimal::Decimal;
