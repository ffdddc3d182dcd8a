//! kline-middleware
//!
//! Wrappers that sit between the sync engine and an upstream candle source.
#![warn(missing_docs)]

mod blacklist;
mod builder;
mod quota;

pub use crate::blacklist::{BlacklistMiddleware, BlacklistingSource};
pub use crate::builder::SourceBuilder;
pub use crate::quota::{QuotaAwareSource, QuotaMiddleware};
