//! kline-core
//!
//! Contracts and pure algorithms shared across the kline workspace.
//!
//! - `connector`: the [`CandleSource`] trait implemented by upstream bindings.
//! - `store`: the [`CandleStore`] persistence contract.
//! - `clock`: injectable wall clock used for freshness decisions.
//! - `middleware`: the [`Middleware`] trait implemented by source wrappers.
//! - `timeseries`: series merging, gap detection, and candle validation.
//!
//! Everything in `timeseries` is synchronous; the only suspension points in
//! the engine are the upstream call and the persistence write.
#![warn(missing_docs)]

/// Injectable wall clock.
pub mod clock;
/// Upstream candle source contract.
pub mod connector;
/// Middleware trait implemented by source wrappers.
pub mod middleware;
/// Durable series persistence contract.
pub mod store;
/// Series merge, gap detection, and validation.
pub mod timeseries;

pub use clock::{Clock, SystemClock};
pub use connector::{CandleSource, FetchRequest};
pub use middleware::Middleware;
pub use store::CandleStore;
pub use timeseries::gaps::detect_gap;
pub use timeseries::merge::{MergeOutcome, merge_series};
pub use timeseries::validate::{partition_valid, validate_candle};

pub use kline_types::*;
