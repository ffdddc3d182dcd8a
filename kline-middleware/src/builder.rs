//! Builder for composing sources with middleware layers.
//!
//! Layers form an onion around the raw source:
//!
//! ```text
//! fetch_candles
//!     ↓
//! Blacklist   (fails fast while benched, records rate-limit/quota errors)
//!     ↓
//! Quota       (spends one unit of the request budget)
//!     ↓
//! Raw source  (talks to the exchange)
//! ```
//!
//! `layers` is stored outermost-first and applied in reverse by `build()`, so
//! `builder.with_quota(..).with_blacklist(..)` yields `Blacklist(Quota(Raw))`.

use std::sync::Arc;
use std::time::Duration;

use kline_core::{CandleSource, Middleware};
use kline_types::QuotaConfig;
use serde_json::json;

use crate::blacklist::BlacklistMiddleware;
use crate::quota::QuotaMiddleware;

const QUOTA: &str = "QuotaAwareSource";
const BLACKLIST: &str = "BlacklistingSource";

/// Middleware builder for composing a source with layered wrappers.
pub struct SourceBuilder {
    raw: Arc<dyn CandleSource>,
    /// Middleware layers in outermost-first order.
    layers: Vec<Box<dyn Middleware>>,
}

impl SourceBuilder {
    /// Create a new builder from a raw, unwrapped source.
    #[must_use]
    pub fn new(raw: Arc<dyn CandleSource>) -> Self {
        Self {
            raw,
            layers: Vec::new(),
        }
    }

    /// Add or replace the quota layer at the outermost position.
    #[must_use]
    pub fn with_quota(mut self, cfg: &QuotaConfig) -> Self {
        self.layers.retain(|m| m.name() != QUOTA);
        self.layers
            .insert(0, Box::new(QuotaMiddleware::new(cfg.clone())));
        self
    }

    /// Remove the quota layer if present.
    #[must_use]
    pub fn without_quota(mut self) -> Self {
        self.layers.retain(|m| m.name() != QUOTA);
        self
    }

    /// Add or replace the blacklist layer at the outermost position.
    ///
    /// `duration` applies when the error carries no reset hint of its own.
    #[must_use]
    pub fn with_blacklist(mut self, duration: Duration) -> Self {
        self.layers.retain(|m| m.name() != BLACKLIST);
        self.layers
            .insert(0, Box::new(BlacklistMiddleware::new(duration)));
        self
    }

    /// Remove the blacklist layer if present.
    #[must_use]
    pub fn without_blacklist(mut self) -> Self {
        self.layers.retain(|m| m.name() != BLACKLIST);
        self
    }

    /// Add an arbitrary middleware layer at the outermost position.
    #[must_use]
    pub fn layer(mut self, layer: Box<dyn Middleware>) -> Self {
        self.layers.insert(0, layer);
        self
    }

    /// Describe the stack, outermost first, with the raw source last.
    #[must_use]
    pub fn describe(&self) -> Vec<(String, serde_json::Value)> {
        let mut out: Vec<_> = self
            .layers
            .iter()
            .map(|l| (l.name().to_string(), l.config_json()))
            .collect();
        out.push((
            "RawSource".to_string(),
            json!({ "name": self.raw.name() }),
        ));
        out
    }

    /// Build the wrapped source.
    ///
    /// Layers are applied innermost first; requests then flow
    /// `caller -> layers[0] -> ... -> raw`.
    #[must_use]
    pub fn build(self) -> Arc<dyn CandleSource> {
        let mut acc = Arc::clone(&self.raw);
        for m in self.layers.into_iter().rev() {
            acc = m.apply(acc);
        }
        acc
    }
}
