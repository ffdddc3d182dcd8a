use chrono::{DateTime, Utc};

/// Source of "now" for freshness and cache-expiry decisions.
///
/// Production code uses [`SystemClock`]; tests inject a manually driven clock
/// so day rollovers and TTL expiry are deterministic.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by `chrono::Utc::now`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
