use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the kline workspace.
///
/// Variants fall into three families (see [`ErrorKind`]): storage failures,
/// upstream failures, and per-candle data integrity problems. Argument and
/// not-found errors sit outside those families.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum KlineError {
    /// Reading, writing, or (de)serializing a persisted series failed.
    #[error("storage error for {key}: {msg}")]
    Storage {
        /// Series key, e.g. `BTCUSDT/1h`.
        key: String,
        /// Human-readable error message.
        msg: String,
    },

    /// The upstream source rejected the call because of rate limiting.
    #[error("{provider} rate limited (retry_after_ms={retry_after_ms:?})")]
    RateLimited {
        /// Upstream source name.
        provider: String,
        /// Suggested wait before retrying, when the source reports one.
        retry_after_ms: Option<u64>,
    },

    /// Transport-level failure talking to the upstream source.
    #[error("{provider} network error: {msg}")]
    Network {
        /// Upstream source name.
        provider: String,
        /// Human-readable error message.
        msg: String,
    },

    /// The upstream source does not know this symbol.
    #[error("invalid symbol: {symbol}")]
    InvalidSymbol {
        /// Symbol as requested.
        symbol: String,
    },

    /// The upstream source answered with something that could not be interpreted.
    #[error("{provider} returned a malformed response: {msg}")]
    Malformed {
        /// Upstream source name.
        provider: String,
        /// Human-readable error message.
        msg: String,
    },

    /// An individual upstream call exceeded its timeout.
    #[error("{provider} timed out after {timeout_ms}ms")]
    UpstreamTimeout {
        /// Upstream source name.
        provider: String,
        /// Timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// The request exceeds the configured quota budget for the current window.
    #[error("quota exceeded: remaining={remaining} reset_in_ms={reset_in_ms}")]
    QuotaExceeded {
        /// Remaining units at the time of rejection.
        remaining: u64,
        /// Milliseconds until the quota window resets.
        reset_in_ms: u64,
    },

    /// Source is temporarily blacklisted by middleware; retry after `reset_in_ms`.
    #[error("temporarily blacklisted: reset_in_ms={reset_in_ms}")]
    TemporarilyBlacklisted {
        /// Milliseconds remaining until the blacklist window elapses.
        reset_in_ms: u64,
    },

    /// A fetched candle failed basic OHLC sanity checks.
    #[error("data integrity violation at {open_time_ms}: {msg}")]
    DataIntegrity {
        /// Open time of the offending candle, epoch milliseconds.
        open_time_ms: i64,
        /// Description of the violated check.
        msg: String,
    },

    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// A resource could not be found.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource.
        what: String,
    },
}

/// Coarse classification of a [`KlineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Local persistence failed; previously stored data may still be usable.
    Storage,
    /// The remote source could not be reached or refused the call.
    Upstream,
    /// A single candle was rejected by sanity checks.
    DataIntegrity,
    /// Caller supplied an invalid argument.
    InvalidArg,
    /// Requested resource does not exist.
    NotFound,
}

impl KlineError {
    /// Helper: build a `Storage` error for a series key.
    pub fn storage(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Storage {
            key: key.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `Network` error tagged with the source name.
    pub fn network(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Network {
            provider: provider.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `Malformed` error tagged with the source name.
    pub fn malformed(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Malformed {
            provider: provider.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build an `InvalidSymbol` error.
    pub fn invalid_symbol(symbol: impl Into<String>) -> Self {
        Self::InvalidSymbol {
            symbol: symbol.into(),
        }
    }

    /// Helper: build an `UpstreamTimeout` error.
    pub fn upstream_timeout(provider: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self::UpstreamTimeout {
            provider: provider.into(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Helper: build a `DataIntegrity` error.
    pub fn integrity(open_time_ms: i64, msg: impl Into<String>) -> Self {
        Self::DataIntegrity {
            open_time_ms,
            msg: msg.into(),
        }
    }

    /// Helper: build a `NotFound` error for a description of the missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Classify this error into one of the coarse families.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage { .. } => ErrorKind::Storage,
            Self::RateLimited { .. }
            | Self::Network { .. }
            | Self::InvalidSymbol { .. }
            | Self::Malformed { .. }
            | Self::UpstreamTimeout { .. }
            | Self::QuotaExceeded { .. }
            | Self::TemporarilyBlacklisted { .. } => ErrorKind::Upstream,
            Self::DataIntegrity { .. } => ErrorKind::DataIntegrity,
            Self::InvalidArg(_) => ErrorKind::InvalidArg,
            Self::NotFound { .. } => ErrorKind::NotFound,
        }
    }

    /// Returns true for failures of the remote source.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(self.kind(), ErrorKind::Upstream)
    }

    /// Returns true for local persistence failures.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self.kind(), ErrorKind::Storage)
    }

    /// Returns true if retrying later may succeed.
    ///
    /// Invalid symbols and arguments are permanent; everything else on the
    /// upstream or storage side is considered transient.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::InvalidSymbol { .. } | Self::InvalidArg(_) | Self::NotFound { .. } => false,
            Self::DataIntegrity { .. } => false,
            _ => true,
        }
    }
}
