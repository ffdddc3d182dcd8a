//! N-period extremum tracking over cached series.
//!
//! One tracker serves every "new high / new low" style consumer: pick a
//! [`Direction`], a lookback, and optionally a filter, then feed it series.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use kline_core::{CandleSeries, Decimal, Symbol};

/// Which extreme the tracker looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Latest close above every earlier close in the lookback.
    Max,
    /// Latest close below every earlier close in the lookback.
    Min,
}

impl Direction {
    fn beats(self, candidate: Decimal, best: Decimal) -> bool {
        match self {
            Self::Max => candidate > best,
            Self::Min => candidate < best,
        }
    }
}

/// A series whose latest close set a new extreme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtremumHit {
    /// Symbol of the series.
    pub symbol: Symbol,
    /// Open time of the latest candle.
    pub open_time: DateTime<Utc>,
    /// Latest close.
    pub close: Decimal,
    /// Previous extreme close inside the lookback.
    pub previous: Decimal,
    /// Percent change from the first close in the lookback to the latest close.
    pub change_pct: Decimal,
}

type Filter = Arc<dyn Fn(&CandleSeries) -> bool + Send + Sync>;

/// Detects new N-period highs or lows.
#[derive(Clone)]
pub struct ExtremumTracker {
    direction: Direction,
    lookback: TimeDelta,
    filter: Option<Filter>,
}

impl std::fmt::Debug for ExtremumTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtremumTracker")
            .field("direction", &self.direction)
            .field("lookback", &self.lookback)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl ExtremumTracker {
    /// Track `direction` extremes over the trailing `lookback`.
    #[must_use]
    pub const fn new(direction: Direction, lookback: TimeDelta) -> Self {
        Self {
            direction,
            lookback,
            filter: None,
        }
    }

    /// Only consider series accepted by `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Fn(&CandleSeries) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Tracked direction.
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Check whether the newest candle of `series` made a new extreme.
    ///
    /// Candles opening before `now - lookback` are ignored. Returns `None` when
    /// the filter rejects the series, fewer than two candles fall inside the
    /// lookback, or the latest close is not a strict new extreme.
    #[must_use]
    pub fn evaluate(&self, series: &CandleSeries, now: DateTime<Utc>) -> Option<ExtremumHit> {
        if let Some(f) = &self.filter
            && !f(series)
        {
            return None;
        }
        let since = now - self.lookback;
        let window: Vec<_> = series.iter().filter(|c| c.open_time >= since).collect();
        let (latest, earlier) = window.split_last()?;
        let first = earlier.first()?;

        let previous = earlier
            .iter()
            .map(|c| c.close)
            .reduce(|best, c| if self.direction.beats(c, best) { c } else { best })?;
        if !self.direction.beats(latest.close, previous) {
            return None;
        }

        let base = first.close;
        if base.is_zero() {
            return None;
        }
        let change_pct = ((latest.close - base) / base * Decimal::ONE_HUNDRED).round_dp(4);
        Some(ExtremumHit {
            symbol: series.symbol().clone(),
            open_time: latest.open_time,
            close: latest.close,
            previous,
            change_pct,
        })
    }

    /// Evaluate every series and order the hits by strength.
    ///
    /// `Max` hits are sorted by descending change, `Min` hits by ascending
    /// change; ties break on symbol.
    #[must_use]
    pub fn rank(
        &self,
        series: &HashMap<Symbol, Arc<CandleSeries>>,
        now: DateTime<Utc>,
    ) -> Vec<ExtremumHit> {
        let mut hits: Vec<_> = series
            .values()
            .filter_map(|s| self.evaluate(s, now))
            .collect();
        hits.sort_by(|a, b| {
            let by_change = match self.direction {
                Direction::Max => b.change_pct.cmp(&a.change_pct),
                Direction::Min => a.change_pct.cmp(&b.change_pct),
            };
            by_change.then_with(|| a.symbol.cmp(&b.symbol))
        });
        hits
    }
}
