use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::{DateTime, Days, NaiveDate, Utc};
use kline_types::{Candle, CandleSeries, KlineError};

use super::validate::partition_valid;

/// Result of merging fetched candles into a stored series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Merged series, ascending and duplicate-free.
    pub series: CandleSeries,
    /// Fetched candles whose open time was not present before.
    pub inserted: usize,
    /// Stored candles replaced by a fetched candle.
    pub overwritten: usize,
    /// Overwrites that actually changed a value.
    pub modified: usize,
    /// Fetched candles skipped because the stored copy was identical and final.
    pub unchanged: usize,
    /// Integrity errors for fetched candles that were dropped.
    pub rejected: Vec<KlineError>,
}

impl MergeOutcome {
    /// True when the merged series differs from the stored one.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.inserted > 0 || self.modified > 0
    }
}

/// Dates relative to "now" whose candles are never treated as final.
struct Freshness {
    today: NaiveDate,
    yesterday: Option<NaiveDate>,
    last_open: Option<DateTime<Utc>>,
}

impl Freshness {
    fn new(now: DateTime<Utc>, existing: &CandleSeries) -> Self {
        let today = now.date_naive();
        Self {
            today,
            yesterday: today.checked_sub_days(Days::new(1)),
            last_open: existing.last_open_time(),
        }
    }

    /// Decide whether `fresh` replaces `stored` (both share an open time).
    fn should_overwrite(&self, stored: &Candle, fresh: &Candle) -> bool {
        let date = fresh.date();
        // Today's bar is still open.
        if date == self.today {
            return true;
        }
        // A bar captured as "today" on a prior run may have closed since.
        if Some(date) == self.yesterday {
            return true;
        }
        // The newest stored bar may have been captured mid-period.
        if Some(fresh.open_time) == self.last_open {
            return true;
        }
        !stored.same_values(fresh)
    }
}

/// Merge freshly fetched candles into an existing series.
///
/// Rules per fetched candle:
/// - dropped (and reported in `rejected`) if it fails [`validate_candle`](super::validate::validate_candle);
/// - inserted if its open time is absent from `existing`;
/// - overwritten if its UTC date is today or yesterday relative to `now`, or
///   if its open time equals the newest stored open time;
/// - otherwise overwritten only when any value field differs.
///
/// Merging a series with its own candles returns an identical series.
#[must_use]
pub fn merge_series(existing: &CandleSeries, fetched: Vec<Candle>, now: DateTime<Utc>) -> MergeOutcome {
    let freshness = Freshness::new(now, existing);
    let mut by_time: BTreeMap<DateTime<Utc>, Candle> = existing
        .iter()
        .map(|c| (c.open_time, c.clone()))
        .collect();

    let mut inserted = 0usize;
    let mut overwritten = 0usize;
    let mut modified = 0usize;
    let mut unchanged = 0usize;

    let (valid, rejected) = partition_valid(fetched);
    #[cfg(feature = "tracing")]
    for e in &rejected {
        tracing::warn!(
            symbol = %existing.symbol(),
            period = %existing.period(),
            error = %e,
            "dropping candle that failed integrity checks"
        );
    }

    for c in valid {
        match by_time.entry(c.open_time) {
            Entry::Vacant(v) => {
                v.insert(c);
                inserted += 1;
            }
            Entry::Occupied(mut o) => {
                if freshness.should_overwrite(o.get(), &c) {
                    if !o.get().same_values(&c) {
                        modified += 1;
                    }
                    o.insert(c);
                    overwritten += 1;
                } else {
                    unchanged += 1;
                }
            }
        }
    }

    let series = CandleSeries::new(
        existing.symbol().clone(),
        existing.period(),
        by_time.into_values().collect(),
    );

    MergeOutcome {
        series,
        inserted,
        overwritten,
        modified,
        unchanged,
        rejected,
    }
}
