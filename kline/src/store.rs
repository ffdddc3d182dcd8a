//! JSON-file implementation of [`CandleStore`].

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kline_core::{Candle, CandleSeries, CandleStore, Clock, KlineError, Period, SeriesKey, Symbol, SystemClock};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

const EXT: &str = "json";

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordRef<'a> {
    symbol: &'a Symbol,
    period: Period,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    last_updated: DateTime<Utc>,
    candles: &'a [Candle],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    symbol: Symbol,
    period: Period,
    candles: Vec<Candle>,
}

/// Store that keeps one JSON record per pair at `<root>/<period>/<SYMBOL>.json`.
///
/// Saves write a sibling temp file, fsync it, then rename it over the target,
/// so a crash mid-write never leaves a truncated record behind.
pub struct JsonFileStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl JsonFileStore {
    /// Create a store rooted at `root`. Directories are created lazily on save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` for the `lastUpdated` stamp.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the record for a pair.
    #[must_use]
    pub fn path_for(&self, symbol: &Symbol, period: Period) -> PathBuf {
        self.root
            .join(period.as_str())
            .join(format!("{}.{EXT}", symbol.as_str()))
    }

    fn tmp_path(target: &Path) -> PathBuf {
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.{seq}.tmp", std::process::id()));
        target.with_file_name(name)
    }

    async fn write_atomic(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = Self::tmp_path(target);
        let res = async {
            let mut f = tokio::fs::File::create(&tmp).await?;
            f.write_all(bytes).await?;
            f.sync_all().await?;
            drop(f);
            tokio::fs::rename(&tmp, target).await
        }
        .await;
        if res.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        res
    }
}

fn storage_err(key: &SeriesKey, e: impl std::fmt::Display) -> KlineError {
    KlineError::storage(key.to_string(), e.to_string())
}

#[async_trait]
impl CandleStore for JsonFileStore {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "kline::store::load", skip(self), fields(symbol = %symbol, period = %period))
    )]
    async fn load(
        &self,
        symbol: &Symbol,
        period: Period,
    ) -> Result<Option<CandleSeries>, KlineError> {
        let key = SeriesKey::new(symbol.clone(), period);
        let path = self.path_for(symbol, period);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_err(&key, e)),
        };
        let record: Record = serde_json::from_slice(&bytes).map_err(|e| storage_err(&key, e))?;
        if record.symbol != *symbol || record.period != period {
            return Err(KlineError::storage(
                key.to_string(),
                format!(
                    "record at {} belongs to {}/{}",
                    path.display(),
                    record.symbol,
                    record.period
                ),
            ));
        }
        // Re-normalize so a hand-edited file cannot break ordering.
        Ok(Some(CandleSeries::new(
            record.symbol,
            record.period,
            record.candles,
        )))
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "kline::store::save", skip(self, series), fields(key = %series.key(), len = series.len()))
    )]
    async fn save(&self, series: &CandleSeries) -> Result<(), KlineError> {
        let key = series.key();
        let path = self.path_for(series.symbol(), series.period());
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| storage_err(&key, e))?;
        }
        let record = RecordRef {
            symbol: series.symbol(),
            period: series.period(),
            last_updated: self.clock.now(),
            candles: series.candles(),
        };
        let bytes = serde_json::to_vec(&record).map_err(|e| storage_err(&key, e))?;
        Self::write_atomic(&path, &bytes)
            .await
            .map_err(|e| storage_err(&key, e))
    }

    async fn delete(&self, symbol: &Symbol, period: Period) -> Result<bool, KlineError> {
        match tokio::fs::remove_file(self.path_for(symbol, period)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_err(&SeriesKey::new(symbol.clone(), period), e)),
        }
    }

    async fn list_symbols(&self, period: Period) -> Result<Vec<Symbol>, KlineError> {
        let dir = self.root.join(period.as_str());
        let mut rd = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(KlineError::storage(dir.display().to_string(), e.to_string())),
        };
        let mut out = Vec::new();
        loop {
            let entry = match rd.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(KlineError::storage(dir.display().to_string(), e.to_string()));
                }
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXT) {
                continue;
            }
            // Unparseable names (stray files) are skipped.
            if let Some(sym) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Symbol::new(s).ok())
            {
                out.push(sym);
            }
        }
        out.sort();
        Ok(out)
    }
}
