//! Periodic background refresh of a fixed symbol set.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use kline_core::{KlineError, Period, Symbol};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::batch::BatchScheduler;

/// What a refresh task runs on every tick.
#[derive(Debug, Clone)]
pub struct RefreshPlan {
    /// Symbols to keep warm.
    pub symbols: Vec<Symbol>,
    /// Candle period.
    pub period: Period,
    /// Minimum series length requested per symbol.
    pub limit: usize,
    /// Tick interval.
    pub every: Duration,
    /// Concurrency ceiling for each tick's batch.
    pub max_concurrency: usize,
}

/// Handle to a running refresh task.
///
/// Dropping the handle aborts the task; [`RefreshHandle::stop`] lets the
/// current tick finish first.
pub struct RefreshHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
}

impl RefreshHandle {
    /// Number of ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Signal the task to stop after its current tick and wait for it.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

/// Spawn a task that runs `plan` through `scheduler` every `plan.every`.
///
/// The first tick fires immediately. A slow tick delays the next one rather
/// than bursting to catch up.
///
/// # Errors
/// Returns `InvalidArg` for a zero interval or zero concurrency.
pub fn spawn_refresh(
    scheduler: Arc<BatchScheduler>,
    plan: RefreshPlan,
) -> Result<RefreshHandle, KlineError> {
    if plan.every.is_zero() {
        return Err(KlineError::InvalidArg(
            "refresh interval must be non-zero".into(),
        ));
    }
    if plan.max_concurrency == 0 {
        return Err(KlineError::InvalidArg(
            "max_concurrency must be at least 1".into(),
        ));
    }

    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let ticks = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&ticks);

    let join = tokio::spawn(async move {
        let mut interval = tokio::time::interval(plan.every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                _ = interval.tick() => {
                    let res = scheduler
                        .run(&plan.symbols, plan.period, plan.limit, plan.max_concurrency, None)
                        .await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    match &res {
                        Ok(_report) => {
                            #[cfg(feature = "tracing")]
                            tracing::debug!(
                                ok = _report.succeeded(),
                                failed = _report.failures.len(),
                                warnings = _report.warnings.len(),
                                "refresh tick"
                            );
                        }
                        Err(_e) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(error = %_e, "refresh tick rejected");
                        }
                    }
                }
            }
        }
    });

    Ok(RefreshHandle {
        stop_tx: Some(stop_tx),
        join: Some(join),
        ticks,
    })
}
