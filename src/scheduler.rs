//! Refresh Scheduler - Fires a batch of refresh ops on a fixed interval
//!
//! Ops are spawned into a `JoinSet` owned by the scheduler task and are
//! never awaited before the next tick. Shutting the handle down (or
//! dropping it) stops ticking and aborts whatever is still in flight.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_REFRESH_INTERVAL_MS;

/// Result of one op invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshOutcome {
    /// New value written
    Updated,
    /// A newer tick already wrote this dataset
    Superseded,
    /// Fetch failed; previous value kept
    Failed,
}

/// Zero-argument background operation run on every tick
#[async_trait]
pub trait RefreshOp: Send + Sync {
    fn name(&self) -> &'static str;

    /// Must not panic or propagate failures; report them as `Failed`
    async fn refresh(&self, tick: u64) -> RefreshOutcome;
}

/// Counters collected by the scheduler task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStats {
    pub batches: u64,
    pub updated: u64,
    pub superseded: u64,
    pub failed: u64,
    pub panicked: u64,
    /// Ops still running when the scheduler stopped
    pub aborted: u64,
}

impl RefreshStats {
    fn record(&mut self, outcome: RefreshOutcome) {
        match outcome {
            RefreshOutcome::Updated => self.updated += 1,
            RefreshOutcome::Superseded => self.superseded += 1,
            RefreshOutcome::Failed => self.failed += 1,
        }
    }
}

/// Builder for a repeating refresh task
pub struct RefreshScheduler {
    ops: Vec<Arc<dyn RefreshOp>>,
    interval: Duration,
    fire_immediately: bool,
}

impl RefreshScheduler {
    /// A zero `interval` falls back to the default refresh interval
    pub fn new(interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!(
                fallback_ms = DEFAULT_REFRESH_INTERVAL_MS,
                "zero refresh interval, using default"
            );
            Duration::from_millis(DEFAULT_REFRESH_INTERVAL_MS)
        } else {
            interval
        };
        Self {
            ops: Vec::new(),
            interval,
            fire_immediately: false,
        }
    }

    pub fn with_op(mut self, op: Arc<dyn RefreshOp>) -> Self {
        self.ops.push(op);
        self
    }

    pub fn with_ops(mut self, ops: impl IntoIterator<Item = Arc<dyn RefreshOp>>) -> Self {
        self.ops.extend(ops);
        self
    }

    /// Issue the first batch at t=0 instead of t=interval
    pub fn fire_immediately(mut self, yes: bool) -> Self {
        self.fire_immediately = yes;
        self
    }

    /// Start ticking on the current runtime
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let ticks = Arc::new(AtomicU64::new(0));

        info!(
            ops = self.ops.len(),
            interval_ms = self.interval.as_millis() as u64,
            "⏱️ Refresh scheduler started"
        );

        let task = tokio::spawn(self.run(shutdown_rx, ticks.clone()));
        SchedulerHandle {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
            ticks,
        }
    }

    async fn run(self, mut shutdown_rx: oneshot::Receiver<()>, ticks: Arc<AtomicU64>) -> RefreshStats {
        let start = if self.fire_immediately {
            Instant::now()
        } else {
            Instant::now() + self.interval
        };
        let mut timer = interval_at(start, self.interval);
        let mut in_flight: JoinSet<(&'static str, u64, RefreshOutcome)> = JoinSet::new();
        let mut stats = RefreshStats::default();

        loop {
            tokio::select! {
                biased;

                // Explicit shutdown or handle dropped
                _ = &mut shutdown_rx => break,

                _ = timer.tick() => {
                    let tick = ticks.fetch_add(1, Ordering::SeqCst) + 1;
                    stats.batches += 1;
                    debug!(tick, ops = self.ops.len(), in_flight = in_flight.len(), "issuing refresh batch");

                    for op in &self.ops {
                        let op = op.clone();
                        in_flight.spawn(async move {
                            let outcome = op.refresh(tick).await;
                            (op.name(), tick, outcome)
                        });
                    }
                }

                Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                    match done {
                        Ok((name, tick, outcome)) => {
                            debug!(op = name, tick, ?outcome, "refresh op finished");
                            stats.record(outcome);
                        }
                        Err(e) if e.is_panic() => {
                            warn!(error = %e, "refresh op panicked");
                            stats.panicked += 1;
                        }
                        Err(_) => {}
                    }
                }
            }
        }

        stats.aborted = in_flight.len() as u64;
        in_flight.shutdown().await;
        info!(
            batches = stats.batches,
            aborted = stats.aborted,
            "⏹️ Refresh scheduler stopped"
        );
        stats
    }
}

/// Owner of a running scheduler. Dropping it cancels the scheduler.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<RefreshStats>>,
    ticks: Arc<AtomicU64>,
}

impl SchedulerHandle {
    /// Batches issued so far
    pub fn ticks_issued(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Shared tick counter, readable after the handle moves elsewhere
    pub fn tick_counter(&self) -> Arc<AtomicU64> {
        self.ticks.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Stop ticking and wait until no op is in flight
    pub async fn shutdown(mut self) -> RefreshStats {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match self.task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => RefreshStats::default(),
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
