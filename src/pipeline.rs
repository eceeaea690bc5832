// src/pipeline.rs
//! One tracker run: detect, then dispatch. Runs are serialized per process
//! because the detector's read-compare-write on the store is not atomic
//! across sources; two overlapping runs could both record the same change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::detector::{ChangeDetector, RunReport};
use crate::digest::{build_digest, Digest};
use crate::notify::{DispatchReport, Dispatcher};
use crate::store::ChangeStore;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("a run is already in progress")]
    AlreadyRunning,
    #[error("run aborted on storage failure: {0:#}")]
    Storage(anyhow::Error),
}

/// Proof that the caller holds the run slot. Released on drop.
#[derive(Debug)]
pub struct RunPermit {
    flag: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Completed,
    Failed,
}

/// Summary of the most recent run, for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: RunState,
    pub sources_checked: usize,
    pub updates_detected: usize,
    pub sources_failed: usize,
    pub deliveries_ok: usize,
    pub deliveries_failed: usize,
    pub error: Option<String>,
}

impl RunSummary {
    fn failed(started_at: DateTime<Utc>, finished_at: DateTime<Utc>, error: String) -> Self {
        Self {
            started_at,
            finished_at,
            state: RunState::Failed,
            sources_checked: 0,
            updates_detected: 0,
            sources_failed: 0,
            deliveries_ok: 0,
            deliveries_failed: 0,
            error: Some(error),
        }
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub dispatch: DispatchReport,
}

pub struct Tracker {
    detector: ChangeDetector,
    dispatcher: Dispatcher,
    store: Arc<dyn ChangeStore>,
    running: Arc<AtomicBool>,
    last_run: RwLock<Option<RunSummary>>,
}

impl Tracker {
    pub fn new(detector: ChangeDetector, dispatcher: Dispatcher, store: Arc<dyn ChangeStore>) -> Self {
        Self {
            detector,
            dispatcher,
            store,
            running: Arc::new(AtomicBool::new(false)),
            last_run: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn ChangeStore> {
        &self.store
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn last_run(&self) -> Option<RunSummary> {
        self.last_run.read().ok().and_then(|g| g.clone())
    }

    /// Claim the run slot, or fail if another run holds it.
    pub fn try_begin(&self) -> Result<RunPermit, RunError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| RunPermit {
                flag: self.running.clone(),
            })
            .map_err(|_| RunError::AlreadyRunning)
    }

    pub async fn run(&self) -> Result<RunOutcome, RunError> {
        let permit = self.try_begin()?;
        self.run_with(permit).await
    }

    /// Run while holding `permit`, so a caller can claim the slot before
    /// handing the work to a background task.
    pub async fn run_with(&self, permit: RunPermit) -> Result<RunOutcome, RunError> {
        let started_at = Utc::now();
        let t0 = Instant::now();
        counter!("tracker_runs_total").increment(1);

        let result = match self.detector.run_once().await {
            Ok(report) => {
                let dispatch = self.dispatcher.dispatch(&report.events).await;
                Ok(RunOutcome { report, dispatch })
            }
            Err(e) => Err(RunError::Storage(e)),
        };

        let finished_at = Utc::now();
        gauge!("tracker_last_run_ts").set(finished_at.timestamp() as f64);
        let summary = match &result {
            Ok(out) => {
                info!(
                    updates = out.report.detected(),
                    sources_failed = out.report.failed,
                    delivered = out.dispatch.delivered(),
                    delivery_failures = out.dispatch.failed(),
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "run completed"
                );
                RunSummary {
                    started_at,
                    finished_at,
                    state: RunState::Completed,
                    sources_checked: out.report.checked,
                    updates_detected: out.report.detected(),
                    sources_failed: out.report.failed,
                    deliveries_ok: out.dispatch.delivered(),
                    deliveries_failed: out.dispatch.failed(),
                    error: None,
                }
            }
            Err(e) => {
                error!(error = %e, "run failed");
                RunSummary::failed(started_at, finished_at, e.to_string())
            }
        };
        self.set_last_run(summary);
        drop(permit);
        result
    }

    /// Record a run that was cut off before it could report.
    pub fn record_abandoned(&self, started_at: DateTime<Utc>, budget: Duration) {
        let finished_at = Utc::now();
        gauge!("tracker_last_run_ts").set(finished_at.timestamp() as f64);
        self.set_last_run(RunSummary::failed(
            started_at,
            finished_at,
            format!("run exceeded its budget of {}s", budget.as_secs()),
        ));
    }

    fn set_last_run(&self, summary: RunSummary) {
        if let Ok(mut g) = self.last_run.write() {
            *g = Some(summary);
        }
    }

    /// Build the digest for the trailing `days` and send it on every channel.
    pub async fn digest(&self, days: u32) -> Result<(Digest, DispatchReport)> {
        let digest = build_digest(self.store.as_ref(), days)?;
        let report = self.dispatcher.dispatch_digest(&digest).await;
        Ok((digest, report))
    }
}
