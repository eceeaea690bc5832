// src/scheduler.rs
//! Periodic runs and digests for the service binary.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::Settings;
use crate::pipeline::{RunError, RunPermit, Tracker};

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub run_interval: Duration,
    pub digest_interval: Duration,
    pub run_budget: Duration,
    pub digest_days: u32,
}

impl SchedulerCfg {
    pub fn from_settings(s: &Settings) -> Self {
        Self {
            run_interval: Duration::from_secs(s.run_interval_secs),
            digest_interval: Duration::from_secs(s.digest_interval_secs),
            run_budget: s.run_budget(),
            digest_days: s.digest_days,
        }
    }
}

/// Run under a wall-clock budget. A run over budget is dropped and recorded
/// as failed; records it already wrote stay, and the run slot is released
/// with the permit.
pub async fn run_within_budget(tracker: &Tracker, permit: RunPermit, budget: Duration) {
    let started_at = Utc::now();
    match tokio::time::timeout(budget, tracker.run_with(permit)).await {
        Ok(Ok(out)) => info!(
            updates = out.report.detected(),
            delivered = out.dispatch.delivered(),
            "scheduled run done"
        ),
        Ok(Err(e)) => warn!(error = %e, "run failed"),
        Err(_) => {
            warn!(budget_secs = budget.as_secs(), "run exceeded its budget and was abandoned");
            tracker.record_abandoned(started_at, budget);
        }
    }
}

/// First run fires immediately; the first digest after one digest interval.
pub fn spawn(tracker: Arc<Tracker>, cfg: SchedulerCfg) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut runs = interval_at(Instant::now(), cfg.run_interval);
        let mut digests = interval_at(Instant::now() + cfg.digest_interval, cfg.digest_interval);
        runs.set_missed_tick_behavior(MissedTickBehavior::Delay);
        digests.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            run_interval_secs = cfg.run_interval.as_secs(),
            digest_interval_secs = cfg.digest_interval.as_secs(),
            "scheduler started"
        );

        loop {
            tokio::select! {
                _ = runs.tick() => match tracker.try_begin() {
                    Ok(permit) => run_within_budget(&tracker, permit, cfg.run_budget).await,
                    Err(RunError::AlreadyRunning) => info!("previous run still in flight, tick skipped"),
                    Err(e) => warn!(error = %e, "could not start run"),
                },
                _ = digests.tick() => match tracker.digest(cfg.digest_days).await {
                    Ok((digest, report)) => info!(
                        updates = digest.total(),
                        delivered = report.delivered(),
                        failed = report.failed(),
                        "scheduled digest done"
                    ),
                    Err(e) => warn!(error = %format!("{e:#}"), "digest failed"),
                },
            }
        }
    })
}
