// src/metrics.rs
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already set.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe();
        gauge!("tracker_last_run_ts").set(0.0);
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("tracker_runs_total", "Tracker runs started");
    describe_counter!("tracker_updates_detected_total", "Source changes detected and recorded");
    describe_counter!("tracker_source_errors_total", "Sources skipped because scraping or summarizing failed");
    describe_counter!("tracker_summaries_total", "Summaries produced, by mode (ai or fallback)");
    describe_counter!("notify_deliveries_total", "Channel delivery attempts, by channel and outcome");
    describe_gauge!("tracker_last_run_ts", "Unix time the last run finished");
}
