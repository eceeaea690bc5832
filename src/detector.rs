// src/detector.rs
//! Change detection: scrape every registered source, compare against the
//! last stored observation, summarize and persist what changed.

use std::sync::Arc;

use anyhow::{Context, Result};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Source, SourceKind, SourceRegistry};
use crate::scrape::Scraper;
use crate::store::{ChangeStore, NewUpdate};
use crate::summarize::Summarizer;

/// One detected change, handed to the dispatcher and dropped after the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateEvent {
    pub competitor_name: String,
    pub source_kind: SourceKind,
    pub source_url: String,
    /// Human-facing URL; differs from `source_url` for GitHub sources.
    pub link: String,
    pub raw_content: String,
    pub previous_content: Option<String>,
    pub summary: String,
}

impl UpdateEvent {
    /// "Linear Changelog"
    pub fn title(&self) -> String {
        format!("{} {}", self.competitor_name, self.source_kind.label())
    }
}

/// Outcome of one pass over the registry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub events: Vec<UpdateEvent>,
    pub checked: usize,
    pub unchanged: usize,
    pub no_content: usize,
    pub failed: usize,
}

impl RunReport {
    pub fn detected(&self) -> usize {
        self.events.len()
    }
}

enum SourceOutcome {
    Changed(UpdateEvent),
    Unchanged,
    NoContent,
}

pub struct ChangeDetector {
    registry: Arc<SourceRegistry>,
    scraper: Arc<dyn Scraper>,
    store: Arc<dyn ChangeStore>,
    summarizer: Arc<Summarizer>,
}

impl ChangeDetector {
    pub fn new(
        registry: Arc<SourceRegistry>,
        scraper: Arc<dyn Scraper>,
        store: Arc<dyn ChangeStore>,
        summarizer: Arc<Summarizer>,
    ) -> Self {
        Self {
            registry,
            scraper,
            store,
            summarizer,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Process every source once, in registry order.
    ///
    /// Scrape and summarize failures are counted and skipped. A storage
    /// failure aborts the run, since later comparisons would be unreliable.
    pub async fn run_once(&self) -> Result<RunReport> {
        let mut report = RunReport::default();
        info!(sources = self.registry.len(), "change detection started");

        for source in self.registry.sources() {
            report.checked += 1;
            match self.check_source(source).await {
                Ok(SourceOutcome::Changed(ev)) => report.events.push(ev),
                Ok(SourceOutcome::Unchanged) => report.unchanged += 1,
                Ok(SourceOutcome::NoContent) => report.no_content += 1,
                Err(SourceError::Source(e)) => {
                    report.failed += 1;
                    counter!("tracker_source_errors_total", "kind" => source.kind.as_str())
                        .increment(1);
                    warn!(
                        competitor = %source.competitor,
                        kind = %source.kind,
                        source_url = %source.source_url(),
                        error = %format!("{e:#}"),
                        "source skipped this run"
                    );
                }
                Err(SourceError::Storage(e)) => {
                    return Err(e).with_context(|| {
                        format!("change store failed at {}", source.source_url())
                    });
                }
            }
        }

        counter!("tracker_updates_detected_total").increment(report.detected() as u64);
        info!(
            checked = report.checked,
            detected = report.detected(),
            unchanged = report.unchanged,
            no_content = report.no_content,
            failed = report.failed,
            "change detection finished"
        );
        Ok(report)
    }

    async fn check_source(&self, source: &Source) -> Result<SourceOutcome, SourceError> {
        let source_url = source.source_url();

        let current = self
            .scraper
            .fetch(source.kind, &source.locator)
            .await
            .map_err(SourceError::Source)?;
        let Some(current) = current.filter(|c| !c.trim().is_empty()) else {
            debug!(competitor = %source.competitor, kind = %source.kind, %source_url, "no content observed");
            return Ok(SourceOutcome::NoContent);
        };

        let previous = self
            .store
            .last_content_for(&source_url)
            .map_err(SourceError::Storage)?;
        if previous.as_deref() == Some(current.as_str()) {
            debug!(competitor = %source.competitor, kind = %source.kind, %source_url, "no change");
            return Ok(SourceOutcome::Unchanged);
        }

        let summary = self
            .summarizer
            .summarize(&current, source.kind, Some(&source.competitor))
            .await
            .map_err(|e| SourceError::Source(e.into()))?;

        let record = self
            .store
            .put(&NewUpdate {
                source_kind: source.kind,
                source_url: source_url.clone(),
                competitor_name: source.competitor.clone(),
                raw_content: current.clone(),
                summary: summary.clone(),
            })
            .map_err(SourceError::Storage)?;

        info!(
            competitor = %source.competitor,
            kind = %source.kind,
            %source_url,
            record_id = record.id,
            sha256 = %record.content_sha256,
            first_seen = previous.is_none(),
            "change detected"
        );

        Ok(SourceOutcome::Changed(UpdateEvent {
            competitor_name: source.competitor.clone(),
            source_kind: source.kind,
            source_url,
            link: source.link(),
            raw_content: current,
            previous_content: previous,
            summary,
        }))
    }
}

enum SourceError {
    Source(anyhow::Error),
    Storage(anyhow::Error),
}
