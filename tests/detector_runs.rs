// tests/detector_runs.rs
//
// End-to-end runs over a scripted scraper, an in-memory store and counting
// channels. No network.
//
// Covered:
// - first observation is a change, an identical re-scrape is not
// - N distinct contents produce exactly N records
// - a changed page carries its previous content into the event
// - dispatches only happen for detected changes

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use competitor_tracker::config::{Locator, Source, SourceKind, SourceRegistry};
use competitor_tracker::notify::Notifier;
use competitor_tracker::scrape::Scraper;
use competitor_tracker::{
    ChangeDetector, ChangeStore, Digest, Dispatcher, SqliteChangeStore, Summarizer, Tracker,
    UpdateEvent,
};

const CHANGELOG: &str = "https://x.com/changelog";

/// Returns whatever the test last set for a URL.
#[derive(Default)]
struct Scripted(Mutex<HashMap<String, String>>);

impl Scripted {
    fn set(&self, url: &str, body: &str) {
        self.0
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }
}

#[async_trait]
impl Scraper for Scripted {
    async fn fetch(&self, _kind: SourceKind, locator: &Locator) -> Result<Option<String>> {
        let Locator::Url(url) = locator else {
            return Ok(None);
        };
        Ok(self.0.lock().unwrap().get(url).cloned())
    }
}

struct Counting {
    name: &'static str,
    events: AtomicUsize,
}

impl Counting {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            events: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Notifier for Counting {
    fn name(&self) -> &'static str {
        self.name
    }
    async fn notify(&self, _ev: &UpdateEvent, _at: DateTime<Utc>) -> Result<()> {
        self.events.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn notify_digest(&self, _d: &Digest) -> Result<()> {
        Ok(())
    }
}

struct Harness {
    tracker: Tracker,
    scraper: Arc<Scripted>,
    store: Arc<SqliteChangeStore>,
    slack: Arc<Counting>,
    notion: Arc<Counting>,
}

fn harness(sources: Vec<Source>) -> Harness {
    let scraper = Arc::new(Scripted::default());
    let store = Arc::new(SqliteChangeStore::open_in_memory().expect("in-memory store"));
    let slack = Counting::new("slack");
    let notion = Counting::new("notion");

    let detector = ChangeDetector::new(
        Arc::new(SourceRegistry::new(sources).expect("registry")),
        scraper.clone(),
        store.clone(),
        Arc::new(Summarizer::disabled()),
    );
    let dispatcher = Dispatcher::new(vec![
        slack.clone() as Arc<dyn Notifier>,
        notion.clone() as Arc<dyn Notifier>,
    ]);
    let tracker = Tracker::new(detector, dispatcher, store.clone());
    Harness {
        tracker,
        scraper,
        store,
        slack,
        notion,
    }
}

#[tokio::test]
async fn unchanged_content_is_not_recorded_or_dispatched_twice() {
    let h = harness(vec![Source::url("X", SourceKind::Changelog, CHANGELOG)]);
    h.scraper.set(CHANGELOG, "v2 released");

    let first = h.tracker.run().await.expect("first run");
    assert_eq!(first.report.detected(), 1);
    assert_eq!(h.store.count().unwrap(), 1);
    assert_eq!(first.dispatch.delivered(), 2, "one delivery per channel");

    let ev = &first.report.events[0];
    assert_eq!(ev.competitor_name, "X");
    assert_eq!(ev.source_kind, SourceKind::Changelog);
    assert_eq!(ev.raw_content, "v2 released");
    assert!(ev.previous_content.is_none());
    assert!(!ev.summary.trim().is_empty());

    let second = h.tracker.run().await.expect("second run");
    assert_eq!(second.report.detected(), 0);
    assert_eq!(second.report.unchanged, 1);
    assert_eq!(second.dispatch.deliveries.len(), 0);
    assert_eq!(h.store.count().unwrap(), 1, "store size unchanged");

    assert_eq!(h.slack.events.load(Ordering::SeqCst), 1);
    assert_eq!(h.notion.events.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn each_distinct_content_is_recorded_exactly_once() {
    let h = harness(vec![Source::url("X", SourceKind::Changelog, CHANGELOG)]);
    let versions = ["v1 released", "v2 released", "v3 released", "v4 released"];

    for v in versions {
        h.scraper.set(CHANGELOG, v);
        h.tracker.run().await.expect("run");
        // re-scrape of the same content between changes
        h.tracker.run().await.expect("repeat run");
    }

    assert_eq!(h.store.count().unwrap(), versions.len() as i64);
    let latest = h.store.last_content_for(CHANGELOG).unwrap();
    assert_eq!(latest.as_deref(), Some("v4 released"));
    assert_eq!(h.slack.events.load(Ordering::SeqCst), versions.len());
}

#[tokio::test]
async fn changed_page_reports_previous_content() {
    let h = harness(vec![Source::url("X", SourceKind::Pricing, "https://x.com/pricing")]);
    h.scraper.set("https://x.com/pricing", "Pricing info: $10, Pro");
    h.tracker.run().await.expect("seed run");

    h.scraper.set("https://x.com/pricing", "Pricing info: $12, Pro");
    let out = h.tracker.run().await.expect("run");
    assert_eq!(out.report.detected(), 1);
    let ev = &out.report.events[0];
    assert_eq!(ev.previous_content.as_deref(), Some("Pricing info: $10, Pro"));
    assert_eq!(ev.raw_content, "Pricing info: $12, Pro");
}

#[tokio::test]
async fn sources_without_content_are_counted_not_recorded() {
    let h = harness(vec![
        Source::url("X", SourceKind::Blog, "https://x.com/blog"),
        Source::url("Y", SourceKind::Blog, "https://y.com/blog"),
    ]);
    h.scraper.set("https://y.com/blog", "Introducing Y2");

    let out = h.tracker.run().await.expect("run");
    assert_eq!(out.report.checked, 2);
    assert_eq!(out.report.no_content, 1);
    assert_eq!(out.report.detected(), 1);
    assert_eq!(h.store.window_query(1).unwrap().len(), 1);
}
