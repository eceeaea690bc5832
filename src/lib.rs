// src/lib.rs
// Public library surface for the service, the CLI and integration tests.

pub mod api;
pub mod config;
pub mod detector;
pub mod digest;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod scrape;
pub mod store;
pub mod summarize;

use std::sync::Arc;

use anyhow::{Context, Result};

pub use crate::api::create_router;
pub use crate::detector::{ChangeDetector, RunReport, UpdateEvent};
pub use crate::digest::{build_digest, Digest, DigestGroup};
pub use crate::notify::{Dispatcher, Notifier};
pub use crate::pipeline::{RunError, Tracker};
pub use crate::store::{ChangeStore, SqliteChangeStore, UpdateRecord};
pub use crate::summarize::Summarizer;

use crate::config::{Settings, SourceRegistry};
use crate::scrape::HttpScraper;

/// Wire the live tracker from settings: SQLite store, HTTP scraper, the
/// configured summarizer and every configured channel.
pub fn build_tracker(settings: &Settings) -> Result<Arc<Tracker>> {
    let registry = SourceRegistry::load_default().context("loading competitor registry")?;
    let store: Arc<dyn ChangeStore> = Arc::new(
        SqliteChangeStore::open(&settings.db_path).context("opening change store")?,
    );
    let scraper = HttpScraper::from_env().context("building scraper")?;
    let summarizer = Summarizer::from_config(&settings.ai);

    tracing::info!(
        sources = registry.len(),
        competitors = registry.competitors().len(),
        db = %settings.db_path.display(),
        ai = summarizer.ai_enabled(),
        "tracker configured"
    );

    let detector = ChangeDetector::new(
        Arc::new(registry),
        Arc::new(scraper),
        store.clone(),
        Arc::new(summarizer),
    );
    Ok(Arc::new(Tracker::new(detector, Dispatcher::from_env(), store)))
}
