// src/digest.rs
//! Digest Aggregator: a read-only rollup of the trailing window, grouped by
//! competitor.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::{ChangeStore, UpdateRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestGroup {
    pub competitor: String,
    pub records: Vec<UpdateRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Digest {
    pub generated_at: DateTime<Utc>,
    pub window_days: u32,
    pub groups: Vec<DigestGroup>,
}

impl Digest {
    pub fn total(&self) -> usize {
        self.groups.iter().map(|g| g.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn window_description(&self) -> String {
        match self.window_days {
            1 => "last 24 hours".to_string(),
            7 => "last 7 days (weekly)".to_string(),
            n => format!("last {n} days"),
        }
    }

    pub fn competitors(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.competitor.as_str()).collect()
    }
}

/// Group records by competitor. Groups appear in first-seen order and each
/// group keeps the input order of its records.
pub fn group_by_competitor(records: Vec<UpdateRecord>) -> Vec<DigestGroup> {
    let mut groups: Vec<DigestGroup> = Vec::new();
    for rec in records {
        match groups.iter_mut().find(|g| g.competitor == rec.competitor_name) {
            Some(g) => g.records.push(rec),
            None => groups.push(DigestGroup {
                competitor: rec.competitor_name.clone(),
                records: vec![rec],
            }),
        }
    }
    groups
}

pub fn build_digest(store: &dyn ChangeStore, days: u32) -> Result<Digest> {
    let records = store
        .window_query(days)
        .with_context(|| format!("window query for {days} days"))?;
    let digest = Digest {
        generated_at: Utc::now(),
        window_days: days,
        groups: group_by_competitor(records),
    };
    tracing::info!(
        days,
        competitors = digest.groups.len(),
        updates = digest.total(),
        "digest built"
    );
    Ok(digest)
}
