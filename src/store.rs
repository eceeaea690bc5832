// src/store.rs
//! Change Store: append-only log of observed content per source URL.
//!
//! Backed by a single SQLite table. Rows are never updated or deleted (enforced
//! by triggers); "last observed content" for a URL is the newest row for it.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use sha2::{Digest as _, Sha256};

use crate::config::SourceKind;

const SCHEMA_V1: &str = r"
CREATE TABLE IF NOT EXISTS competitor_updates (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  source_kind TEXT NOT NULL CHECK (source_kind IN ('changelog', 'blog', 'pricing', 'github')),
  source_url TEXT NOT NULL,
  competitor_name TEXT NOT NULL,
  raw_content TEXT NOT NULL,
  content_sha256 TEXT NOT NULL,
  summary TEXT NOT NULL CHECK (length(summary) > 0),
  observed_at_ms INTEGER NOT NULL
);

CREATE TRIGGER IF NOT EXISTS trg_competitor_updates_no_update
BEFORE UPDATE ON competitor_updates
BEGIN
  SELECT RAISE(FAIL, 'competitor_updates is append-only');
END;

CREATE TRIGGER IF NOT EXISTS trg_competitor_updates_no_delete
BEFORE DELETE ON competitor_updates
BEGIN
  SELECT RAISE(FAIL, 'competitor_updates is append-only');
END;

CREATE INDEX IF NOT EXISTS idx_competitor_updates_url_observed
  ON competitor_updates(source_url, observed_at_ms DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_competitor_updates_observed
  ON competitor_updates(observed_at_ms DESC, id DESC);
";

const SELECT_COLUMNS: &str = "id, source_kind, source_url, competitor_name, raw_content,
     content_sha256, summary, observed_at_ms";

/// Durable unit of the Change Store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateRecord {
    pub id: i64,
    pub source_kind: SourceKind,
    pub source_url: String,
    pub competitor_name: String,
    pub raw_content: String,
    pub content_sha256: String,
    pub summary: String,
    pub observed_at: DateTime<Utc>,
}

/// What the detector hands to `put`; id and timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUpdate {
    pub source_kind: SourceKind,
    pub source_url: String,
    pub competitor_name: String,
    pub raw_content: String,
    pub summary: String,
}

pub trait ChangeStore: Send + Sync {
    /// Append one record. Fails only on storage errors.
    fn put(&self, update: &NewUpdate) -> Result<UpdateRecord>;

    /// `raw_content` of the newest record for `source_url`.
    fn last_content_for(&self, source_url: &str) -> Result<Option<String>>;

    /// Records observed in the trailing `days`, newest first.
    fn window_query(&self, days: u32) -> Result<Vec<UpdateRecord>>;
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct SqliteChangeStore {
    conn: Mutex<Connection>,
    clock: Clock,
}

impl SqliteChangeStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_V1)
            .context("failed to apply competitor_updates schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: Arc::new(Utc::now),
        })
    }

    /// Replace the timestamp source. Insert times stay store-assigned.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("change store connection mutex poisoned"))
    }

    /// Lower bound of the window; a window reaching past the calendar covers everything.
    fn cutoff_ms(&self, days: u32) -> i64 {
        ChronoDuration::try_days(i64::from(days))
            .and_then(|span| (self.clock)().checked_sub_signed(span))
            .map_or(i64::MIN, |t| t.timestamp_millis())
    }

    /// Window query narrowed to one competitor, newest first.
    pub fn competitor_window(&self, competitor: &str, days: u32) -> Result<Vec<UpdateRecord>> {
        let cutoff = self.cutoff_ms(days);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS}
             FROM competitor_updates
             WHERE competitor_name = ?1 AND observed_at_ms >= ?2
             ORDER BY observed_at_ms DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![competitor, cutoff], parse_record_row)?;
        collect_rows(rows)
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM competitor_updates", [], |row| row.get(0))
            .context("failed to count competitor_updates")
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ChangeStore for SqliteChangeStore {
    fn put(&self, update: &NewUpdate) -> Result<UpdateRecord> {
        if update.summary.trim().is_empty() {
            return Err(anyhow!(
                "refusing to store empty summary for {}",
                update.source_url
            ));
        }

        let observed_at = (self.clock)();
        let sha = fingerprint(&update.raw_content);
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO competitor_updates(
                source_kind, source_url, competitor_name, raw_content,
                content_sha256, summary, observed_at_ms
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                update.source_kind.as_str(),
                update.source_url,
                update.competitor_name,
                update.raw_content,
                sha,
                update.summary,
                observed_at.timestamp_millis(),
            ],
        )
        .with_context(|| format!("failed to append update for {}", update.source_url))?;
        let id = conn.last_insert_rowid();

        Ok(UpdateRecord {
            id,
            source_kind: update.source_kind,
            source_url: update.source_url.clone(),
            competitor_name: update.competitor_name.clone(),
            raw_content: update.raw_content.clone(),
            content_sha256: sha,
            summary: update.summary.clone(),
            observed_at: truncate_to_millis(observed_at),
        })
    }

    fn last_content_for(&self, source_url: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT raw_content FROM competitor_updates
             WHERE source_url = ?1
             ORDER BY observed_at_ms DESC, id DESC
             LIMIT 1",
            params![source_url],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("failed to read last content for {source_url}"))
    }

    fn window_query(&self, days: u32) -> Result<Vec<UpdateRecord>> {
        let cutoff = self.cutoff_ms(days);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS}
             FROM competitor_updates
             WHERE observed_at_ms >= ?1
             ORDER BY observed_at_ms DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![cutoff], parse_record_row)?;
        collect_rows(rows)
    }
}

/// SHA-256 hex of the content, for logs and listings.
pub fn fingerprint(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

fn parse_record_row(row: &Row<'_>) -> rusqlite::Result<UpdateRecord> {
    let kind_raw: String = row.get(1)?;
    let source_kind = kind_raw.parse::<SourceKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            Box::<dyn std::error::Error + Send + Sync>::from(e),
        )
    })?;
    let observed_ms: i64 = row.get(7)?;
    let observed_at = DateTime::from_timestamp_millis(observed_ms).ok_or(
        rusqlite::Error::IntegralValueOutOfRange(7, observed_ms),
    )?;

    Ok(UpdateRecord {
        id: row.get(0)?,
        source_kind,
        source_url: row.get(2)?,
        competitor_name: row.get(3)?,
        raw_content: row.get(4)?,
        content_sha256: row.get(5)?,
        summary: row.get(6)?,
        observed_at,
    })
}

fn collect_rows<I>(rows: I) -> Result<Vec<UpdateRecord>>
where
    I: Iterator<Item = rusqlite::Result<UpdateRecord>>,
{
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("failed to decode competitor_updates row")?);
    }
    Ok(out)
}
