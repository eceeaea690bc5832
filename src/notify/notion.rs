// src/notify/notion.rs
//! Notion channel. The configured id may name a page (updates become child
//! pages) or a database (updates become rows); which one is found out by
//! probing the API at send time.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::render::{before_after, content_preview, stamp, summary_body};
use super::Channel;
use crate::config::env_opt;
use crate::detector::UpdateEvent;
use crate::digest::Digest;

pub const NOTION_API: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
const RICH_TEXT_CHARS: usize = 2000;
const MAX_BLOCKS: usize = 100;
const BEFORE_AFTER_CHARS: usize = 1000;
const PREVIEW_CHARS: usize = 1000;

/// Where a document is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceDestination {
    Page(String),
    Database(String),
}

impl WorkspaceDestination {
    pub fn id(&self) -> &str {
        match self {
            Self::Page(id) | Self::Database(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Page(_) => "page",
            Self::Database(_) => "database",
        }
    }

    /// Body for `POST /pages` that files `doc` under this destination.
    pub fn create_request(&self, doc: &NotionDocument, today: NaiveDate) -> Value {
        match self {
            Self::Page(id) => json!({
                "parent": { "page_id": id },
                "properties": {
                    "title": { "title": rich_text(&doc.title) }
                },
                "children": doc.blocks,
            }),
            Self::Database(id) => json!({
                "parent": { "database_id": id },
                "properties": {
                    "Title": { "title": rich_text(&doc.title) },
                    "Summary": { "rich_text": rich_text(&doc.summary) },
                    "Source Type": { "select": { "name": doc.source_type } },
                    "Date": { "date": { "start": today.format("%Y-%m-%d").to_string() } },
                    "Competitor": { "rich_text": rich_text(&doc.competitor) },
                },
                "children": doc.blocks,
            }),
        }
    }
}

/// Destination-independent document; the variant is chosen at send time.
#[derive(Debug, Clone, PartialEq)]
pub struct NotionDocument {
    pub title: String,
    pub competitor: String,
    pub source_type: String,
    pub summary: String,
    pub blocks: Vec<Value>,
}

pub struct NotionChannel {
    client: Client,
    api_key: String,
    target_id: String,
    api_base: String,
    cached: Mutex<Option<WorkspaceDestination>>,
}

impl NotionChannel {
    pub fn new(api_key: &str, target_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building notion http client")?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            target_id: target_id.trim().replace('-', ""),
            api_base: NOTION_API.to_string(),
            cached: Mutex::new(None),
        })
    }

    /// `NOTION_API_KEY` and `NOTION_PAGE_ID`; `None` unless both are set.
    pub fn from_env() -> Result<Option<Self>> {
        match (env_opt("NOTION_API_KEY"), env_opt("NOTION_PAGE_ID")) {
            (Some(key), Some(id)) => Self::new(&key, &id).map(Some),
            _ => Ok(None),
        }
    }

    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
    }

    /// Resolve the destination, checking once. Inconclusive checks fall back
    /// to a page and are retried on the next send.
    pub async fn destination(&self) -> WorkspaceDestination {
        if let Some(d) = self.cached.lock().ok().and_then(|c| c.clone()) {
            return d;
        }
        match self.lookup().await {
            Some(d) => {
                info!(channel = "notion", destination = d.kind(), "notion destination detected");
                if let Ok(mut c) = self.cached.lock() {
                    *c = Some(d.clone());
                }
                d
            }
            None => {
                warn!(
                    channel = "notion",
                    id = %self.target_id,
                    "could not tell whether notion id is a page or a database, trying as page"
                );
                WorkspaceDestination::Page(self.target_id.clone())
            }
        }
    }

    async fn lookup(&self) -> Option<WorkspaceDestination> {
        let id = &self.target_id;
        let page = self
            .authed(self.client.get(format!("{}/pages/{id}", self.api_base)))
            .send()
            .await;
        match page {
            Ok(rsp) if rsp.status().is_success() => {
                return Some(WorkspaceDestination::Page(id.clone()));
            }
            Ok(rsp) if rsp.status() == StatusCode::BAD_REQUEST => {
                let body = rsp.text().await.unwrap_or_default();
                if body.to_lowercase().contains("database") {
                    return Some(WorkspaceDestination::Database(id.clone()));
                }
            }
            Ok(rsp) => debug!(status = %rsp.status(), "notion page lookup rejected"),
            Err(e) => debug!(error = %e, "notion page lookup failed"),
        }

        match self
            .authed(self.client.get(format!("{}/databases/{id}", self.api_base)))
            .send()
            .await
        {
            Ok(rsp) if rsp.status().is_success() => Some(WorkspaceDestination::Database(id.clone())),
            Ok(rsp) => {
                debug!(status = %rsp.status(), "notion database lookup rejected");
                None
            }
            Err(e) => {
                debug!(error = %e, "notion database lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl Channel for NotionChannel {
    const NAME: &'static str = "notion";
    type Payload = NotionDocument;

    fn format(&self, ev: &UpdateEvent, at: DateTime<Utc>) -> NotionDocument {
        let title = format!("{} {} Update - {}", ev.competitor_name, ev.source_kind.label(), stamp(at));
        let summary = summary_body(&ev.summary).to_string();

        let mut blocks = vec![
            paragraph(&format!("Posted: {}", stamp(at))),
            paragraph(&format!("Source Type: {}", ev.source_kind.label())),
            paragraph(&format!("Source URL: {}", ev.link)),
            heading(2, "Summary"),
        ];
        blocks.extend(text_blocks(&summary));
        if let Some((before, after)) = before_after(ev, BEFORE_AFTER_CHARS) {
            blocks.push(heading(2, "Before"));
            blocks.push(paragraph(&before));
            blocks.push(heading(2, "After"));
            blocks.push(paragraph(&after));
        } else if let Some(preview) = content_preview(ev, PREVIEW_CHARS) {
            blocks.push(heading(2, "Full Content"));
            blocks.push(paragraph(&preview));
        }
        blocks.truncate(MAX_BLOCKS);

        NotionDocument {
            title,
            competitor: ev.competitor_name.clone(),
            source_type: ev.source_kind.as_str().to_string(),
            summary,
            blocks,
        }
    }

    fn format_digest(&self, digest: &Digest) -> NotionDocument {
        let mut blocks = vec![
            paragraph(&format!("Period: {}", digest.window_description())),
            paragraph(&format!("Total Updates: {}", digest.total())),
        ];
        for group in &digest.groups {
            blocks.push(heading(
                2,
                &format!("{} ({} updates)", group.competitor, group.records.len()),
            ));
            for (i, rec) in group.records.iter().enumerate() {
                blocks.push(heading(3, &format!("{}. {} Update", i + 1, rec.source_kind.label())));
                blocks.extend(text_blocks(summary_body(&rec.summary)));
                blocks.push(paragraph(&format!("Source: {}", rec.source_url)));
            }
            blocks.push(json!({ "object": "block", "type": "divider", "divider": {} }));
        }
        blocks.truncate(MAX_BLOCKS);

        NotionDocument {
            title: format!("Weekly Digest - {}", stamp(digest.generated_at)),
            competitor: digest.competitors().join(", "),
            source_type: "digest".to_string(),
            summary: format!(
                "{} updates from {} competitors, {}",
                digest.total(),
                digest.groups.len(),
                digest.window_description()
            ),
            blocks,
        }
    }

    async fn send(&self, doc: &NotionDocument) -> Result<()> {
        let dest = self.destination().await;
        let body = dest.create_request(doc, Utc::now().date_naive());
        let rsp = self
            .authed(self.client.post(format!("{}/pages", self.api_base)))
            .json(&body)
            .send()
            .await
            .context("notion request failed")?;

        let status = rsp.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = rsp.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED => bail!("notion unauthorized, check NOTION_API_KEY"),
            StatusCode::FORBIDDEN => bail!("notion forbidden, share the {} with the integration", dest.kind()),
            StatusCode::NOT_FOUND => bail!("notion {} {} not found", dest.kind(), dest.id()),
            StatusCode::BAD_REQUEST if matches!(dest, WorkspaceDestination::Database(_)) => Err(anyhow!(
                "notion database schema mismatch (needs Title, Summary, Source Type, Date, Competitor): {detail}"
            )),
            s => bail!("notion returned {s}: {detail}"),
        }
    }
}

/// Rich-text array, split into chunks the API accepts.
pub fn rich_text(text: &str) -> Vec<Value> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    chars
        .chunks(RICH_TEXT_CHARS)
        .map(|c| {
            let content: String = c.iter().collect();
            json!({ "type": "text", "text": { "content": content } })
        })
        .collect()
}

fn paragraph(text: &str) -> Value {
    json!({ "object": "block", "type": "paragraph", "paragraph": { "rich_text": rich_text(text) } })
}

fn heading(level: u8, text: &str) -> Value {
    let key = format!("heading_{}", level.clamp(1, 3));
    let mut block = json!({ "object": "block", "type": key.clone() });
    block[key.as_str()] = json!({ "rich_text": rich_text(text) });
    block
}

fn bullet(text: &str) -> Value {
    json!({
        "object": "block",
        "type": "bulleted_list_item",
        "bulleted_list_item": { "rich_text": rich_text(text) }
    })
}

/// Markdown-ish summary lines to blocks: bullets, `##` headings, paragraphs.
fn text_blocks(text: &str) -> Vec<Value> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| {
            let plain = l.replace("**", "");
            if let Some(rest) = plain.strip_prefix("• ").or_else(|| plain.strip_prefix("- ")) {
                bullet(rest)
            } else if let Some(rest) = plain.strip_prefix("### ") {
                heading(3, rest)
            } else if let Some(rest) = plain.strip_prefix("## ") {
                heading(2, rest)
            } else {
                paragraph(&plain)
            }
        })
        .collect()
}
