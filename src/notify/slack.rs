// src/notify/slack.rs
//! Slack incoming-webhook channel.

use std::fmt::Write as _;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;

use super::render::{before_after, content_preview, stamp, summary_body, to_slack};
use super::Channel;
use crate::config::env_opt;
use crate::detector::UpdateEvent;
use crate::digest::Digest;
use crate::summarize::fallback::clip;

const BEFORE_AFTER_CHARS: usize = 500;
const PREVIEW_CHARS: usize = 300;
const DIGEST_LINE_CHARS: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackMessage {
    pub text: String,
}

#[derive(Clone)]
pub struct SlackChannel {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl SlackChannel {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    /// `SLACK_WEBHOOK_URL`; `None` when unset.
    pub fn from_env() -> Result<Option<Self>> {
        let Some(url) = env_opt("SLACK_WEBHOOK_URL") else {
            return Ok(None);
        };
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(anyhow!("SLACK_WEBHOOK_URL is not an http(s) URL"));
        }
        Ok(Some(Self::new(url)))
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }
}

#[async_trait]
impl Channel for SlackChannel {
    const NAME: &'static str = "slack";
    type Payload = SlackMessage;

    fn format(&self, ev: &UpdateEvent, at: DateTime<Utc>) -> SlackMessage {
        let label = ev.source_kind.label();
        let mut text = format!(
            "{} *{} {label} Update*\n*Posted:* {}\n*Source:* {label}\n*Link:* <{}|View Original>\n\n*Summary:*\n{}",
            ev.source_kind.emoji(),
            ev.competitor_name,
            stamp(at),
            ev.link,
            to_slack(summary_body(&ev.summary)),
        );
        if let Some((before, after)) = before_after(ev, BEFORE_AFTER_CHARS) {
            let _ = write!(text, "\n\n*Before:*\n{before}\n*After:*\n{after}");
        } else if let Some(preview) = content_preview(ev, PREVIEW_CHARS) {
            let _ = write!(text, "\n\n*Content Preview:*\n{preview}");
        }
        SlackMessage { text }
    }

    fn format_digest(&self, digest: &Digest) -> SlackMessage {
        let mut text = format!(
            "📊 *Weekly Competitor Update Digest*\n*Period:* {} (generated {})\n*Total Updates:* {}\n",
            digest.window_description(),
            stamp(digest.generated_at),
            digest.total(),
        );
        for group in &digest.groups {
            let _ = write!(
                text,
                "\n*{}* ({} updates):\n",
                group.competitor,
                group.records.len()
            );
            for (i, rec) in group.records.iter().enumerate() {
                let body = summary_body(&rec.summary).replace('\n', " ");
                let _ = writeln!(
                    text,
                    "  {}. {} *{}:* {}",
                    i + 1,
                    rec.source_kind.emoji(),
                    rec.source_kind.label(),
                    to_slack(&clip(&body, DIGEST_LINE_CHARS)),
                );
            }
        }
        SlackMessage { text }
    }

    async fn send(&self, payload: &SlackMessage) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!(e).context("slack webhook HTTP error"),
                },
                Err(e) => anyhow!(e).context("slack webhook request failed"),
            };
            if attempt >= self.max_retries {
                return Err(err).with_context(|| format!("giving up after {attempt} attempts"));
            }
            tracing::debug!(attempt, error = %err, "slack send failed, retrying");
            tokio::time::sleep(backoff(attempt)).await;
        }
    }
}

/// 500ms doubling per attempt, capped at 32s.
fn backoff(attempt: u8) -> Duration {
    let shift = u32::from(attempt.saturating_sub(1).min(6));
    Duration::from_millis(500u64 << shift)
}
