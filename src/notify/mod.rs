// src/notify/mod.rs
//! Notification Dispatcher.
//!
//! Every configured channel is attempted once per event. A failing channel is
//! logged and reported; it never blocks its siblings or later events. The
//! dispatcher does not retry; channels may.

pub mod email;
pub mod notion;
pub mod render;
pub mod slack;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use tracing::{info, warn};

use crate::detector::UpdateEvent;
use crate::digest::Digest;

pub use email::EmailChannel;
pub use notion::{NotionChannel, WorkspaceDestination};
pub use slack::SlackChannel;

/// A notification back-end: format into a native payload, then send it.
#[async_trait]
pub trait Channel: Send + Sync {
    const NAME: &'static str;
    type Payload: Send + Sync;

    fn format(&self, event: &UpdateEvent, at: DateTime<Utc>) -> Self::Payload;
    fn format_digest(&self, digest: &Digest) -> Self::Payload;
    async fn send(&self, payload: &Self::Payload) -> Result<()>;
}

/// Object-safe view of a [`Channel`], used by the dispatcher.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn notify(&self, event: &UpdateEvent, at: DateTime<Utc>) -> Result<()>;
    async fn notify_digest(&self, digest: &Digest) -> Result<()>;
}

#[async_trait]
impl<C: Channel> Notifier for C {
    fn name(&self) -> &'static str {
        C::NAME
    }

    async fn notify(&self, event: &UpdateEvent, at: DateTime<Utc>) -> Result<()> {
        let payload = self.format(event, at);
        self.send(&payload).await
    }

    async fn notify_digest(&self, digest: &Digest) -> Result<()> {
        let payload = self.format_digest(digest);
        self.send(&payload).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum Outcome {
    Delivered,
    Failed(String),
}

/// One channel attempt for one event, or for one digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub channel: &'static str,
    /// Source URL of the event, or "digest".
    pub target: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub deliveries: Vec<Delivery>,
    pub not_configured: Vec<&'static str>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|d| d.outcome == Outcome::Delivered)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.deliveries.len() - self.delivered()
    }

    pub fn for_channel(&self, name: &str) -> Vec<&Delivery> {
        self.deliveries.iter().filter(|d| d.channel == name).collect()
    }
}

pub struct Dispatcher {
    channels: Vec<Arc<dyn Notifier>>,
    not_configured: Vec<&'static str>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Arc<dyn Notifier>>) -> Self {
        Self {
            channels,
            not_configured: Vec::new(),
        }
    }

    /// Channels from environment settings. Missing settings leave a channel
    /// out; malformed ones are logged and treated the same way.
    pub fn from_env() -> Self {
        let mut channels: Vec<Arc<dyn Notifier>> = Vec::new();
        let mut not_configured = Vec::new();

        match SlackChannel::from_env() {
            Ok(Some(c)) => channels.push(Arc::new(c)),
            Ok(None) => not_configured.push(SlackChannel::NAME),
            Err(e) => {
                warn!(channel = SlackChannel::NAME, error = %format!("{e:#}"), "invalid channel settings");
                not_configured.push(SlackChannel::NAME);
            }
        }
        match NotionChannel::from_env() {
            Ok(Some(c)) => channels.push(Arc::new(c)),
            Ok(None) => not_configured.push(NotionChannel::NAME),
            Err(e) => {
                warn!(channel = NotionChannel::NAME, error = %format!("{e:#}"), "invalid channel settings");
                not_configured.push(NotionChannel::NAME);
            }
        }
        match EmailChannel::from_env() {
            Ok(Some(c)) => channels.push(Arc::new(c)),
            Ok(None) => not_configured.push(EmailChannel::NAME),
            Err(e) => {
                warn!(channel = EmailChannel::NAME, error = %format!("{e:#}"), "invalid channel settings");
                not_configured.push(EmailChannel::NAME);
            }
        }

        info!(
            configured = ?channels.iter().map(|c| c.name()).collect::<Vec<_>>(),
            not_configured = ?not_configured,
            "notification channels loaded"
        );
        Self {
            channels,
            not_configured,
        }
    }

    pub fn with_not_configured(mut self, names: Vec<&'static str>) -> Self {
        self.not_configured = names;
        self
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    pub async fn dispatch(&self, events: &[UpdateEvent]) -> DispatchReport {
        let mut report = self.empty_report();
        let at = Utc::now();
        for ev in events {
            for ch in &self.channels {
                let res = ch.notify(ev, at).await;
                report
                    .deliveries
                    .push(record(ch.name(), ev.source_url.clone(), res));
            }
        }
        report
    }

    /// One aggregate payload per channel. An empty digest is not sent.
    pub async fn dispatch_digest(&self, digest: &Digest) -> DispatchReport {
        let mut report = self.empty_report();
        if digest.is_empty() {
            info!(window = %digest.window_description(), "digest empty, nothing sent");
            return report;
        }
        for ch in &self.channels {
            let res = ch.notify_digest(digest).await;
            report
                .deliveries
                .push(record(ch.name(), "digest".to_string(), res));
        }
        report
    }

    fn empty_report(&self) -> DispatchReport {
        for name in &self.not_configured {
            info!(channel = %name, "channel not configured, skipped");
        }
        DispatchReport {
            deliveries: Vec::new(),
            not_configured: self.not_configured.clone(),
        }
    }
}

fn record(channel: &'static str, target: String, res: Result<()>) -> Delivery {
    let outcome = match res {
        Ok(()) => {
            info!(channel, %target, outcome = "delivered", "notification sent");
            counter!("notify_deliveries_total", "channel" => channel, "outcome" => "delivered")
                .increment(1);
            Outcome::Delivered
        }
        Err(e) => {
            let msg = format!("{e:#}");
            warn!(channel, %target, outcome = "failed", error = %msg, "notification failed");
            counter!("notify_deliveries_total", "channel" => channel, "outcome" => "failed")
                .increment(1);
            Outcome::Failed(msg)
        }
    };
    Delivery {
        channel,
        target,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fake {
        name: &'static str,
        fail: bool,
        sent: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for Fake {
        fn name(&self) -> &'static str {
            self.name
        }
        async fn notify(&self, _e: &UpdateEvent, _at: DateTime<Utc>) -> Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("boom")
            }
            Ok(())
        }
        async fn notify_digest(&self, _d: &Digest) -> Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fake(name: &'static str, fail: bool) -> Arc<Fake> {
        Arc::new(Fake {
            name,
            fail,
            sent: AtomicUsize::new(0),
        })
    }

    fn event(url: &str) -> UpdateEvent {
        UpdateEvent {
            competitor_name: "A".into(),
            source_kind: SourceKind::Blog,
            source_url: url.into(),
            link: url.into(),
            raw_content: "new".into(),
            previous_content: None,
            summary: "s".into(),
        }
    }

    #[tokio::test]
    async fn every_channel_sees_every_event() {
        let a = fake("a", true);
        let b = fake("b", false);
        let d = Dispatcher::new(vec![a.clone() as Arc<dyn Notifier>, b.clone()]);
        let report = d.dispatch(&[event("u1"), event("u2")]).await;

        assert_eq!(a.sent.load(Ordering::SeqCst), 2);
        assert_eq!(b.sent.load(Ordering::SeqCst), 2);
        assert_eq!(report.delivered(), 2);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.deliveries[0].target, "u1");
        assert_eq!(report.deliveries[3].target, "u2");
    }

    #[tokio::test]
    async fn empty_digest_is_not_sent() {
        let a = fake("a", false);
        let d = Dispatcher::new(vec![a.clone() as Arc<dyn Notifier>]).with_not_configured(vec!["email"]);
        let digest = Digest {
            generated_at: Utc::now(),
            window_days: 7,
            groups: vec![],
        };
        let report = d.dispatch_digest(&digest).await;
        assert!(report.deliveries.is_empty());
        assert_eq!(report.not_configured, ["email"]);
        assert_eq!(a.sent.load(Ordering::SeqCst), 0);
    }
}
