// src/notify/email.rs
//! SMTP email channel: multipart/alternative with plain text and HTML.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::{Mailbox, Message, MultiPart};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::render::{before_after, content_preview, escape_attr, stamp, summary_body, to_html, to_plain};
use super::Channel;
use crate::config::{env_opt, env_u64};
use crate::detector::UpdateEvent;
use crate::digest::Digest;

const BEFORE_AFTER_CHARS: usize = 1000;
const PREVIEW_CHARS: usize = 1000;
const DEFAULT_SMTP_PORT: u64 = 587;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub plain: String,
    pub html: String,
}

pub struct EmailChannel {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailChannel {
    pub fn new(mailer: AsyncSmtpTransport<Tokio1Executor>, from: Mailbox, to: Mailbox) -> Self {
        Self { mailer, from, to }
    }

    /// `SMTP_HOST`, `SMTP_USER`, `SMTP_PASS` and `EMAIL_FROM` are required;
    /// `SMTP_PORT` defaults to 587 and `EMAIL_TO` to the sender.
    pub fn from_env() -> Result<Option<Self>> {
        let (Some(host), Some(user), Some(pass), Some(from_addr)) = (
            env_opt("SMTP_HOST"),
            env_opt("SMTP_USER"),
            env_opt("SMTP_PASS"),
            env_opt("EMAIL_FROM"),
        ) else {
            return Ok(None);
        };
        let to_addr = env_opt("EMAIL_TO").unwrap_or_else(|| from_addr.clone());
        let port = u16::try_from(env_u64("SMTP_PORT", DEFAULT_SMTP_PORT))
            .context("SMTP_PORT out of range")?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host)
            .with_context(|| format!("invalid SMTP_HOST {host}"))?
            .port(port)
            .credentials(Credentials::new(user, pass))
            .build();
        let from = from_addr
            .parse::<Mailbox>()
            .with_context(|| format!("invalid EMAIL_FROM {from_addr}"))?;
        let to = to_addr
            .parse::<Mailbox>()
            .with_context(|| format!("invalid EMAIL_TO {to_addr}"))?;

        Ok(Some(Self::new(mailer, from, to)))
    }
}

fn wrap_html(title: &str, subtitle: &str, body: &str, footer: &str) -> String {
    format!(
        "<div style=\"font-family: Arial, sans-serif; max-width: 700px; margin: 0 auto;\">\n\
         <div style=\"background: #4f46e5; color: white; padding: 20px; border-radius: 8px 8px 0 0;\">\n\
         <h1 style=\"margin: 0; font-size: 24px;\">{}</h1>\n\
         <p style=\"margin: 5px 0 0 0;\">{}</p>\n</div>\n\
         <div style=\"background: #f8f9fa; padding: 20px; border: 1px solid #e9ecef;\">\n{body}</div>\n\
         <p style=\"text-align: center; color: #6c757d; font-size: 12px;\">{footer}</p>\n</div>\n",
        html_escape::encode_text(title),
        html_escape::encode_text(subtitle),
    )
}

fn section(title: &str, inner_html: &str) -> String {
    format!(
        "<div style=\"background: white; padding: 16px; border-radius: 6px; margin-bottom: 16px;\">\n\
         <h2 style=\"margin-top: 0; color: #495057;\">{}</h2>\n\
         <div style=\"line-height: 1.6; white-space: pre-wrap;\">{inner_html}</div>\n</div>\n",
        html_escape::encode_text(title),
    )
}

#[async_trait]
impl Channel for EmailChannel {
    const NAME: &'static str = "email";
    type Payload = EmailMessage;

    fn format(&self, ev: &UpdateEvent, at: DateTime<Utc>) -> EmailMessage {
        let title = ev.title();
        let summary = summary_body(&ev.summary);
        let posted = format!("Posted on {}", stamp(at));

        let mut plain = format!("{title} Update\n{posted}\nSource: {}\n\nSummary:\n{}\n", ev.link, to_plain(summary));
        let mut body = section("Summary", &to_html(summary));
        body.push_str(&format!(
            "<p style=\"text-align: center;\"><a href=\"{}\">View Original Source</a></p>\n",
            escape_attr(&ev.link)
        ));

        if let Some((before, after)) = before_after(ev, BEFORE_AFTER_CHARS) {
            let _ = write!(plain, "\nBefore:\n{before}\n\nAfter:\n{after}\n");
            body.push_str(&section("Before", &to_html(&before)));
            body.push_str(&section("After", &to_html(&after)));
        } else if let Some(preview) = content_preview(ev, PREVIEW_CHARS) {
            let _ = write!(plain, "\nContent:\n{preview}\n");
            body.push_str(&section("Full Content", &to_html(&preview)));
        }

        EmailMessage {
            subject: format!("Competitor Update: {title}"),
            plain,
            html: wrap_html(
                &format!("{title} Update"),
                &posted,
                &body,
                "This update was generated automatically by the competitor tracker.",
            ),
        }
    }

    fn format_digest(&self, digest: &Digest) -> EmailMessage {
        let generated = stamp(digest.generated_at);
        let header = format!(
            "Period: {} | Generated: {generated} | Total Updates: {}",
            digest.window_description(),
            digest.total()
        );

        let mut plain = format!("Weekly Competitor Update Digest\n{header}\n");
        let mut body = String::new();
        for group in &digest.groups {
            let _ = write!(plain, "\n{} ({} updates)\n", group.competitor, group.records.len());
            let mut inner = String::new();
            for (i, rec) in group.records.iter().enumerate() {
                let summary = summary_body(&rec.summary);
                let _ = write!(
                    plain,
                    "  {}. {} Update: {}\n     {}\n",
                    i + 1,
                    rec.source_kind.label(),
                    to_plain(summary).replace('\n', " "),
                    rec.source_url
                );
                let _ = write!(
                    inner,
                    "<h3 style=\"font-size: 16px;\">{}. {} Update</h3>\n{}\n",
                    i + 1,
                    rec.source_kind.label(),
                    to_html(summary)
                );
            }
            body.push_str(&section(
                &format!("{} ({} updates)", group.competitor, group.records.len()),
                &inner,
            ));
        }

        EmailMessage {
            subject: format!("Weekly Competitor Digest - {}", digest.generated_at.format("%Y-%m-%d")),
            plain,
            html: wrap_html(
                "Weekly Competitor Update Digest",
                &header,
                &body,
                "This digest was generated automatically by the competitor tracker.",
            ),
        }
    }

    async fn send(&self, msg: &EmailMessage) -> Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(msg.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                msg.plain.clone(),
                msg.html.clone(),
            ))
            .context("build email")?;

        self.mailer.send(email).await.context("send email")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceKind;
    use chrono::TimeZone;

    fn channel() -> EmailChannel {
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous("localhost").build();
        EmailChannel::new(
            mailer,
            "tracker@example.com".parse().unwrap(),
            "team@example.com".parse().unwrap(),
        )
    }

    #[test]
    fn event_message_parts() {
        let ev = UpdateEvent {
            competitor_name: "Figma".into(),
            source_kind: SourceKind::Blog,
            source_url: "https://www.figma.com/blog".into(),
            link: "https://www.figma.com/blog?a=1&b=2".into(),
            raw_content: "Dev Mode <beta>".into(),
            previous_content: Some("Config recap".into()),
            summary: "🚨 **Figma Blog Update**\n**Title:** Dev Mode\n• faster".into(),
        };
        let msg = channel().format(&ev, Utc.with_ymd_and_hms(2026, 4, 1, 7, 30, 0).unwrap());

        assert_eq!(msg.subject, "Competitor Update: Figma Blog");
        assert!(msg.plain.contains("Summary:\nTitle: Dev Mode\n- faster\n"));
        assert!(msg.plain.contains("Before:\nConfig recap\n\nAfter:\nDev Mode <beta>"));
        assert!(msg.html.contains("<b>Title:</b> Dev Mode"));
        assert!(msg.html.contains("Dev Mode &lt;beta&gt;"));
        assert!(msg.html.contains("href=\"https://www.figma.com/blog?a=1&amp;b=2\""));
        assert!(msg.html.contains("Posted on 2026-04-01 07:30 UTC"));
    }
}
