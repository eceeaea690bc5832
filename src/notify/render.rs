// src/notify/render.rs
//! Text helpers shared by the channel formatters.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::detector::UpdateEvent;
use crate::summarize::fallback::clip;
use crate::summarize::format::{ATTENTION_MARKER, BULLET};

static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("static regex"));

pub fn stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Summary without its leading attention heading, for places that already
/// show a title.
pub fn summary_body(summary: &str) -> &str {
    let trimmed = summary.trim_start();
    if trimmed.starts_with(ATTENTION_MARKER) {
        trimmed.split_once('\n').map_or("", |(_, rest)| rest.trim_start())
    } else {
        trimmed
    }
}

/// Bounded previews of the previous and current content, when they differ.
pub fn before_after(ev: &UpdateEvent, max: usize) -> Option<(String, String)> {
    match ev.previous_content.as_deref() {
        Some(prev) if prev != ev.raw_content => {
            Some((clip(prev, max), clip(&ev.raw_content, max)))
        }
        _ => None,
    }
}

/// Content preview worth showing next to the summary, if any.
pub fn content_preview(ev: &UpdateEvent, max: usize) -> Option<String> {
    let content = ev.raw_content.trim();
    (content != ev.summary.trim() && content.chars().count() > 50).then(|| clip(content, max))
}

/// `**bold**` to Slack's `*bold*`.
pub fn to_slack(text: &str) -> String {
    RE_BOLD.replace_all(text, "*$1*").to_string()
}

pub fn to_plain(text: &str) -> String {
    RE_BOLD
        .replace_all(text, "$1")
        .replace('`', "")
        .replace(BULLET, "-")
}

/// Escaped HTML with bold spans and line breaks kept.
pub fn to_html(text: &str) -> String {
    let escaped = html_escape::encode_text(text);
    RE_BOLD
        .replace_all(&escaped, "<b>$1</b>")
        .replace('\n', "<br>\n")
}

pub fn escape_attr(s: &str) -> String {
    html_escape::encode_double_quoted_attribute(s).to_string()
}
