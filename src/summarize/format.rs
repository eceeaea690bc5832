// src/summarize/format.rs
//! Post-processing that makes summaries read well in chat and documents.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::SourceKind;

pub const ATTENTION_MARKER: &str = "🚨";
pub const BULLET: &str = "•";

/// "🚨 **Linear Changelog Update**", or a shorter variant when parts are missing.
pub fn heading(competitor: Option<&str>, kind: Option<SourceKind>) -> Option<String> {
    let competitor = competitor.map(str::trim).filter(|c| !c.is_empty());
    let title = match (competitor, kind) {
        (Some(c), Some(k)) => format!("{c} {} Update", k.label()),
        (Some(c), None) => format!("{c} Update"),
        (None, Some(k)) => format!("{} Update", k.label()),
        (None, None) => return None,
    };
    Some(format!("{ATTENTION_MARKER} **{title}**"))
}

/// Normalize bullets, bold heading-like lines, squeeze blank runs, prefix heading.
pub fn format_summary(body: &str, competitor: Option<&str>, kind: Option<SourceKind>) -> String {
    static RE_BULLET: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(\s*)(?:[-*•–]|\d+[.)])\s+").expect("static regex"));
    static RE_BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

    let mut lines = Vec::new();
    for raw in body.lines() {
        let line = raw.trim_end();
        let line = RE_BULLET.replace(line, format!("${{1}}{BULLET} ").as_str());
        lines.push(bold_if_heading(&line));
    }
    let joined = lines.join("\n");
    let squeezed = RE_BLANKS.replace_all(&joined, "\n\n");
    let text = squeezed.trim();

    match heading(competitor, kind) {
        Some(h) if text.is_empty() => h,
        Some(h) => format!("{h}\n{text}"),
        None => text.to_string(),
    }
}

/// A short line ending in a colon reads as a section heading.
fn bold_if_heading(line: &str) -> String {
    let t = line.trim();
    let looks_like_heading = t.ends_with(':')
        && t.chars().count() <= 80
        && !t.starts_with("**")
        && !t.starts_with(BULLET);
    if looks_like_heading {
        format!("**{t}**")
    } else {
        line.to_string()
    }
}
