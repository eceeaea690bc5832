// src/scrape/feed.rs
//! RSS 2.0 and Atom parsing for blog sources.

use quick_xml::de::from_str;
use serde::Deserialize;

use super::normalize_text;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Atom {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    title: Option<TextNode>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
}

/// Atom text constructs carry a `type` attribute next to their text.
#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    text: String,
}

/// Feed URLs worth probing for a blog. A URL that already names a feed is
/// used as is.
pub fn candidate_urls(url: &str) -> Vec<String> {
    let lower = url.to_ascii_lowercase();
    let looks_like_feed = lower.ends_with(".xml")
        || lower.ends_with(".rss")
        || lower.ends_with(".atom")
        || lower.ends_with("/feed")
        || lower.ends_with("/rss")
        || lower.contains("/feed/")
        || lower.contains("/rss/");
    if looks_like_feed {
        return vec![url.to_string()];
    }
    let base = url.trim_end_matches('/');
    vec![format!("{base}/rss.xml"), format!("{base}/feed")]
}

/// Newest entry of an RSS or Atom document as "title: summary".
pub fn latest_entry(xml: &str) -> Option<String> {
    let trimmed = xml.trim_start();
    if !(trimmed.starts_with("<?xml") || trimmed.starts_with("<rss") || trimmed.starts_with("<feed")) {
        return None;
    }
    let xml = scrub_html_entities_for_xml(xml);

    let (title, summary) = if let Ok(rss) = from_str::<Rss>(&xml) {
        let item = rss.channel.items.into_iter().next()?;
        (item.title, item.description)
    } else {
        let atom = from_str::<Atom>(&xml).ok()?;
        let entry = atom.entries.into_iter().next()?;
        (
            entry.title.map(|t| t.text),
            entry.summary.or(entry.content).map(|t| t.text),
        )
    };

    let title = title.map(|t| normalize_text(&t)).filter(|t| !t.is_empty());
    let summary = summary.map(|s| normalize_text(&s)).filter(|s| !s.is_empty());
    match (title, summary) {
        (Some(t), Some(s)) => Some(format!("{t}: {s}")),
        (Some(t), None) => Some(t),
        (None, Some(s)) => Some(s),
        (None, None) => None,
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "...")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
