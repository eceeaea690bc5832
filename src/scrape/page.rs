// src/scrape/page.rs
//! HTML extraction for changelog, blog and pricing pages.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::normalize_text;
use crate::summarize::fallback::clip;

const CHANGELOG_SELECTORS: &[&str] = &[
    "article h2",
    ".changelog-entry h2",
    ".release-note h2",
    ".update-title",
    "h2",
    ".changelog h1",
    ".release h1",
    "h1",
    ".entry-title",
    ".post-title",
];

const BLOG_TITLE_SELECTORS: &[&str] = &[
    "article h1",
    ".post-title",
    ".blog-title",
    ".entry-title",
    ".article-title",
    "h1",
    ".title",
    ".headline",
];

const BLOG_SUMMARY_SELECTORS: &[&str] = &[
    ".post-excerpt",
    ".post-summary",
    ".entry-summary",
    ".article-excerpt",
    "p.lead",
    ".post-content p",
    ".excerpt",
    ".summary",
    ".description",
    "p",
];

fn element_text(el: ElementRef<'_>) -> String {
    normalize_text(&el.text().collect::<Vec<_>>().join(" "))
}

fn first_text(doc: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        let selector = Selector::parse(sel).ok()?;
        doc.select(&selector)
            .map(element_text)
            .find(|t| !t.is_empty())
    })
}

/// First block of body text whose length falls in `range`.
fn first_block(doc: &Html, tags: &str, range: std::ops::Range<usize>) -> Option<String> {
    let root = Selector::parse("main").ok().and_then(|s| doc.select(&s).next());
    let blocks = Selector::parse(tags).ok()?;
    let pick = |el: ElementRef<'_>| -> Option<String> {
        el.select(&blocks)
            .take(10)
            .map(element_text)
            .find(|t| range.contains(&t.chars().count()))
    };
    match root {
        Some(main) => pick(main),
        None => pick(doc.root_element()),
    }
}

/// Latest changelog entry: the first heading that matches a known layout.
pub fn changelog_entry(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    first_text(&doc, CHANGELOG_SELECTORS).or_else(|| first_block(&doc, "p, div, span", 21..500))
}

/// Latest blog post as "title: summary".
pub fn blog_post(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    match first_text(&doc, BLOG_TITLE_SELECTORS) {
        Some(title) => match first_text(&doc, BLOG_SUMMARY_SELECTORS) {
            Some(summary) if summary != title => Some(format!("{title}: {summary}")),
            _ => Some(title),
        },
        None => first_block(&doc, "p, div", 31..300),
    }
}

/// Visible text of the main area, without scripts and styles.
pub fn pricing_text(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let root = Selector::parse("main")
        .ok()
        .and_then(|s| doc.select(&s).next())
        .or_else(|| Selector::parse("body").ok().and_then(|s| doc.select(&s).next()))?;

    let mut parts = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript" | "template"))
        });
        if !hidden {
            parts.push(text.to_string());
        }
    }
    let text = normalize_text(&parts.join(" "));
    (!text.is_empty()).then_some(text)
}

/// Prices and plan names in first-seen order, so equal pages compare equal.
pub fn extract_pricing_info(text: &str) -> String {
    static PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
        [
            r"\$\d+(?:\.\d{2})?",
            r"(?i)\b\d+\s*(?:USD|dollars?|per\s+month|per\s+year)\b",
            r"(?i)\b(?:free|trial|pro|enterprise|basic|premium|business|team)\b",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    });

    let mut found: Vec<(usize, String)> = Vec::new();
    for re in PATTERNS.iter() {
        for m in re.find_iter(text) {
            found.push((m.start(), m.as_str().to_string()));
        }
    }
    found.sort_by_key(|(pos, _)| *pos);

    let mut facts: Vec<String> = Vec::new();
    for (_, f) in found {
        let key = f.to_lowercase();
        if !facts.iter().any(|x| x.to_lowercase() == key) {
            facts.push(f);
        }
        if facts.len() == 8 {
            break;
        }
    }

    if facts.is_empty() {
        clip(text, 500)
    } else {
        format!("Pricing info: {}", facts.join(", "))
    }
}
