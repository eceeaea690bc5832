// src/summarize/fallback.rs
//! Deterministic extractive summary, used whenever the AI backend is off or fails.

use super::format::BULLET;

const TITLE_MAX_CHARS: usize = 100;
const POINT_MAX_CHARS: usize = 160;
const PREVIEW_MAX_CHARS: usize = 300;
const SCAN_LINES: usize = 12;
const MAX_POINTS: usize = 5;

/// Words that usually mark a feature announcement.
const FEATURE_KEYWORDS: &[&str] = &[
    "new",
    "added",
    "adds",
    "improved",
    "improves",
    "improvement",
    "improvements",
    "launched",
    "launches",
    "introducing",
    "introduced",
    "released",
    "releases",
    "feature",
    "features",
    "support",
    "supports",
    "faster",
    "fixed",
];

pub fn extractive_summary(raw: &str) -> String {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let title = lines
        .first()
        .map(|l| clip(strip_bullet(l), TITLE_MAX_CHARS))
        .unwrap_or_else(|| "Update".to_string());

    let points: Vec<String> = lines
        .iter()
        .skip(1)
        .take(SCAN_LINES)
        .filter(|l| is_bullet(l) || has_feature_keyword(l))
        .take(MAX_POINTS)
        .map(|l| format!("{BULLET} {}", clip(strip_bullet(l), POINT_MAX_CHARS)))
        .collect();

    let mut out = format!("**Title:** {title}");
    if !points.is_empty() {
        out.push_str("\n\n**Key points:**\n");
        out.push_str(&points.join("\n"));
    }
    out.push_str("\n\n**Preview:**\n");
    out.push_str(&clip(raw.trim(), PREVIEW_MAX_CHARS));
    out
}

fn is_bullet(line: &str) -> bool {
    let mut chars = line.chars();
    match chars.next() {
        Some('-' | '*' | '•' | '–') => chars.next().is_some_and(char::is_whitespace),
        Some(c) if c.is_ascii_digit() => {
            let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
            rest.starts_with(". ") || rest.starts_with(") ")
        }
        _ => false,
    }
}

fn strip_bullet(line: &str) -> &str {
    if !is_bullet(line) {
        return line;
    }
    line.trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start_matches(['-', '*', '•', '–', '.', ')'])
        .trim_start()
}

fn has_feature_keyword(line: &str) -> bool {
    line.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .any(|w| {
            let w = w.to_lowercase();
            FEATURE_KEYWORDS.contains(&w.as_str())
        })
}

/// Cut to `max` chars on a char boundary, marking the cut with "...".
pub(crate) fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}
