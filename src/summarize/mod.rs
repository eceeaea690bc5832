// src/summarize/mod.rs
//! Summarizer: raw scraped text -> bounded, formatted summary.
//!
//! The AI backend is optional and shielded behind a process-wide rate gate.
//! Any backend failure degrades to the extractive fallback; the only error a
//! caller can see is an empty input.

pub mod backend;
pub mod fallback;
pub mod format;
pub mod rate_gate;

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{AiConfig, SourceKind};
use backend::{AiBackend, AiError, GeminiBackend};
use rate_gate::RateGate;

pub const MAX_SUMMARY_CHARS: usize = 900;
pub const MAX_SUMMARY_WORDS: usize = 180;
const ELLIPSIS: char = '…';

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SummarizeError {
    #[error("nothing to summarize: input is empty")]
    EmptyInput,
}

/// Character and word caps for a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryLimits {
    pub max_chars: usize,
    pub max_words: usize,
}

impl Default for SummaryLimits {
    fn default() -> Self {
        Self {
            max_chars: MAX_SUMMARY_CHARS,
            max_words: MAX_SUMMARY_WORDS,
        }
    }
}

impl SummaryLimits {
    pub fn new(max_chars: usize, max_words: usize) -> Self {
        Self {
            max_chars: max_chars.max(16),
            max_words: max_words.max(3),
        }
    }
}

pub struct Summarizer {
    backend: Option<Arc<dyn AiBackend>>,
    gate: RateGate,
    skip_wait: bool,
    limits: SummaryLimits,
}

impl Summarizer {
    pub fn new(backend: Option<Arc<dyn AiBackend>>, min_interval: Duration) -> Self {
        Self {
            backend,
            gate: RateGate::new(min_interval),
            skip_wait: false,
            limits: SummaryLimits::default(),
        }
    }

    /// Fallback-only summarizer. Never touches the rate gate.
    pub fn disabled() -> Self {
        Self::new(None, Duration::ZERO)
    }

    pub fn from_config(cfg: &AiConfig) -> Self {
        if !cfg.enabled {
            info!("AI summarization disabled, using extractive fallback");
            return Self::disabled();
        }
        let built = GeminiBackend::new(&cfg.api_key, &cfg.model)
            .map(|b| Arc::new(b) as Arc<dyn AiBackend>);
        Self::with_built_backend(built, cfg)
    }

    fn with_built_backend(built: Result<Arc<dyn AiBackend>, AiError>, cfg: &AiConfig) -> Self {
        let backend = match built {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "could not build Gemini client, using extractive fallback");
                return Self::disabled();
            }
        };
        info!(
            model = %cfg.model,
            min_interval_secs = cfg.min_interval_secs,
            skip_wait = cfg.skip_rate_limit_wait,
            "AI summarization enabled"
        );
        Self::new(Some(backend), cfg.min_interval()).with_skip_wait(cfg.skip_rate_limit_wait)
    }

    pub fn with_skip_wait(mut self, skip: bool) -> Self {
        self.skip_wait = skip;
        self
    }

    pub fn with_limits(mut self, limits: SummaryLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> SummaryLimits {
        self.limits
    }

    pub fn ai_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Summarize `raw` for a source of `kind`. The result is non-empty and
    /// within `limits()`.
    pub async fn summarize(
        &self,
        raw: &str,
        kind: SourceKind,
        competitor: Option<&str>,
    ) -> Result<String, SummarizeError> {
        if raw.trim().is_empty() {
            return Err(SummarizeError::EmptyInput);
        }

        let body = match &self.backend {
            Some(backend) => self.ai_or_fallback(backend.as_ref(), raw, kind).await,
            None => {
                counter!("tracker_summaries_total", "mode" => "fallback").increment(1);
                fallback::extractive_summary(raw)
            }
        };

        let formatted = format::format_summary(&body, competitor, Some(kind));
        Ok(truncate_bounded(&formatted, self.limits))
    }

    async fn ai_or_fallback(&self, backend: &dyn AiBackend, raw: &str, kind: SourceKind) -> String {
        if self.skip_wait {
            if !self.gate.try_acquire().await {
                info!(%kind, "rate gate busy and waiting disabled, using fallback");
                return self.fallback(raw);
            }
        } else {
            self.gate.acquire().await;
        }

        let prompt = build_prompt(kind, raw);
        match backend.generate(&prompt).await {
            Ok(text) if !text.trim().is_empty() => {
                debug!(provider = backend.name(), %kind, "AI summary received");
                counter!("tracker_summaries_total", "mode" => "ai").increment(1);
                text
            }
            Ok(_) | Err(AiError::Empty) => {
                warn!(provider = backend.name(), %kind, "empty AI response, using fallback");
                self.fallback(raw)
            }
            Err(AiError::RateLimited { retry_after }) => {
                warn!(
                    provider = backend.name(),
                    %kind,
                    retry_after_secs = retry_after.map(|d| d.as_secs()),
                    "AI rate limit exceeded, using fallback"
                );
                if let Some(d) = retry_after {
                    self.gate.defer(d).await;
                }
                self.fallback(raw)
            }
            Err(e) => {
                warn!(provider = backend.name(), %kind, error = %e, "AI summarization failed, using fallback");
                self.fallback(raw)
            }
        }
    }

    fn fallback(&self, raw: &str) -> String {
        counter!("tracker_summaries_total", "mode" => "fallback").increment(1);
        fallback::extractive_summary(raw)
    }
}

pub fn build_prompt(kind: SourceKind, raw: &str) -> String {
    format!(
        "Summarize this {kind} update from a competitor in a clear, concise way.\n\
         Focus on:\n\
         - What new feature or change was announced\n\
         - Key benefits or improvements\n\
         - Impact on users or market\n\n\
         Keep it under 200 words and use bullet points for clarity.\n\n\
         Content:\n{raw}"
    )
}

/// Fit `text` into `limits`, cutting at a line or sentence end when one is
/// reasonably close, else at a word boundary. Cuts are marked with "…".
pub fn truncate_bounded(text: &str, limits: SummaryLimits) -> String {
    let text = text.trim();
    if text.chars().count() <= limits.max_chars
        && text.split_whitespace().count() <= limits.max_words
    {
        return text.to_string();
    }

    let budget = limits.max_chars.saturating_sub(1);
    let mut end = 0;
    let mut chars = 0;
    let mut words = 0;
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if chars == budget {
            break;
        }
        if c.is_whitespace() {
            in_word = false;
        } else if !in_word {
            words += 1;
            if words > limits.max_words {
                break;
            }
            in_word = true;
        }
        chars += 1;
        end = i + c.len_utf8();
    }
    let prefix = &text[..end];

    let min_keep = prefix.len() / 3;
    let cut = last_boundary(prefix)
        .filter(|&i| i >= min_keep)
        .or_else(|| prefix.rfind(char::is_whitespace))
        .unwrap_or(prefix.len());

    let mut out = prefix[..cut].trim_end().to_string();
    if out.is_empty() {
        out = prefix.trim_end().to_string();
    }
    out.push(ELLIPSIS);
    out
}

/// Byte offset just past the last newline or sentence terminator.
fn last_boundary(s: &str) -> Option<usize> {
    let mut best = None;
    let mut it = s.char_indices().peekable();
    while let Some((i, c)) = it.next() {
        match c {
            '\n' => best = Some(i),
            '.' | '!' | '?' => {
                if it.peek().is_some_and(|(_, n)| n.is_whitespace()) {
                    best = Some(i + 1);
                }
            }
            _ => {}
        }
    }
    best
}
