// tests/summarizer.rs
//
// Summarizer behaviour against stub backends. Time is paused so rate-gate
// waits are observable without sleeping for real.
//
// Covered:
// - output is non-empty and within limits for assorted inputs
// - disabled summarizer never blocks
// - rate-limited backend degrades to the extractive fallback
// - consecutive AI calls are spaced by the gate
// - skip-wait mode falls back instead of waiting

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use competitor_tracker::config::SourceKind;
use competitor_tracker::summarize::backend::{AiBackend, AiError};
use competitor_tracker::summarize::{SummarizeError, Summarizer, SummaryLimits};

enum Reply {
    Text(&'static str),
    RateLimited(Option<Duration>),
    Fail,
}

struct Stub {
    reply: Reply,
    calls: AtomicUsize,
}

impl Stub {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AiBackend for Stub {
    async fn generate(&self, _prompt: &str) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Reply::Text(t) => Ok(t.to_string()),
            Reply::RateLimited(retry_after) => Err(AiError::RateLimited {
                retry_after: *retry_after,
            }),
            Reply::Fail => Err(AiError::Api {
                code: 500,
                message: "internal".into(),
            }),
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

fn within(s: &str, limits: SummaryLimits) -> bool {
    s.chars().count() <= limits.max_chars && s.split_whitespace().count() <= limits.max_words
}

#[tokio::test(start_paused = true)]
async fn disabled_summaries_are_bounded_and_never_wait() {
    let s = Summarizer::disabled();
    let long = "New: faster sync across devices. ".repeat(400);
    let inputs = [
        "x",
        "Release 2.0\n- Added dark mode\n- Fixed login bug",
        long.as_str(),
        "   leading whitespace then text   ",
    ];

    let t0 = Instant::now();
    for raw in inputs {
        let out = s
            .summarize(raw, SourceKind::Changelog, Some("Acme"))
            .await
            .expect("summary");
        assert!(!out.trim().is_empty());
        assert!(within(&out, s.limits()), "out of bounds: {} chars", out.chars().count());
    }
    assert_eq!(t0.elapsed(), Duration::ZERO, "fallback path must not sleep");
}

#[tokio::test]
async fn whitespace_input_is_rejected() {
    let s = Summarizer::disabled();
    let err = s.summarize(" \n\t ", SourceKind::Blog, None).await.unwrap_err();
    assert_eq!(err, SummarizeError::EmptyInput);
}

#[tokio::test(start_paused = true)]
async fn oversized_ai_reply_is_truncated() {
    let stub = Stub::new(Reply::Text(
        "This release brings an enormous list of improvements to every corner of the product. ",
    ));
    let limits = SummaryLimits::new(60, 30);
    let s = Summarizer::new(Some(stub.clone()), Duration::ZERO).with_limits(limits);
    let out = s.summarize("anything", SourceKind::Blog, Some("Acme")).await.unwrap();
    assert!(within(&out, limits));
    assert!(out.ends_with('…'));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_backend_falls_back_to_extractive_summary() {
    let stub = Stub::new(Reply::RateLimited(Some(Duration::from_secs(17))));
    let s = Summarizer::new(Some(stub.clone()), Duration::from_secs(30));

    let raw = "Launch week recap\n- Added roadmaps\n- Improved search";
    let out = s.summarize(raw, SourceKind::Blog, Some("Acme")).await.unwrap();
    assert!(out.contains("Launch week recap"), "fallback keeps the title: {out}");
    assert!(out.contains("Added roadmaps"));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn backend_errors_fall_back_without_failing() {
    let stub = Stub::new(Reply::Fail);
    let s = Summarizer::new(Some(stub), Duration::ZERO);
    let out = s
        .summarize("Pricing info: $8, Pro, Enterprise", SourceKind::Pricing, Some("Acme"))
        .await
        .unwrap();
    assert!(out.contains("Pricing info"));
}

#[tokio::test(start_paused = true)]
async fn consecutive_ai_calls_are_spaced_by_the_gate() {
    let stub = Stub::new(Reply::Text("• Added roadmaps"));
    let s = Summarizer::new(Some(stub.clone()), Duration::from_secs(30));

    let t0 = Instant::now();
    s.summarize("one", SourceKind::Changelog, None).await.unwrap();
    assert!(t0.elapsed() < Duration::from_secs(1), "first call passes immediately");

    s.summarize("two", SourceKind::Changelog, None).await.unwrap();
    assert!(t0.elapsed() >= Duration::from_secs(30), "second call waits for the slot");
    assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn skip_wait_uses_fallback_while_gate_is_closed() {
    let stub = Stub::new(Reply::Text("• Added roadmaps"));
    let s = Summarizer::new(Some(stub.clone()), Duration::from_secs(30)).with_skip_wait(true);

    let t0 = Instant::now();
    s.summarize("first", SourceKind::Changelog, None).await.unwrap();
    let second = s
        .summarize("Second update title", SourceKind::Changelog, None)
        .await
        .unwrap();

    assert!(t0.elapsed() < Duration::from_secs(1));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1, "second call skipped the backend");
    assert!(second.contains("Second update title"));
}
