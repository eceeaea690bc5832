// src/summarize/backend.rs
//! AI backend abstraction + the Gemini implementation.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Error, Debug)]
pub enum AiError {
    /// Quota or rate limit hit. Callers fall back without retrying.
    #[error("AI backend rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("AI backend error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("AI request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI backend returned no text")]
    Empty,
}

#[async_trait]
pub trait AiBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;

    /// Provider name for diagnostics.
    fn name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<PartOut<'a>>,
}

#[derive(Debug, Serialize)]
struct PartOut<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartIn>,
}

#[derive(Debug, Deserialize)]
struct PartIn {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: u16,
    message: String,
}

/// Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(api_key: &str, model: &str) -> Result<Self, AiError> {
        Self::with_base_url(api_key, model, GEMINI_BASE_URL)
    }

    /// Custom base URL (tests / proxies).
    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Result<Self, AiError> {
        let client = Client::builder()
            .user_agent("competitor-tracker/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AiBackend for GeminiBackend {
    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let req = GenerateRequest {
            contents: vec![Content {
                parts: vec![PartOut { text: prompt }],
            }],
        };

        let resp = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| AiError::Http(e.without_url()))?;
        let status = resp.status();

        if !status.is_success() {
            let header_hint = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = resp.text().await.unwrap_or_default();
            let (code, message) = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), body.clone()));

            if status == StatusCode::TOO_MANY_REQUESTS || message.to_lowercase().contains("quota")
            {
                return Err(AiError::RateLimited {
                    retry_after: header_hint.or_else(|| retry_delay_from_body(&body)),
                });
            }
            return Err(AiError::Api { code, message });
        }

        let body: GenerateResponse = resp.json().await.map_err(|e| AiError::Http(e.without_url()))?;
        let text = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(AiError::Empty);
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Gemini puts `"retryDelay": "17s"` into the error details.
fn retry_delay_from_body(body: &str) -> Option<Duration> {
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#""retryDelay"\s*:\s*"(\d+)(?:\.\d+)?s""#).expect("static regex")
    });
    RE.captures(body)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(Duration::from_secs)
}
