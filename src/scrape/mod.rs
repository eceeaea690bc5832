// src/scrape/mod.rs
//! Scraper collaborator: fetches the current text of one source.
//!
//! `Ok(None)` means "nothing observed" (page gone, empty feed, no release);
//! `Err` is reserved for transport faults and is handled by the detector.

pub mod feed;
pub mod github;
pub mod page;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};

use crate::config::{env_opt, Locator, SourceKind};

const USER_AGENT: &str =
    "Mozilla/5.0 (compatible; competitor-tracker/0.1; +https://github.com/competitor-tracker)";
const MAX_TEXT_CHARS: usize = 2000;

#[async_trait]
pub trait Scraper: Send + Sync {
    async fn fetch(&self, kind: SourceKind, locator: &Locator) -> Result<Option<String>>;
}

/// Normalize text: decode entities, strip tags, straighten quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("static regex"));
    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

    let decoded = html_escape::decode_html_entities(s).to_string();
    let mut out = RE_TAGS.replace_all(&decoded, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    out = RE_WS.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect::<String>() + "...";
    }
    out
}

/// Live HTTP scraper for all four source kinds.
#[derive(Clone)]
pub struct HttpScraper {
    client: Client,
    github_token: Option<String>,
    github_api: String,
}

impl HttpScraper {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building scraper http client")?;
        Ok(Self {
            client,
            github_token: None,
            github_api: github::GITHUB_API.to_string(),
        })
    }

    /// Reads GITHUB_TOKEN for higher API limits.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new()?.with_github_token(env_opt("GITHUB_TOKEN")))
    }

    pub fn with_github_token(mut self, token: Option<String>) -> Self {
        self.github_token = token;
        self
    }

    pub fn with_github_api(mut self, base: &str) -> Self {
        self.github_api = base.trim_end_matches('/').to_string();
        self
    }

    /// GET a page. 404/410 read as "nothing there".
    async fn get_text(&self, url: &str) -> Result<Option<String>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        match resp.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(None),
            s if s.is_success() => Ok(Some(resp.text().await.with_context(|| format!("reading body of {url}"))?)),
            s => bail!("GET {url} returned {s}"),
        }
    }

    async fn fetch_blog(&self, url: &str) -> Result<Option<String>> {
        for feed_url in feed::candidate_urls(url) {
            match self.get_text(&feed_url).await {
                Ok(Some(body)) => {
                    if let Some(post) = feed::latest_entry(&body) {
                        tracing::debug!(url = %feed_url, "blog feed found");
                        return Ok(Some(post));
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::debug!(url = %feed_url, error = %e, "feed lookup failed"),
            }
        }
        Ok(self.get_text(url).await?.and_then(|html| page::blog_post(&html)))
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn fetch(&self, kind: SourceKind, locator: &Locator) -> Result<Option<String>> {
        match (kind, locator) {
            (SourceKind::GitHub, Locator::GitHub { owner, repo }) => {
                github::latest_release(
                    &self.client,
                    &self.github_api,
                    self.github_token.as_deref(),
                    owner,
                    repo,
                )
                .await
            }
            (SourceKind::Changelog, Locator::Url(url)) => {
                Ok(self.get_text(url).await?.and_then(|html| page::changelog_entry(&html)))
            }
            (SourceKind::Blog, Locator::Url(url)) => self.fetch_blog(url).await,
            (SourceKind::Pricing, Locator::Url(url)) => Ok(self
                .get_text(url)
                .await?
                .and_then(|html| page::pricing_text(&html))
                .map(|text| page::extract_pricing_info(&text))),
            (kind, locator) => bail!("{kind} source cannot be fetched from {locator:?}"),
        }
    }
}
