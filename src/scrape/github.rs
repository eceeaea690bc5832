// src/scrape/github.rs
//! Latest GitHub release via the REST API.

use anyhow::{bail, Context, Result};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;

use crate::summarize::fallback::clip;

pub const GITHUB_API: &str = "https://api.github.com";
const BODY_MAX_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct Release {
    name: Option<String>,
    tag_name: Option<String>,
    body: Option<String>,
}

pub async fn latest_release(
    client: &Client,
    api: &str,
    token: Option<&str>,
    owner: &str,
    repo: &str,
) -> Result<Option<String>> {
    let url = format!("{}/repos/{owner}/{repo}/releases/latest", api.trim_end_matches('/'));
    let mut req = client
        .get(&url)
        .header(header::ACCEPT, "application/vnd.github+json")
        .header("X-GitHub-Api-Version", "2022-11-28");
    if let Some(t) = token.filter(|t| !t.is_empty()) {
        req = req.bearer_auth(t);
    }

    let resp = req.send().await.with_context(|| format!("GET {url}"))?;
    match resp.status() {
        StatusCode::NOT_FOUND => {
            tracing::debug!(%owner, %repo, "no published release");
            Ok(None)
        }
        s if s.is_success() => {
            let rel: Release = resp
                .json()
                .await
                .with_context(|| format!("decoding release of {owner}/{repo}"))?;
            Ok(release_text(
                rel.name.as_deref(),
                rel.tag_name.as_deref(),
                rel.body.as_deref(),
            ))
        }
        s => bail!("GitHub API returned {s} for {owner}/{repo}"),
    }
}

/// "name: body", with the tag standing in for a missing name.
pub fn release_text(name: Option<&str>, tag: Option<&str>, body: Option<&str>) -> Option<String> {
    let title = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .or_else(|| tag.map(str::trim).filter(|t| !t.is_empty()));
    let body = body
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(|b| clip(b, BODY_MAX_CHARS));
    match (title, body) {
        (Some(t), Some(b)) => Some(format!("{t}: {b}")),
        (Some(t), None) => Some(t.to_string()),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}
