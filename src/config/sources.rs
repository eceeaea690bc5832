// src/config/sources.rs
//! Source Registry: which competitor surfaces are tracked.
//!
//! Loaded once at startup, either from a TOML file or from the built-in list.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_COMPETITORS_PATH: &str = "COMPETITORS_CONFIG_PATH";
pub const DEFAULT_COMPETITORS_PATH: &str = "config/competitors.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Changelog,
    Blog,
    Pricing,
    #[serde(rename = "github")]
    GitHub,
}

impl SourceKind {
    /// Enumeration order used by the detector.
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Changelog,
        SourceKind::Blog,
        SourceKind::Pricing,
        SourceKind::GitHub,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Changelog => "changelog",
            SourceKind::Blog => "blog",
            SourceKind::Pricing => "pricing",
            SourceKind::GitHub => "github",
        }
    }

    /// Title-cased label for headings ("Changelog", "Github").
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Changelog => "Changelog",
            SourceKind::Blog => "Blog",
            SourceKind::Pricing => "Pricing",
            SourceKind::GitHub => "Github",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            SourceKind::Changelog => "🆕",
            SourceKind::Blog => "📝",
            SourceKind::Pricing => "💰",
            SourceKind::GitHub => "🐙",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "changelog" => Ok(SourceKind::Changelog),
            "blog" => Ok(SourceKind::Blog),
            "pricing" => Ok(SourceKind::Pricing),
            "github" => Ok(SourceKind::GitHub),
            other => Err(anyhow!("unknown source kind: {other}")),
        }
    }
}

/// Where a scraper should look for a source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Url(String),
    GitHub { owner: String, repo: String },
}

/// One trackable (competitor, kind, locator) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub competitor: String,
    pub kind: SourceKind,
    pub locator: Locator,
}

impl Source {
    pub fn url(competitor: &str, kind: SourceKind, url: &str) -> Self {
        Self {
            competitor: competitor.to_string(),
            kind,
            locator: Locator::Url(url.to_string()),
        }
    }

    pub fn github(competitor: &str, owner: &str, repo: &str) -> Self {
        Self {
            competitor: competitor.to_string(),
            kind: SourceKind::GitHub,
            locator: Locator::GitHub {
                owner: owner.to_string(),
                repo: repo.to_string(),
            },
        }
    }

    /// Key under which observations are stored.
    pub fn source_url(&self) -> String {
        match &self.locator {
            Locator::Url(u) => u.clone(),
            Locator::GitHub { owner, repo } => format!("github://{owner}/{repo}"),
        }
    }

    /// Human-facing link for notifications.
    pub fn link(&self) -> String {
        match &self.locator {
            Locator::Url(u) => u.clone(),
            Locator::GitHub { owner, repo } => {
                format!("https://github.com/{owner}/{repo}/releases")
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RegistryFile {
    #[serde(default, rename = "competitor")]
    competitors: Vec<CompetitorEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct CompetitorEntry {
    name: String,
    changelog: Option<String>,
    blog: Option<String>,
    pricing: Option<String>,
    github: Option<GitHubEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct GitHubEntry {
    owner: String,
    repo: String,
}

/// Static mapping of competitor -> trackable surfaces.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<Source>) -> Result<Self> {
        let mut seen = HashSet::new();
        for s in &sources {
            if s.competitor.trim().is_empty() {
                bail!("source with empty competitor name ({})", s.source_url());
            }
            if let Locator::Url(u) = &s.locator {
                if u.trim().is_empty() {
                    bail!("{} {} has an empty url", s.competitor, s.kind);
                }
            }
            if !seen.insert(s.source_url()) {
                bail!("duplicate source: {}", s.source_url());
            }
        }
        Ok(Self { sources })
    }

    /// Linear, Notion and Figma, as tracked out of the box.
    pub fn builtin() -> Self {
        let sources = vec![
            Source::url("Linear", SourceKind::Changelog, "https://linear.app/changelog"),
            Source::url("Figma", SourceKind::Changelog, "https://www.figma.com/changelog"),
            Source::url("Linear", SourceKind::Blog, "https://linear.app/blog"),
            Source::url("Notion", SourceKind::Blog, "https://www.notion.so/blog"),
            Source::url("Figma", SourceKind::Blog, "https://www.figma.com/blog"),
            Source::url("Linear", SourceKind::Pricing, "https://linear.app/pricing"),
            Source::url("Notion", SourceKind::Pricing, "https://www.notion.so/pricing"),
            Source::url("Figma", SourceKind::Pricing, "https://www.figma.com/pricing"),
            Source::github("Linear", "linear", "linear"),
        ];
        Self { sources }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: RegistryFile = toml::from_str(s).context("parsing competitors toml")?;
        if file.competitors.is_empty() {
            bail!("competitors file lists no [[competitor]] entries");
        }

        let mut sources = Vec::new();
        for kind in SourceKind::ALL {
            for c in &file.competitors {
                let name = c.name.trim();
                let entry = match kind {
                    SourceKind::Changelog => c.changelog.as_deref().map(|u| Source::url(name, kind, u.trim())),
                    SourceKind::Blog => c.blog.as_deref().map(|u| Source::url(name, kind, u.trim())),
                    SourceKind::Pricing => c.pricing.as_deref().map(|u| Source::url(name, kind, u.trim())),
                    SourceKind::GitHub => c
                        .github
                        .as_ref()
                        .map(|g| Source::github(name, g.owner.trim(), g.repo.trim())),
                };
                if let Some(src) = entry {
                    sources.push(src);
                }
            }
        }
        Self::new(sources)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading competitors from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("loading competitors from {}", path.display()))
    }

    /// 1) $COMPETITORS_CONFIG_PATH (must exist)
    /// 2) config/competitors.toml
    /// 3) built-in list
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_COMPETITORS_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_COMPETITORS_PATH} points to non-existent path");
            }
            return Self::load_from(&pb);
        }
        let default = PathBuf::from(DEFAULT_COMPETITORS_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        tracing::info!("no competitors file found, using built-in registry");
        Ok(Self::builtin())
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn competitors(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for s in &self.sources {
            if !out.contains(&s.competitor.as_str()) {
                out.push(&s.competitor);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_is_enumerated_kind_major() {
        let toml = r#"
            [[competitor]]
            name = "Linear"
            changelog = "https://linear.app/changelog"
            pricing = "https://linear.app/pricing"
            github = { owner = "linear", repo = "linear" }

            [[competitor]]
            name = " Figma "
            changelog = "https://www.figma.com/changelog"
        "#;
        let reg = SourceRegistry::from_toml_str(toml).unwrap();
        let urls: Vec<String> = reg.sources().iter().map(Source::source_url).collect();
        assert_eq!(
            urls,
            vec![
                "https://linear.app/changelog",
                "https://www.figma.com/changelog",
                "https://linear.app/pricing",
                "github://linear/linear",
            ]
        );
        assert_eq!(reg.sources()[1].competitor, "Figma");
        assert_eq!(reg.competitors(), vec!["Linear", "Figma"]);
    }

    #[test]
    fn duplicate_urls_are_rejected() {
        let toml = r#"
            [[competitor]]
            name = "A"
            blog = "https://x.com/blog"
            [[competitor]]
            name = "B"
            blog = "https://x.com/blog"
        "#;
        let err = SourceRegistry::from_toml_str(toml).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate source"));
    }

    #[test]
    fn github_link_differs_from_store_key() {
        let s = Source::github("Linear", "linear", "linear");
        assert_eq!(s.source_url(), "github://linear/linear");
        assert_eq!(s.link(), "https://github.com/linear/linear/releases");
    }

    #[test]
    fn kind_round_trips_through_str() {
        for k in SourceKind::ALL {
            assert_eq!(k.as_str().parse::<SourceKind>().unwrap(), k);
        }
        assert!("social".parse::<SourceKind>().is_err());
    }

    #[test]
    fn builtin_registry_is_valid() {
        let reg = SourceRegistry::builtin();
        assert!(SourceRegistry::new(reg.sources().to_vec()).is_ok());
        assert_eq!(reg.competitors(), vec!["Linear", "Figma", "Notion"]);
    }
}
