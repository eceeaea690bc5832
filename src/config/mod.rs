// src/config/mod.rs
//! Process settings. Everything comes from the environment (a `.env` file is
//! loaded by the binaries); missing values fall back to defaults.

pub mod ai;
pub mod sources;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub use ai::AiConfig;
pub use sources::{Locator, Source, SourceKind, SourceRegistry};

pub const DEFAULT_DB_PATH: &str = "tracker.db";

#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub run_interval_secs: u64,
    pub digest_interval_secs: u64,
    pub run_budget_secs: u64,
    pub digest_days: u32,
    pub ai: AiConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            run_interval_secs: 86_400,
            digest_interval_secs: 7 * 86_400,
            run_budget_secs: 600,
            digest_days: 7,
            ai: AiConfig::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            db_path: env::var("TRACKER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(d.db_path),
            run_interval_secs: env_u64("RUN_INTERVAL_SECS", d.run_interval_secs).max(1),
            digest_interval_secs: env_u64("DIGEST_INTERVAL_SECS", d.digest_interval_secs).max(1),
            run_budget_secs: env_u64("RUN_BUDGET_SECS", d.run_budget_secs).max(1),
            digest_days: env_u64("DIGEST_DAYS", u64::from(d.digest_days))
                .clamp(1, 365) as u32,
            ai: AiConfig::from_env(),
        }
    }

    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.run_budget_secs)
    }
}

/// "1", "true", "yes", "on" (any case) count as set.
pub fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}

pub fn env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default, "invalid number in env, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Non-empty, trimmed env value.
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
