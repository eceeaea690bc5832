// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use super::{env_flag, env_u64};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_MIN_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// False when DISABLE_GEMINI_API is set or no key is available.
    pub enabled: bool,
    pub api_key: String,
    pub model: String,
    /// Minimum spacing between two AI calls, process-wide.
    pub min_interval_secs: u64,
    /// Use the fallback instead of blocking on the rate gate.
    #[serde(default)]
    pub skip_rate_limit_wait: bool,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            min_interval_secs: DEFAULT_MIN_INTERVAL_SECS,
            skip_rate_limit_wait: false,
        }
    }
}

impl AiConfig {
    pub fn from_env() -> Self {
        let api_key = env::var("GEMINI_API_KEY")
            .unwrap_or_default()
            .trim()
            .to_string();
        let disabled = env_flag("DISABLE_GEMINI_API");
        let model = env::var("GEMINI_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        Self {
            enabled: !disabled && !api_key.is_empty(),
            api_key,
            model,
            min_interval_secs: env_u64("AI_MIN_INTERVAL_SECS", DEFAULT_MIN_INTERVAL_SECS),
            skip_rate_limit_wait: env_flag("SKIP_RATE_LIMIT_WAIT"),
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }
}
