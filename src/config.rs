//! Provider settings from the environment and `.env` files.

use std::path::PathBuf;
use std::time::Duration;

pub const APP_DIR_NAME: &str = "statement-extractor";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    /// Load `.env` from the working directory, then from the app data dir, then read
    /// the process environment. Variables already set are never overwritten.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        if let Some(env_path) = app_data_dir().map(|d| d.join(".env")) {
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
            }
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();
        let timeout = non_empty("GROQ_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        Self {
            api_key: non_empty("GROQ_API_KEY"),
            model: non_empty("GROQ_MODEL").unwrap_or(defaults.model),
            base_url: non_empty("GROQ_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            timeout,
            ..defaults
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(m) = model.filter(|m| !m.trim().is_empty()) {
            self.model = m.trim().to_string();
        }
        self
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(u) = base_url.filter(|u| !u.trim().is_empty()) {
            self.base_url = u.trim().trim_end_matches('/').to_string();
        }
        self
    }

    pub fn provider_status(&self) -> &'static str {
        if self.api_key.is_some() {
            "configured"
        } else {
            "not_configured"
        }
    }
}

/// Per-user data directory where a `.env` with credentials can live.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR_NAME))
}
