use crate::probe::ProbeSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// URL shipped in the sample config; a site still pointing at it was never set up.
pub const PLACEHOLDER_URL: &str = "https://your-project.vercel.app";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct KeepAliveConfig {
    #[validate(length(min = 1))]
    pub websites: Vec<Site>,

    #[serde(default)]
    pub global: GlobalSettings,

    #[serde(default = "default_stats_file")]
    pub stats_file: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub output: Option<OutputConfig>,
}

impl KeepAliveConfig {
    /// Validates the top level, the global defaults and every site.
    pub fn validate_all(&self) -> Result<(), validator::ValidationErrors> {
        self.validate()?;
        self.global.validate()?;
        for site in &self.websites {
            site.validate()?;
        }
        Ok(())
    }
}

/// A probe target. Per-site values override [`GlobalSettings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    #[serde(default)]
    pub name: Option<String>,

    #[validate(url, custom = "not_placeholder")]
    pub url: String,

    /// Request timeout in milliseconds.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub max_retries: Option<u32>,

    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Site {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            url: url.into(),
            timeout: None,
            max_retries: None,
            user_agent: None,
        }
    }

    /// Identity used in stats and reports: the name, or the URL when unnamed.
    pub fn label(&self) -> &str {
        match &self.name {
            Some(name) if !name.is_empty() => name,
            _ => &self.url,
        }
    }

    pub fn settings(&self, global: &GlobalSettings) -> ProbeSettings {
        ProbeSettings {
            timeout: Duration::from_millis(self.timeout.unwrap_or(global.timeout)),
            max_retries: self.max_retries.unwrap_or(global.max_retries),
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| global.user_agent.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    /// Milliseconds.
    #[serde(default = "default_timeout")]
    #[validate(range(min = 1))]
    pub timeout: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Minutes between runs in watch mode.
    #[serde(default = "default_check_interval")]
    #[validate(range(min = 1))]
    pub check_interval: u64,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
            check_interval: default_check_interval(),
        }
    }
}

impl GlobalSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval * 60)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputConfig {
    Console,
    Json {
        path: String,
    },
    Csv {
        path: String,
    },
}

/// Single-site config shape used by early versions of the tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyConfig {
    pub website_url: String,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub check_interval: Option<u64>,
}

impl From<LegacyConfig> for KeepAliveConfig {
    fn from(legacy: LegacyConfig) -> Self {
        let global = GlobalSettings {
            timeout: legacy.timeout.unwrap_or_else(default_timeout),
            max_retries: legacy.max_retries.unwrap_or_else(default_max_retries),
            user_agent: legacy.user_agent.unwrap_or_else(default_user_agent),
            check_interval: legacy.check_interval.unwrap_or_else(default_check_interval),
        };

        Self {
            websites: vec![Site::new("website-1", legacy.website_url)],
            global,
            stats_file: default_stats_file(),
            log_dir: default_log_dir(),
            output: None,
        }
    }
}

fn not_placeholder(url: &str) -> Result<(), ValidationError> {
    if url.trim_end_matches('/') == PLACEHOLDER_URL {
        return Err(ValidationError::new("placeholder_url"));
    }
    Ok(())
}

fn default_timeout() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_check_interval() -> u64 {
    5
}

fn default_stats_file() -> String {
    "logs/stats.json".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}
