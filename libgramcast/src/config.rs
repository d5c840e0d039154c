//! Configuration management for Gramcast

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::error::{ConfigError, Result};
use crate::platforms::PollTiming;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram: Option<InstagramConfig>,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Instagram Graph API account settings.
///
/// The access token is read from `INSTAGRAM_ACCESS_TOKEN` when set, falling
/// back to `token_file`; the account id from `INSTAGRAM_ACCOUNT_ID`, falling
/// back to `account_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_file: Option<String>,
    /// Graph API base URL, overridable for tests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl InstagramConfig {
    /// Resolve credentials from environment and config.
    ///
    /// Returns `None` when either the token or the account id is absent;
    /// the pipeline skips the whole run in that case.
    pub fn credentials(&self) -> Option<Credentials> {
        let access_token = match std::env::var("INSTAGRAM_ACCESS_TOKEN") {
            Ok(token) if !token.trim().is_empty() => Some(token.trim().to_string()),
            _ => self.read_token_file(),
        }?;

        let account_id = match std::env::var("INSTAGRAM_ACCOUNT_ID") {
            Ok(id) if !id.trim().is_empty() => Some(id.trim().to_string()),
            _ => self.account_id.clone().filter(|id| !id.is_empty()),
        }?;

        Some(Credentials {
            access_token,
            account_id,
        })
    }

    fn read_token_file(&self) -> Option<String> {
        let token_file = self.token_file.as_ref()?;
        let path = shellexpand::tilde(token_file).to_string();
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let token = content.trim().to_string();
                if token.is_empty() {
                    warn!("Instagram token file {} is empty", path);
                    None
                } else {
                    Some(token)
                }
            }
            Err(e) => {
                warn!("Failed to read Instagram token file {}: {}", path, e);
                None
            }
        }
    }
}

/// Bearer credential pair required by every Graph API call
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_token: String,
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Seconds between pipeline trigger invocations
    pub poll_interval: u64,
    /// Maximum posts processed per invocation
    pub batch_size: usize,
    /// Posts stuck in processing longer than this are returned to pending
    pub stale_after_minutes: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            poll_interval: 60,
            batch_size: 10,
            stale_after_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Seconds between container readiness polls
    pub poll_interval_secs: u64,
    /// Readiness deadline for feed media
    pub max_wait_secs: u64,
    /// Readiness deadline for reels; video transcoding takes longer
    pub reel_max_wait_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            max_wait_secs: 60,
            reel_max_wait_secs: 180,
        }
    }
}

impl PublishConfig {
    pub fn timing(&self) -> PollTiming {
        PollTiming {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_wait: Duration::from_secs(self.max_wait_secs),
            reel_max_wait: Duration::from_secs(self.reel_max_wait_secs),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/gramcast/posts.db".to_string(),
            },
            instagram: Some(InstagramConfig {
                account_id: None,
                token_file: Some("~/.config/gramcast/instagram.token".to_string()),
                api_base: None,
            }),
            scheduling: SchedulingConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("GRAMCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("gramcast").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("gramcast"))
}
