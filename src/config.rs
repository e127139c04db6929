//! Configuration module for tablechat.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::{ChatError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/tablechat.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/tablechat.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Chat configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Maximum number of in-game messages kept and sent in one backlog.
    #[serde(default = "default_table_chat_limit")]
    pub table_chat_limit: usize,
    /// Number of lobby messages sent when a user connects.
    #[serde(default = "default_lobby_history_count")]
    pub lobby_history_count: usize,
    /// Maximum message length in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// Display name used for server notices.
    #[serde(default = "default_website_name")]
    pub website_name: String,
}

fn default_table_chat_limit() -> usize {
    crate::chat::CHAT_LIMIT
}

fn default_lobby_history_count() -> usize {
    50
}

fn default_max_message_length() -> usize {
    300
}

fn default_website_name() -> String {
    "tablechat".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            table_chat_limit: default_table_chat_limit(),
            lobby_history_count: default_lobby_history_count(),
            max_message_length: default_max_message_length(),
            website_name: default_website_name(),
        }
    }
}

/// External messaging bridge configuration.
///
/// The maps translate platform IDs to display strings. When the bridge is
/// disabled, message bodies are never rewritten.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeConfig {
    /// Whether the bridge is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// User ID to nickname.
    #[serde(default)]
    pub users: HashMap<String, String>,
    /// Role ID to role name.
    #[serde(default)]
    pub roles: HashMap<String, String>,
    /// Channel ID to channel name.
    #[serde(default)]
    pub channels: HashMap<String, String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Chat configuration.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Bridge configuration.
    #[serde(default)]
    pub bridge: BridgeConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ChatError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ChatError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `TABLECHAT_LOG_LEVEL`: Override the log level
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("TABLECHAT_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - `table_chat_limit` is zero
    /// - a bridge map contains an ID that is not 17-19 digits
    pub fn validate(&self) -> Result<()> {
        if self.chat.table_chat_limit == 0 {
            return Err(ChatError::Config(
                "chat.table_chat_limit must be greater than zero".to_string(),
            ));
        }

        let bridge = &self.bridge;
        for (section, map) in [
            ("users", &bridge.users),
            ("roles", &bridge.roles),
            ("channels", &bridge.channels),
        ] {
            if let Some(id) = map.keys().find(|id| !is_platform_id(id)) {
                return Err(ChatError::Config(format!(
                    "bridge.{section} contains invalid ID \"{id}\""
                )));
            }
        }
        Ok(())
    }
}

fn is_platform_id(id: &str) -> bool {
    (17..=19).contains(&id.len()) && id.bytes().all(|b| b.is_ascii_digit())
}
