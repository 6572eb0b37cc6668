use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TunechatError};

/// Top-level configuration for Tunechat.
///
/// Loaded from `~/.tunechat/config.toml` by default. Every section falls back
/// to its defaults when absent, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TunechatConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
}

impl TunechatConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TunechatConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| TunechatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Directory for daily log files. Stdout only when unset.
    pub log_dir: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: Some("logs".to_string()),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served under `/static`, skipped if it does not exist.
    pub static_dir: String,
    /// Idle lifetime of a login session.
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8888,
            static_dir: "static".to_string(),
            session_ttl_secs: 3600,
        }
    }
}

/// Local generation service (Ollama) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model name, matched as a substring of the names the service lists.
    pub model: String,
    /// Probed first at startup.
    pub primary_endpoint: String,
    /// Used when the primary probe fails or times out.
    pub fallback_endpoint: String,
    pub probe_timeout_ms: u64,
    pub ready_timeout_secs: u64,
    pub chat_timeout_secs: u64,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "deepseek-r1:1.5b".to_string(),
            primary_endpoint: "http://localhost:11434".to_string(),
            fallback_endpoint: "http://ollama:11434".to_string(),
            probe_timeout_ms: 1000,
            ready_timeout_secs: 3,
            chat_timeout_secs: 120,
            temperature: 0.2,
            top_p: 0.8,
        }
    }
}

/// Spotify Web API and OAuth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub api_base: String,
    pub accounts_base: String,
    pub request_timeout_secs: u64,
    /// Number of top artists/tracks fetched per recommendation.
    pub top_items_limit: u32,
    /// `short_term`, `medium_term` or `long_term`.
    pub time_range: String,
    pub search_limit: u32,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: "http://localhost:8888/callback".to_string(),
            scopes: vec![
                "user-read-private".to_string(),
                "user-read-email".to_string(),
                "user-top-read".to_string(),
            ],
            api_base: "https://api.spotify.com/v1".to_string(),
            accounts_base: "https://accounts.spotify.com".to_string(),
            request_timeout_secs: 10,
            top_items_limit: 10,
            time_range: "medium_term".to_string(),
            search_limit: 5,
        }
    }
}

/// Conversation history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// History entries included in the intent prompt.
    pub context_turns: usize,
    /// Per-session cap on stored messages. Unbounded when unset.
    pub max_messages: Option<usize>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            context_turns: 3,
            max_messages: None,
        }
    }
}
