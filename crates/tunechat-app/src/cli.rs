//! CLI argument definitions for the Tunechat server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use tunechat_core::config::TunechatConfig;

/// Tunechat - chat about your mood, get Spotify recommendations.
#[derive(Parser, Debug)]
#[command(name = "tunechat", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// HTTP server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Ollama model name.
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TUNECHAT_CONFIG env var > ~/.tunechat/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("TUNECHAT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Layer flags and environment variables over a loaded configuration.
    pub fn apply(&self, config: &mut TunechatConfig) {
        self.apply_with_env(config, |name| std::env::var(name).ok());
    }

    fn apply_with_env(&self, config: &mut TunechatConfig, env: impl Fn(&str) -> Option<String>) {
        if let Some(port) = self
            .port
            .or_else(|| env("TUNECHAT_PORT").and_then(|v| v.parse().ok()))
        {
            config.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(ref model) = self.model {
            config.llm.model = model.clone();
        }
        if let Some(id) = env("SPOTIFY_CLIENT_ID").filter(|v| !v.is_empty()) {
            config.spotify.client_id = id;
        }
        if let Some(uri) = env("SPOTIFY_REDIRECT_URI").filter(|v| !v.is_empty()) {
            config.spotify.redirect_uri = uri;
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".tunechat").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".tunechat").join("config.toml");
    }
    PathBuf::from("config.toml")
}
