//! Tunechat binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Initialize logging (stdout plus a daily log file)
//! 3. Resolve the Ollama endpoint
//! 4. Build the Spotify clients and the chat orchestrator
//! 5. Start the axum HTTP server

mod cli;

use std::sync::Arc;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use tunechat_api::routes;
use tunechat_api::state::AppState;
use tunechat_catalog::{SpotifyAuth, SpotifyClient};
use tunechat_chat::SessionOrchestrator;
use tunechat_core::config::{GeneralConfig, TunechatConfig};
use tunechat_llm::{ChatModel, OllamaClient};

use cli::CliArgs;

/// Set up tracing. The returned guard flushes the log file on drop.
fn init_logging(general: &GeneralConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&general.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut file_error = None;
    let (file_layer, guard) = match general.log_dir.as_deref() {
        Some(dir) => match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("tunechat")
            .filename_suffix("log")
            .build(dir)
        {
            Ok(appender) => {
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer().with_ansi(false).with_writer(writer);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                file_error = Some(format!("{}: {}", dir, e));
                (None, None)
            }
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        tracing::warn!(error = %e, "File logging disabled");
    }
    guard
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = TunechatConfig::load_or_default(&config_file);
    args.apply(&mut config);

    let _log_guard = init_logging(&config.general);

    tracing::info!("Starting Tunechat v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    if config.spotify.client_id.is_empty() {
        tracing::warn!("No Spotify client id configured; login will fail (set SPOTIFY_CLIENT_ID)");
    }

    // Language model.
    let model = OllamaClient::discover(config.llm.clone()).await?;
    tracing::info!(
        model = %model.model_name(),
        endpoint = %model.endpoint(),
        "Language model client ready"
    );
    if !model.is_ready().await {
        tracing::warn!(
            model = %model.model_name(),
            "Model not available yet; run `ollama pull {}`",
            model.model_name()
        );
    }

    // Spotify.
    let catalog = SpotifyClient::new(&config.spotify)?;
    let accounts = SpotifyAuth::new(&config.spotify)?;

    let orchestrator = SessionOrchestrator::new(
        Arc::new(model),
        Arc::new(catalog),
        &config.conversation,
        &config.spotify,
    );

    let state = AppState::new(config.clone(), orchestrator, Arc::new(accounts));

    tracing::info!(
        "Open http://localhost:{}/ in a browser to log in",
        config.server.port
    );
    routes::start_server(&config, state).await?;

    Ok(())
}
