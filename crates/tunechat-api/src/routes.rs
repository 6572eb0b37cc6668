//! Router setup with all routes and middleware.

use std::path::Path;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tunechat_core::config::TunechatConfig;
use tunechat_core::error::TunechatError;

use crate::handlers;
use crate::state::AppState;

/// Request bodies are single chat messages.
const BODY_LIMIT: usize = 64 * 1024;

fn localhost_origins(port: u16) -> Vec<HeaderValue> {
    ["127.0.0.1", "localhost"]
        .iter()
        .filter_map(|host| format!("http://{}:{}", host, port).parse().ok())
        .collect()
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(localhost_origins(state.config.server.port)))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    let pages = Router::new()
        .route("/", get(handlers::index))
        .route("/login", get(handlers::login))
        .route("/callback", get(handlers::callback))
        .route("/chat", get(handlers::chat_page))
        .route("/logout", get(handlers::logout))
        .route("/health", get(handlers::health));

    let api = Router::new()
        .route("/api/send_message", post(handlers::send_message))
        .route("/api/stream_message", post(handlers::stream_message))
        .route("/api/clear_history", post(handlers::clear_history))
        .route("/api/model/status", get(handlers::model_status))
        .route("/api/model/rediscover", post(handlers::rediscover_model));

    let mut router = pages.merge(api);

    let static_dir = &state.config.server.static_dir;
    if Path::new(static_dir).is_dir() {
        router = router.nest_service("/static", ServeDir::new(static_dir));
    } else {
        warn!(dir = %static_dir, "Static directory not found, /static disabled");
    }

    router
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
pub async fn start_server(config: &TunechatConfig, state: AppState) -> Result<(), TunechatError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let router = create_router(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TunechatError::Server(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| TunechatError::Server(format!("Server error: {}", e)))?;

    Ok(())
}
