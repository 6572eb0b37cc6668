//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tunechat_catalog::AccountService;
use tunechat_chat::SessionOrchestrator;
use tunechat_core::config::TunechatConfig;

use crate::sessions::SessionStore;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TunechatConfig>,
    /// Chat handling; also owns the language model handle.
    pub orchestrator: Arc<SessionOrchestrator>,
    /// Spotify login and token refresh.
    pub accounts: Arc<dyn AccountService>,
    pub sessions: SessionStore,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: TunechatConfig,
        orchestrator: SessionOrchestrator,
        accounts: Arc<dyn AccountService>,
    ) -> Self {
        let sessions = SessionStore::new(Duration::from_secs(config.server.session_ttl_secs));
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            accounts,
            sessions,
            start_time: Instant::now(),
        }
    }
}
