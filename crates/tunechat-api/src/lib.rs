//! Tunechat HTTP layer: pages, Spotify login flow, chat API and SSE streaming.

pub mod error;
pub mod handlers;
pub mod pages;
pub mod routes;
pub mod sessions;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use sessions::{SessionData, SessionStore, SESSION_COOKIE};
pub use state::AppState;
