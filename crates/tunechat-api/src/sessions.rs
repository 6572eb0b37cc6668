//! Server-side login sessions keyed by a random cookie value.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap};
use rand::Rng;
use tracing::debug;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "tunechat_session";

/// What the server remembers about a browser session.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    /// PKCE verifier of the login in progress.
    pub code_verifier: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub display_name: Option<String>,
    /// When `access_token` stops being accepted.
    pub token_expires_at: Option<Instant>,
}

impl SessionData {
    pub fn is_logged_in(&self) -> bool {
        self.display_name.is_some()
    }

    pub fn token_expired(&self, now: Instant) -> bool {
        self.token_expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug)]
struct SessionEntry {
    data: SessionData,
    last_seen: Instant,
}

/// In-memory session table with an idle timeout.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<String, SessionEntry>>>,
    ttl: Duration,
}

/// Generate a random 32-character hex session id.
fn generate_session_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionEntry>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Store `data` under a fresh id and return the id.
    pub fn create(&self, data: SessionData) -> String {
        let id = generate_session_id();
        let now = Instant::now();
        let mut sessions = self.lock();
        let ttl = self.ttl;
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) < ttl);
        sessions.insert(
            id.clone(),
            SessionEntry {
                data,
                last_seen: now,
            },
        );
        debug!(active = sessions.len(), "Session created");
        id
    }

    /// The session's data, or `None` if unknown or idle past the TTL.
    pub fn get(&self, id: &str) -> Option<SessionData> {
        let now = Instant::now();
        let mut sessions = self.lock();
        let expired = match sessions.get_mut(id) {
            Some(entry) if now.duration_since(entry.last_seen) < self.ttl => {
                entry.last_seen = now;
                return Some(entry.data.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            sessions.remove(id);
        }
        None
    }

    /// Apply `f` to a live session. Returns false if the session is gone.
    pub fn update(&self, id: &str, f: impl FnOnce(&mut SessionData)) -> bool {
        let now = Instant::now();
        let mut sessions = self.lock();
        match sessions.get_mut(id) {
            Some(entry) if now.duration_since(entry.last_seen) < self.ttl => {
                f(&mut entry.data);
                entry.last_seen = now;
                true
            }
            _ => false,
        }
    }

    /// Move a live session to a fresh id, applying `f` on the way. The old
    /// id stops working. Returns the new id, or `None` if the session is gone.
    pub fn rotate(&self, id: &str, f: impl FnOnce(&mut SessionData)) -> Option<String> {
        let now = Instant::now();
        let mut sessions = self.lock();
        let mut entry = sessions.remove(id)?;
        if now.duration_since(entry.last_seen) >= self.ttl {
            return None;
        }
        f(&mut entry.data);
        entry.last_seen = now;
        let new_id = generate_session_id();
        sessions.insert(new_id.clone(), entry);
        debug!("Session id rotated");
        Some(new_id)
    }

    pub fn remove(&self, id: &str) {
        self.lock().remove(id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The session id from the request's `Cookie` headers, if any.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value establishing a session.
pub fn session_cookie(id: &str, ttl: Duration) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        id,
        ttl.as_secs()
    )
}

/// `Set-Cookie` value removing the session cookie.
pub fn expired_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}
