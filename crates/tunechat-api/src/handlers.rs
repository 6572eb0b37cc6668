//! Route handler functions for the pages, login flow and chat API.

use std::convert::Infallible;
use std::pin::Pin;
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tunechat_catalog::generate_code_verifier;
use tunechat_chat::{ChatError, ChatReply};
use tunechat_core::SessionKey;
use tunechat_llm::ChatChunk;

use crate::error::ApiError;
use crate::pages;
use crate::sessions::{expired_cookie, session_cookie, session_id, SessionData};
use crate::state::AppState;

/// History key used by `clear_history` when the caller has no credential.
const ANONYMOUS_KEY: &str = "anonymous";

/// Display name used when the profile lookup fails or has none.
const DEFAULT_DISPLAY_NAME: &str = "Spotify User";

// =============================================================================
// Request and response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearHistoryResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelStatusResponse {
    pub model: String,
    pub endpoint: String,
    pub ready: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RediscoverResponse {
    pub endpoint: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

// =============================================================================
// Helpers
// =============================================================================

fn with_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => warn!(error = %e, "Invalid Set-Cookie value"),
    }
    response
}

fn current_session(state: &AppState, headers: &HeaderMap) -> Option<(String, SessionData)> {
    let id = session_id(headers)?;
    let data = state.sessions.get(&id)?;
    Some((id, data))
}

/// The caller's catalog credential, refreshing it first if it has expired.
///
/// A successful refresh moves the conversation history to the new token. A
/// failed refresh keeps the old token; the catalog then degrades to empty
/// results.
async fn session_credential(state: &AppState, headers: &HeaderMap) -> Option<SessionKey> {
    let (id, data) = current_session(state, headers)?;
    let access_token = data.access_token.clone()?;

    if !data.token_expired(Instant::now()) {
        return Some(SessionKey::new(access_token));
    }
    let Some(refresh_token) = data.refresh_token.as_deref() else {
        return Some(SessionKey::new(access_token));
    };

    match state.accounts.refresh_access_token(refresh_token).await {
        Ok(tokens) => {
            let old = SessionKey::new(access_token);
            let new = SessionKey::new(tokens.access_token.clone());
            if let Err(e) = state.orchestrator.rekey(&old, &new) {
                warn!(error = %e, "Failed to carry history over to refreshed token");
            }
            state.sessions.update(&id, |d| {
                d.access_token = Some(tokens.access_token.clone());
                if let Some(refresh) = tokens.refresh_token.clone() {
                    d.refresh_token = Some(refresh);
                }
                d.token_expires_at = expiry(tokens.expires_in);
            });
            info!("Access token refreshed");
            Some(new)
        }
        Err(e) => {
            warn!(error = %e, "Token refresh failed, keeping current token");
            Some(SessionKey::new(access_token))
        }
    }
}

fn expiry(expires_in: u64) -> Option<Instant> {
    (expires_in > 0).then(|| Instant::now() + Duration::from_secs(expires_in))
}

// =============================================================================
// Pages and login flow
// =============================================================================

/// GET / - login page, or straight to the chat when logged in.
pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match current_session(&state, &headers) {
        Some((_, data)) if data.is_logged_in() => Redirect::to("/chat").into_response(),
        _ => Html(pages::LOGIN_HTML).into_response(),
    }
}

/// GET /login - start a PKCE login and send the browser to Spotify.
pub async fn login(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let verifier = generate_code_verifier();
    let url = match state.accounts.authorize_url(&verifier) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "Could not build authorize URL");
            return Redirect::to("/").into_response();
        }
    };

    let existing = session_id(&headers).filter(|id| {
        state
            .sessions
            .update(id, |d| d.code_verifier = Some(verifier.clone()))
    });

    let response = Redirect::to(&url).into_response();
    match existing {
        Some(_) => response,
        None => {
            let id = state.sessions.create(SessionData {
                code_verifier: Some(verifier),
                ..SessionData::default()
            });
            with_cookie(response, &session_cookie(&id, state.sessions.ttl()))
        }
    }
}

/// GET /callback - finish the login. Any failure lands back on `/`.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    let home = || Redirect::to("/").into_response();

    if let Some(error) = params.error {
        warn!(error = %error, "Spotify authorization denied");
        return home();
    }
    let Some(code) = params.code else {
        return home();
    };
    let Some((id, data)) = current_session(&state, &headers) else {
        warn!("Callback without a session");
        return home();
    };
    let Some(verifier) = data.code_verifier else {
        warn!("Callback without a pending login");
        return home();
    };

    let tokens = match state.accounts.exchange_code(&code, &verifier).await {
        Ok(tokens) => tokens,
        Err(_) => return home(),
    };

    let display_name = match state.accounts.user_profile(&tokens.access_token).await {
        Ok(profile) => profile
            .display_name
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
        Err(_) => DEFAULT_DISPLAY_NAME.to_string(),
    };

    // The pre-login id was handed out before authentication; the logged-in
    // session gets a new one.
    let rotated = state.sessions.rotate(&id, |d| {
        d.code_verifier = None;
        d.access_token = Some(tokens.access_token.clone());
        d.refresh_token = tokens.refresh_token.clone();
        d.token_expires_at = expiry(tokens.expires_in);
        d.display_name = Some(display_name.clone());
    });
    let Some(new_id) = rotated else {
        return home();
    };

    info!(display_name = %display_name, "User logged in");
    with_cookie(
        Redirect::to("/chat").into_response(),
        &session_cookie(&new_id, state.sessions.ttl()),
    )
}

/// GET /chat - the chat page for a logged-in user.
pub async fn chat_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    match current_session(&state, &headers).and_then(|(_, d)| d.display_name) {
        Some(name) => Ok(Html(pages::chat_html(&name)?).into_response()),
        None => Ok(Redirect::to("/").into_response()),
    }
}

/// GET /logout - forget the session.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = session_id(&headers) {
        state.sessions.remove(&id);
    }
    with_cookie(Redirect::to("/").into_response(), &expired_cookie())
}

// =============================================================================
// Chat API
// =============================================================================

/// POST /api/send_message - one chat turn. Always 200 with a reply body.
pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<MessageRequest>,
) -> Json<ChatReply> {
    let credential = session_credential(&state, &headers).await;
    let reply = state
        .orchestrator
        .handle_message(credential.as_ref(), &request.message)
        .await;
    Json(reply)
}

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

fn chunk_event(chunk: &ChatChunk) -> Event {
    Event::default()
        .event("chunk")
        .data(serde_json::to_string(chunk).unwrap_or_default())
}

fn error_event(err: &ChatError) -> Event {
    Event::default()
        .event("error")
        .data(serde_json::json!({ "message": err.reply_text() }).to_string())
}

/// POST /api/stream_message - a plain conversational reply as SSE `chunk`
/// events, then a final `done` event.
pub async fn stream_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<MessageRequest>,
) -> Sse<KeepAliveStream<EventStream>> {
    let credential = session_credential(&state, &headers).await;

    let events: EventStream = match state
        .orchestrator
        .stream_reply(credential.as_ref(), &request.message)
        .await
    {
        Ok(chunks) => Box::pin(chunks.map(|item| {
            Ok::<_, Infallible>(match item {
                Ok(chunk) => chunk_event(&chunk),
                Err(e) => {
                    warn!(error = %e, "Reply stream failed");
                    error_event(&e)
                }
            })
        })),
        Err(e) => {
            info!(reason = %e, "Reply stream not started");
            Box::pin(futures::stream::iter([Ok::<_, Infallible>(error_event(&e))]))
        }
    };

    let done = futures::stream::once(async {
        Ok::<_, Infallible>(Event::default().event("done").data("{}"))
    });
    let stream: EventStream = Box::pin(events.chain(done));
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// POST /api/clear_history - empty the caller's conversation. Always
/// reports success.
pub async fn clear_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<ClearHistoryResponse> {
    let key = current_session(&state, &headers)
        .and_then(|(_, d)| d.access_token)
        .map(SessionKey::new)
        .unwrap_or_else(|| SessionKey::from(ANONYMOUS_KEY));
    if let Err(e) = state.orchestrator.clear(&key) {
        warn!(error = %e, "Failed to clear conversation history");
    }
    Json(ClearHistoryResponse { success: true })
}

// =============================================================================
// Model and health
// =============================================================================

/// GET /api/model/status - configured model, endpoint in use, readiness.
pub async fn model_status(State(state): State<AppState>) -> Json<ModelStatusResponse> {
    let model = state.orchestrator.model();
    Json(ModelStatusResponse {
        model: model.model_name().to_string(),
        endpoint: model.endpoint(),
        ready: model.is_ready().await,
    })
}

/// POST /api/model/rediscover - re-run endpoint discovery.
pub async fn rediscover_model(State(state): State<AppState>) -> Json<RediscoverResponse> {
    let endpoint = state.orchestrator.model().rediscover().await;
    Json(RediscoverResponse { endpoint })
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.sessions.len(),
    })
}
