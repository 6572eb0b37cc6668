//! Per-message request handling: history, classification, recommendations.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use tunechat_catalog::{items, tracks_from_search, MusicCatalog, TopItemType};
use tunechat_core::config::{ConversationConfig, SpotifyConfig};
use tunechat_core::{Message, Role, SessionKey};
use tunechat_llm::{ChatChunk, ChatModel, ChunkStream};

use crate::classifier::IntentClassifier;
use crate::error::ChatError;
use crate::query;
use crate::store::ConversationStore;
use crate::types::{ChatReply, ClassifyOutcome, IntentResult, MusicRecommendations};

/// Catalog item types searched for recommendations.
const SEARCH_TYPES: [&str; 2] = ["track", "artist"];

/// Streamed reply chunks for one turn.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, ChatError>> + Send>>;

/// Wires the store, classifier, query builder and catalog for each message.
///
/// The store lock is only held for individual store operations, never across
/// an await. Two requests for the same session may interleave their messages.
pub struct SessionOrchestrator {
    store: Arc<Mutex<ConversationStore>>,
    model: Arc<dyn ChatModel>,
    catalog: Arc<dyn MusicCatalog>,
    classifier: IntentClassifier,
    spotify: SpotifyConfig,
}

impl SessionOrchestrator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        catalog: Arc<dyn MusicCatalog>,
        conversation: &ConversationConfig,
        spotify: &SpotifyConfig,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(ConversationStore::with_max_messages(
                conversation.max_messages,
            ))),
            classifier: IntentClassifier::new(Arc::clone(&model), conversation.context_turns),
            model,
            catalog,
            spotify: spotify.clone(),
        }
    }

    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, ConversationStore>, ChatError> {
        lock(&self.store)
    }

    fn append(&self, key: &SessionKey, role: Role, content: &str) -> Result<(), ChatError> {
        self.lock_store()?.append(key, role, content);
        Ok(())
    }

    /// A copy of the session's history.
    pub fn history(&self, key: &SessionKey) -> Result<Vec<Message>, ChatError> {
        Ok(self.lock_store()?.history(key).to_vec())
    }

    /// Empty the session's history.
    pub fn clear(&self, key: &SessionKey) -> Result<(), ChatError> {
        self.lock_store()?.clear(key);
        info!("Conversation history cleared");
        Ok(())
    }

    /// Carry a history over to a refreshed credential.
    pub fn rekey(&self, from: &SessionKey, to: &SessionKey) -> Result<(), ChatError> {
        self.lock_store()?.rekey(from, to);
        Ok(())
    }

    /// Handle one chat message. Never fails: every error becomes reply text.
    ///
    /// `session` is the user's catalog credential, which also keys the
    /// conversation history.
    pub async fn handle_message(&self, session: Option<&SessionKey>, message: &str) -> ChatReply {
        match self.try_handle_message(session, message).await {
            Ok(reply) => reply,
            Err(e) => {
                match &e {
                    ChatError::SessionExpired | ChatError::ModelUnavailable { .. } => {
                        info!(reason = %e, "Chat turn not handled")
                    }
                    _ => warn!(error = %e, "Chat turn failed"),
                }
                ChatReply::plain(e.reply_text())
            }
        }
    }

    async fn try_handle_message(
        &self,
        session: Option<&SessionKey>,
        message: &str,
    ) -> Result<ChatReply, ChatError> {
        let key = session.ok_or(ChatError::SessionExpired)?;

        self.append(key, Role::User, message)?;
        let history = self.history(key)?;

        if !self.model.is_ready().await {
            return Err(ChatError::ModelUnavailable {
                model: self.model.model_name().to_string(),
            });
        }

        let outcome = self.classifier.classify(&history, message).await?;
        if let ClassifyOutcome::Fallback { reason, .. } = &outcome {
            debug!(reason = %reason, "Using fallback intent");
        }
        let intent = outcome.into_intent();

        if intent.wants_recommendations {
            let recommendations = self.recommend(key.as_str(), &intent).await;
            let text = format!(
                "Based on our conversation, I've created a playlist for your {} mood. \
                 Here are some tracks I think you'll enjoy:",
                intent.mood
            );
            self.append(key, Role::Assistant, &text)?;
            return Ok(ChatReply::animated(text).with_recommendations(recommendations));
        }

        self.append(key, Role::Assistant, &intent.response)?;
        Ok(ChatReply::animated(intent.response))
    }

    async fn recommend(&self, credential: &str, intent: &IntentResult) -> MusicRecommendations {
        let limit = self.spotify.top_items_limit;
        let time_range = self.spotify.time_range.as_str();

        let top_artists = self
            .catalog
            .top_items(credential, TopItemType::Artists, limit, time_range)
            .await;
        let top_tracks = self
            .catalog
            .top_items(credential, TopItemType::Tracks, limit, time_range)
            .await;

        let base = query::build(&intent.mood, items(&top_artists), items(&top_tracks));
        let search_query = query::with_genre(&base, &intent.genres);
        info!(query = %search_query, "Searching catalog");

        let results = self
            .catalog
            .search(credential, &search_query, &SEARCH_TYPES, self.spotify.search_limit)
            .await;
        if results.get("tracks").map_or(true, Value::is_null) {
            let e = ChatError::CatalogRequestFailed("search returned no tracks section".into());
            warn!(error = %e, "Recommending with no tracks");
        }

        MusicRecommendations {
            tracks: tracks_from_search(&results),
            mood: intent.mood.clone(),
            genres: intent.genres.clone(),
        }
    }

    /// Stream a plain conversational reply, without classification.
    ///
    /// The user message is recorded immediately; the cleaned reply is recorded
    /// once the stream finishes. A stream dropped early records nothing.
    pub async fn stream_reply(
        &self,
        session: Option<&SessionKey>,
        message: &str,
    ) -> Result<ReplyStream, ChatError> {
        let key = session.ok_or(ChatError::SessionExpired)?.clone();

        let history = self.history(&key)?;
        self.append(&key, Role::User, message)?;

        if !self.model.is_ready().await {
            return Err(ChatError::ModelUnavailable {
                model: self.model.model_name().to_string(),
            });
        }

        let inner = self.model.chat_stream(message, &history).await?;
        Ok(Box::pin(record_on_completion(
            inner,
            Arc::clone(&self.store),
            key,
        )))
    }
}

fn lock(store: &Mutex<ConversationStore>) -> Result<MutexGuard<'_, ConversationStore>, ChatError> {
    store
        .lock()
        .map_err(|e| ChatError::Store(format!("store lock poisoned: {}", e)))
}

struct RecordState {
    inner: ChunkStream,
    store: Arc<Mutex<ConversationStore>>,
    key: SessionKey,
    full: String,
    done: bool,
}

/// Pass chunks through, appending the final text as the assistant message
/// when the inner stream ends cleanly.
fn record_on_completion(
    inner: ChunkStream,
    store: Arc<Mutex<ConversationStore>>,
    key: SessionKey,
) -> impl Stream<Item = Result<ChatChunk, ChatError>> + Send {
    let state = RecordState {
        inner,
        store,
        key,
        full: String::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }
        match st.inner.next().await {
            Some(Ok(chunk)) => {
                st.full.clone_from(&chunk.full);
                Some((Ok(chunk), st))
            }
            Some(Err(e)) => {
                st.done = true;
                Some((Err(ChatError::from(e)), st))
            }
            None => {
                st.done = true;
                if st.full.is_empty() {
                    return None;
                }
                let recorded = lock(&st.store)
                    .map(|mut store| store.append(&st.key, Role::Assistant, st.full.as_str()));
                match recorded {
                    Ok(()) => None,
                    Err(e) => Some((Err(e), st)),
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tunechat_llm::{ChatOutcome, LlmError};

    struct FakeModel {
        ready: bool,
        reply: String,
        chunks: Vec<&'static str>,
        fail: bool,
    }

    impl FakeModel {
        fn replying(reply: &str) -> Self {
            Self {
                ready: true,
                reply: reply.to_string(),
                chunks: Vec::new(),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl ChatModel for FakeModel {
        fn model_name(&self) -> &str {
            "deepseek-r1:1.5b"
        }

        async fn is_ready(&self) -> bool {
            self.ready
        }

        async fn chat(&self, _: &str, _: &[Message]) -> Result<ChatOutcome, LlmError> {
            if self.fail {
                return Err(LlmError::Connection {
                    endpoint: "http://ollama:11434".to_string(),
                    message: "connection refused".to_string(),
                });
            }
            Ok(ChatOutcome {
                content: self.reply.clone(),
                raw: json!({}),
            })
        }

        async fn chat_stream(&self, _: &str, _: &[Message]) -> Result<ChunkStream, LlmError> {
            let mut full = String::new();
            let chunks: Vec<Result<ChatChunk, LlmError>> = self
                .chunks
                .iter()
                .map(|c| {
                    full.push_str(c);
                    Ok(ChatChunk {
                        chunk: c.to_string(),
                        full: full.trim().to_string(),
                    })
                })
                .collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    #[derive(Default)]
    struct FakeCatalog {
        top_artists: Value,
        search_result: Value,
        calls: AtomicUsize,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MusicCatalog for FakeCatalog {
        async fn top_items(&self, _: &str, item_type: TopItemType, limit: u32, range: &str) -> Value {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(limit, 10);
            assert_eq!(range, "medium_term");
            match item_type {
                TopItemType::Artists => self.top_artists.clone(),
                TopItemType::Tracks => json!({"items": []}),
            }
        }

        async fn search(&self, credential: &str, query: &str, types: &[&str], limit: u32) -> Value {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(credential, "token-1");
            assert_eq!(types, &["track", "artist"]);
            assert_eq!(limit, 5);
            self.queries.lock().unwrap().push(query.to_string());
            self.search_result.clone()
        }
    }

    fn orchestrator(model: FakeModel, catalog: Arc<FakeCatalog>) -> SessionOrchestrator {
        SessionOrchestrator::new(
            Arc::new(model),
            catalog,
            &ConversationConfig::default(),
            &SpotifyConfig::default(),
        )
    }

    fn key() -> SessionKey {
        SessionKey::from("token-1")
    }

    #[tokio::test]
    async fn test_energetic_scenario_end_to_end() {
        let catalog = Arc::new(FakeCatalog {
            top_artists: json!({"items": [{"name": "Daft Punk"}, {"name": "Justice"}, {"name": "Air"}]}),
            search_result: json!({
                "tracks": {"items": [{
                    "name": "D.A.N.C.E.",
                    "artists": [{"name": "Justice"}],
                    "album": {"name": "Cross", "images": [{"url": "https://img/cross.jpg"}]},
                    "preview_url": "https://preview/dance.mp3",
                    "external_urls": {"spotify": "https://open.spotify.com/track/dance"}
                }]},
                "artists": {"items": []}
            }),
            ..FakeCatalog::default()
        });
        let orch = orchestrator(
            FakeModel::replying(
                r#"```json
{"wants_recommendations": true, "mood": "energetic", "genres": ["electronic"], "artists": [], "response": "On it!"}
```"#,
            ),
            catalog.clone(),
        );

        let reply = orch.handle_message(Some(&key()), "I need workout music").await;

        let expected = "Based on our conversation, I've created a playlist for your energetic mood. Here are some tracks I think you'll enjoy:";
        assert_eq!(reply.response, expected);
        assert_eq!(reply.animate, Some(true));
        let recs = reply.music_recommendations.unwrap();
        assert_eq!(recs.mood, "energetic");
        assert_eq!(recs.genres, vec!["electronic"]);
        assert_eq!(recs.tracks.len(), 1);
        let track = &recs.tracks[0];
        assert_eq!(track.name, "D.A.N.C.E.");
        assert_eq!(track.artist, "Justice");
        assert_eq!(track.album, "Cross");
        assert_eq!(track.image_url, "https://img/cross.jpg");
        assert_eq!(track.preview_url, "https://preview/dance.mp3");
        assert_eq!(track.spotify_url, "https://open.spotify.com/track/dance");

        assert_eq!(
            catalog.queries.lock().unwrap().as_slice(),
            &["energetic artist:Justice genre:electronic".to_string()]
        );
        let history = orch.history(&key()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], Message::user("I need workout music"));
        assert_eq!(history[1], Message::assistant(expected));
    }

    #[tokio::test]
    async fn test_missing_nested_track_fields_default_empty() {
        let catalog = Arc::new(FakeCatalog {
            top_artists: json!({"items": []}),
            search_result: json!({"tracks": {"items": [{"name": "Bare"}]}}),
            ..FakeCatalog::default()
        });
        let orch = orchestrator(
            FakeModel::replying(r#"{"wants_recommendations": true, "mood": "happy"}"#),
            catalog.clone(),
        );
        let reply = orch.handle_message(Some(&key()), "songs please").await;
        let track = &reply.music_recommendations.unwrap().tracks[0];
        assert_eq!(track.name, "Bare");
        assert_eq!(track.artist, "");
        assert_eq!(track.album, "");
        assert_eq!(track.image_url, "");
        assert_eq!(track.preview_url, "");
        assert_eq!(track.spotify_url, "");
        assert_eq!(catalog.queries.lock().unwrap()[0], "happy");
    }

    #[tokio::test]
    async fn test_model_not_ready_makes_no_catalog_calls() {
        let catalog = Arc::new(FakeCatalog::default());
        let mut model = FakeModel::replying("{}");
        model.ready = false;
        let orch = orchestrator(model, catalog.clone());

        let reply = orch.handle_message(Some(&key()), "play something").await;
        assert!(reply.response.contains("ollama pull deepseek-r1:1.5b"));
        assert!(reply.animate.is_none());
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 0);
        // The user message is still recorded.
        assert_eq!(orch.history(&key()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_session_is_expired_reply() {
        let catalog = Arc::new(FakeCatalog::default());
        let orch = orchestrator(FakeModel::replying("{}"), catalog);
        let reply = orch.handle_message(None, "hello").await;
        assert_eq!(
            reply.response,
            "Your Spotify session has expired. Please log in again."
        );
    }

    #[tokio::test]
    async fn test_conversational_turn_uses_classifier_response() {
        let catalog = Arc::new(FakeCatalog::default());
        let orch = orchestrator(
            FakeModel::replying(r#"{"wants_recommendations": false, "mood": "neutral", "response": "Hi there!"}"#),
            catalog.clone(),
        );
        let reply = orch.handle_message(Some(&key()), "hello").await;
        assert_eq!(reply, ChatReply::animated("Hi there!"));
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 0);
        assert_eq!(orch.history(&key()).unwrap()[1], Message::assistant("Hi there!"));
    }

    #[tokio::test]
    async fn test_unparsable_classifier_output_replies_with_fallback() {
        let catalog = Arc::new(FakeCatalog::default());
        let orch = orchestrator(FakeModel::replying("la la la"), catalog);
        let reply = orch.handle_message(Some(&key()), "???").await;
        assert_eq!(reply.response, IntentResult::FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn test_loading_model_reply_without_content_uses_fallback() {
        use axum::routing::{get, post};
        use axum::{Json, Router};
        use tunechat_core::config::LlmConfig;
        use tunechat_llm::OllamaClient;

        let router = Router::new()
            .route(
                "/api/tags",
                get(|| async { Json(json!({"models": [{"name": "deepseek-r1:1.5b"}]})) }),
            )
            .route(
                "/api/chat",
                post(|| async { Json(json!({"error": "model is loading"})) }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let model = OllamaClient::new(LlmConfig::default(), format!("http://{}", addr)).unwrap();
        let catalog = Arc::new(FakeCatalog::default());
        let orch = SessionOrchestrator::new(
            Arc::new(model),
            catalog.clone(),
            &ConversationConfig::default(),
            &SpotifyConfig::default(),
        );

        let reply = orch.handle_message(Some(&key()), "hello").await;
        assert_eq!(reply.response, IntentResult::FALLBACK_RESPONSE);
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_model_failure_becomes_error_reply() {
        let catalog = Arc::new(FakeCatalog::default());
        let mut model = FakeModel::replying("");
        model.fail = true;
        let orch = orchestrator(model, catalog);
        let reply = orch.handle_message(Some(&key()), "hello").await;
        assert!(reply.response.starts_with("An error occurred: "));
        assert!(reply.response.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_empty_search_body_yields_no_tracks() {
        let catalog = Arc::new(FakeCatalog {
            top_artists: json!({"items": []}),
            search_result: json!({}),
            ..FakeCatalog::default()
        });
        let orch = orchestrator(
            FakeModel::replying(r#"{"wants_recommendations": true, "mood": "calm"}"#),
            catalog,
        );
        let reply = orch.handle_message(Some(&key()), "music").await;
        assert!(reply.music_recommendations.unwrap().tracks.is_empty());
    }

    #[tokio::test]
    async fn test_clear_and_rekey() {
        let catalog = Arc::new(FakeCatalog::default());
        let orch = orchestrator(
            FakeModel::replying(r#"{"response": "ok"}"#),
            catalog,
        );
        orch.handle_message(Some(&key()), "hi").await;
        let refreshed = SessionKey::from("token-2");
        orch.rekey(&key(), &refreshed).unwrap();
        assert_eq!(orch.history(&refreshed).unwrap().len(), 2);
        orch.clear(&refreshed).unwrap();
        assert!(orch.history(&refreshed).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stream_reply_records_final_text() {
        let catalog = Arc::new(FakeCatalog::default());
        let mut model = FakeModel::replying("");
        model.chunks = vec!["Hello", " there", "! "];
        let orch = orchestrator(model, catalog);

        let stream = orch.stream_reply(Some(&key()), "hi").await.unwrap();
        let chunks: Vec<_> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].full, "Hello there!");

        let history = orch.history(&key()).unwrap();
        assert_eq!(history, vec![Message::user("hi"), Message::assistant("Hello there!")]);
    }

    #[tokio::test]
    async fn test_stream_reply_dropped_early_records_only_user() {
        let catalog = Arc::new(FakeCatalog::default());
        let mut model = FakeModel::replying("");
        model.chunks = vec!["a", "b"];
        let orch = orchestrator(model, catalog);

        let mut stream = orch.stream_reply(Some(&key()), "hi").await.unwrap();
        stream.next().await.unwrap().unwrap();
        drop(stream);
        assert_eq!(orch.history(&key()).unwrap(), vec![Message::user("hi")]);
    }

    #[tokio::test]
    async fn test_stream_reply_errors() {
        let catalog = Arc::new(FakeCatalog::default());
        let orch = orchestrator(FakeModel::replying(""), Arc::clone(&catalog));
        assert!(matches!(
            orch.stream_reply(None, "hi").await,
            Err(ChatError::SessionExpired)
        ));

        let mut model = FakeModel::replying("");
        model.ready = false;
        let orch = orchestrator(model, catalog);
        assert!(matches!(
            orch.stream_reply(Some(&key()), "hi").await,
            Err(ChatError::ModelUnavailable { .. })
        ));
    }
}
