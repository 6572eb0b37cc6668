//! Conversation handling for Tunechat.
//!
//! Keeps per-session histories, asks the language model whether the user
//! wants music, and turns that answer into catalog searches.

pub mod classifier;
pub mod error;
pub mod orchestrator;
pub mod query;
pub mod store;
pub mod types;

pub use classifier::{extract_json, parse_intent, IntentClassifier};
pub use error::ChatError;
pub use orchestrator::{ReplyStream, SessionOrchestrator};
pub use store::ConversationStore;
pub use types::{ChatReply, ClassifyOutcome, IntentResult, MusicRecommendations};
