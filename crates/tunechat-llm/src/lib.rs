//! Client for the local text-generation service.
//!
//! Wraps Ollama's chat and model-list endpoints behind the [`ChatModel`]
//! trait, resolves the service address once at startup, and strips the
//! model's thinking markup from everything it returns.

pub mod clean;
pub mod client;
pub mod discovery;
pub mod error;
pub mod types;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use tunechat_core::Message;

pub use clean::{clean_response, StreamCleaner};
pub use client::OllamaClient;
pub use discovery::discover_endpoint;
pub use error::LlmError;
pub use types::{ChatChunk, ChatOutcome};

/// Lazily produced chat chunks. Dropping the stream cancels generation.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, LlmError>> + Send>>;

/// A text-generation backend the chat layer can talk to.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Name of the model this client asks the service for.
    fn model_name(&self) -> &str;

    /// Address of the service currently in use.
    fn endpoint(&self) -> String {
        String::new()
    }

    /// Re-resolve the service address, returning the one now in use.
    async fn rediscover(&self) -> String {
        self.endpoint()
    }

    /// Whether the service is reachable and lists the configured model.
    /// Never fails; transport errors read as "not ready".
    async fn is_ready(&self) -> bool;

    /// Send `message` after `history` and wait for the full, cleaned reply.
    async fn chat(&self, message: &str, history: &[Message]) -> Result<ChatOutcome, LlmError>;

    /// Send `message` after `history` and receive the reply incrementally.
    async fn chat_stream(&self, message: &str, history: &[Message])
        -> Result<ChunkStream, LlmError>;
}
