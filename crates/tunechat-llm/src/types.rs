use serde::{Deserialize, Serialize};

/// A complete, cleaned chat reply.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// Reply text with thinking markup removed.
    pub content: String,
    /// The service's raw response body, with `message.content` replaced by
    /// the cleaned text.
    pub raw: serde_json::Value,
}

/// One increment of a streamed reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Cleaned text produced by this increment.
    pub chunk: String,
    /// Cleaned text produced so far, trimmed.
    pub full: String,
}

// Ollama wire types.

#[derive(Debug, Serialize)]
pub(crate) struct OllamaChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<OllamaMessage<'a>>,
    pub stream: bool,
    pub options: OllamaOptions,
}

#[derive(Debug, Serialize)]
pub(crate) struct OllamaMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct OllamaOptions {
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OllamaTagsResponse {
    #[serde(default)]
    pub models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OllamaModel {
    #[serde(default)]
    pub name: String,
}

/// A single NDJSON line of a streamed chat response.
#[derive(Debug, Deserialize)]
pub(crate) struct OllamaStreamLine {
    #[serde(default)]
    pub message: Option<OllamaStreamMessage>,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OllamaStreamMessage {
    #[serde(default)]
    pub content: String,
}
