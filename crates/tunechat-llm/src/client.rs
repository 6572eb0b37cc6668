//! Ollama implementation of [`ChatModel`].

use std::pin::Pin;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use tracing::{debug, error, info};

use tunechat_core::config::LlmConfig;
use tunechat_core::Message;

use crate::clean::{clean_response, StreamCleaner};
use crate::discovery::discover_endpoint;
use crate::error::LlmError;
use crate::types::{
    ChatChunk, ChatOutcome, OllamaChatRequest, OllamaMessage, OllamaOptions, OllamaStreamLine,
    OllamaTagsResponse,
};
use crate::{ChatModel, ChunkStream};

/// Client for an Ollama server.
///
/// The endpoint is resolved before construction (see [`discover_endpoint`])
/// and only changes when [`ChatModel::rediscover`] is called.
pub struct OllamaClient {
    config: LlmConfig,
    endpoint: RwLock<String>,
    client: Client,
}

impl OllamaClient {
    /// Create a client bound to an already-resolved endpoint.
    pub fn new(config: LlmConfig, endpoint: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder()
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;
        Ok(Self {
            config,
            endpoint: RwLock::new(endpoint.into()),
            client,
        })
    }

    /// Probe the configured addresses and build a client for the winner.
    pub async fn discover(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Self::new(config, String::new())?;
        client.rediscover().await;
        Ok(client)
    }

    fn api_url(&self, path: &str) -> String {
        let endpoint = self.endpoint();
        format!("{}{}", endpoint.trim_end_matches('/'), path)
    }

    fn build_request<'a>(
        &'a self,
        message: &'a str,
        history: &'a [Message],
        stream: bool,
    ) -> OllamaChatRequest<'a> {
        let mut messages: Vec<OllamaMessage<'a>> = history
            .iter()
            .map(|m| OllamaMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect();
        messages.push(OllamaMessage {
            role: "user",
            content: message,
        });

        OllamaChatRequest {
            model: &self.config.model,
            messages,
            stream,
            options: OllamaOptions {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
            },
        }
    }

    async fn post_chat(
        &self,
        message: &str,
        history: &[Message],
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let endpoint = self.endpoint();
        let url = self.api_url("/api/chat");
        let request = self.build_request(message, history, stream);

        let mut builder = self.client.post(&url).json(&request);
        if !stream {
            builder = builder.timeout(Duration::from_secs(self.config.chat_timeout_secs));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&endpoint, e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        match self.endpoint.read() {
            Ok(e) => e.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn rediscover(&self) -> String {
        let chosen = discover_endpoint(
            &self.client,
            &self.config.primary_endpoint,
            &self.config.fallback_endpoint,
            Duration::from_millis(self.config.probe_timeout_ms),
        )
        .await;
        match self.endpoint.write() {
            Ok(mut e) => *e = chosen.clone(),
            Err(poisoned) => *poisoned.into_inner() = chosen.clone(),
        }
        info!(endpoint = %chosen, "Generation service endpoint resolved");
        chosen
    }

    async fn is_ready(&self) -> bool {
        let url = self.api_url("/api/tags");
        let response = match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(self.config.ready_timeout_secs))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "Error checking if model is ready");
                return false;
            }
        };

        if !response.status().is_success() {
            debug!(status = response.status().as_u16(), "Model list request failed");
            return false;
        }

        match response.json::<OllamaTagsResponse>().await {
            Ok(tags) => tags
                .models
                .iter()
                .any(|m| m.name.contains(self.config.model.as_str())),
            Err(e) => {
                error!(error = %e, "Error reading model list");
                false
            }
        }
    }

    async fn chat(&self, message: &str, history: &[Message]) -> Result<ChatOutcome, LlmError> {
        let endpoint = self.endpoint();
        let response = self.post_chat(message, history, false).await?;
        let mut raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::from_reqwest(&endpoint, e))?;

        let content = raw
            .pointer("/message/content")
            .and_then(|c| c.as_str())
            .map(clean_response)
            .ok_or_else(|| {
                LlmError::InvalidResponse("response has no message content".to_string())
            })?;

        if let Some(slot) = raw.pointer_mut("/message/content") {
            *slot = serde_json::Value::String(content.clone());
        }

        Ok(ChatOutcome { content, raw })
    }

    async fn chat_stream(
        &self,
        message: &str,
        history: &[Message],
    ) -> Result<ChunkStream, LlmError> {
        let response = self.post_chat(message, history, true).await?;
        Ok(Box::pin(ndjson_chunks(response.bytes_stream())))
    }
}

struct NdjsonState<S> {
    bytes: Pin<Box<S>>,
    buffer: Vec<u8>,
    cleaner: StreamCleaner,
    full: String,
    finished: bool,
}

enum LineOutcome {
    Skip,
    Chunk(ChatChunk),
    Done(Option<ChatChunk>),
    Error(LlmError),
}

impl<S> NdjsonState<S> {
    fn emit(&mut self, fragment: String) -> Option<ChatChunk> {
        if fragment.is_empty() {
            return None;
        }
        self.full.push_str(&fragment);
        Some(ChatChunk {
            chunk: fragment,
            full: self.full.trim().to_string(),
        })
    }

    fn process_line(&mut self, line: &[u8]) -> LineOutcome {
        let line = line.trim_ascii();
        if line.is_empty() {
            return LineOutcome::Skip;
        }
        let parsed: OllamaStreamLine = match serde_json::from_slice(line) {
            Ok(p) => p,
            Err(e) => return LineOutcome::Error(LlmError::InvalidResponse(e.to_string())),
        };

        let mut fragment = parsed
            .message
            .map(|m| self.cleaner.feed(&m.content))
            .unwrap_or_default();

        if parsed.done {
            fragment.push_str(&self.cleaner.finish());
            return LineOutcome::Done(self.emit(fragment));
        }
        match self.emit(fragment) {
            Some(chunk) => LineOutcome::Chunk(chunk),
            None => LineOutcome::Skip,
        }
    }
}

/// Turn a byte stream of newline-delimited JSON into cleaned chat chunks.
///
/// Ends after the line carrying `"done": true`, or when the bytes run out.
pub fn ndjson_chunks<S, B, E>(bytes: S) -> impl Stream<Item = Result<ChatChunk, LlmError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    let state = NdjsonState {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        cleaner: StreamCleaner::new(),
        full: String::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if st.finished {
                return None;
            }

            if let Some(pos) = st.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = st.buffer.drain(..=pos).collect();
                match st.process_line(&line) {
                    LineOutcome::Skip => continue,
                    LineOutcome::Chunk(chunk) => return Some((Ok(chunk), st)),
                    LineOutcome::Done(last) => {
                        st.finished = true;
                        return last.map(|chunk| (Ok(chunk), st));
                    }
                    LineOutcome::Error(e) => {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                }
            }

            match st.bytes.next().await {
                Some(Ok(bytes)) => st.buffer.extend_from_slice(bytes.as_ref()),
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(LlmError::Stream(e.to_string())), st));
                }
                None => {
                    st.finished = true;
                    let line = std::mem::take(&mut st.buffer);
                    let last = match st.process_line(&line) {
                        LineOutcome::Done(chunk) => chunk,
                        LineOutcome::Error(e) => return Some((Err(e), st)),
                        LineOutcome::Chunk(mut chunk) => {
                            let tail = st.cleaner.finish();
                            if !tail.is_empty() {
                                st.full.push_str(&tail);
                                chunk.chunk.push_str(&tail);
                                chunk.full = st.full.trim().to_string();
                            }
                            Some(chunk)
                        }
                        LineOutcome::Skip => {
                            let tail = st.cleaner.finish();
                            st.emit(tail)
                        }
                    };
                    return last.map(|chunk| (Ok(chunk), st));
                }
            }
        }
    })
}
