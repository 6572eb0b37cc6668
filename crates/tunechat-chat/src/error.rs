//! Error types for the chat layer.

use tunechat_catalog::CatalogError;
use tunechat_core::TunechatError;
use tunechat_llm::LlmError;

/// Errors from handling a chat turn.
///
/// None of these reach the HTTP client as an error status: the orchestrator
/// turns every one into reply text via [`ChatError::reply_text`].
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("no session credential")]
    SessionExpired,
    #[error("model {model} is not available")]
    ModelUnavailable { model: String },
    #[error("malformed intent JSON: {0}")]
    MalformedIntentJson(String),
    #[error("catalog request failed: {0}")]
    CatalogRequestFailed(String),
    #[error("{0}")]
    Llm(#[from] LlmError),
    #[error("conversation store error: {0}")]
    Store(String),
}

impl ChatError {
    /// The text shown to the user in place of a reply.
    pub fn reply_text(&self) -> String {
        match self {
            ChatError::SessionExpired => {
                "Your Spotify session has expired. Please log in again.".to_string()
            }
            ChatError::ModelUnavailable { model } => {
                format!("The AI model is not loaded yet. Please run: `ollama pull {}`", model)
            }
            other => format!("An error occurred: {}", other),
        }
    }
}

impl From<CatalogError> for ChatError {
    fn from(err: CatalogError) -> Self {
        ChatError::CatalogRequestFailed(err.to_string())
    }
}

impl From<ChatError> for TunechatError {
    fn from(err: ChatError) -> Self {
        TunechatError::Chat(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_text_session_expired() {
        assert_eq!(
            ChatError::SessionExpired.reply_text(),
            "Your Spotify session has expired. Please log in again."
        );
    }

    #[test]
    fn test_reply_text_model_unavailable_names_model() {
        let err = ChatError::ModelUnavailable {
            model: "deepseek-r1:1.5b".to_string(),
        };
        assert_eq!(
            err.reply_text(),
            "The AI model is not loaded yet. Please run: `ollama pull deepseek-r1:1.5b`"
        );
    }

    #[test]
    fn test_reply_text_generic_errors() {
        let err = ChatError::Llm(LlmError::Timeout);
        assert_eq!(err.reply_text(), "An error occurred: generation request timed out");

        let err = ChatError::Store("lock poisoned".to_string());
        assert_eq!(
            err.reply_text(),
            "An error occurred: conversation store error: lock poisoned"
        );
    }

    #[test]
    fn test_from_catalog_error() {
        let err: ChatError = CatalogError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        }
        .into();
        assert!(matches!(err, ChatError::CatalogRequestFailed(_)));
        assert!(err.to_string().contains("502"));
    }
}
