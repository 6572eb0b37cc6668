//! Error types for the generation-service client.

use tunechat_core::TunechatError;

/// Errors from talking to the generation service.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("cannot connect to generation service at {endpoint}: {message}")]
    Connection { endpoint: String, message: String },
    #[error("generation service returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("generation request timed out")]
    Timeout,
    #[error("invalid response from generation service: {0}")]
    InvalidResponse(String),
    #[error("stream error: {0}")]
    Stream(String),
}

impl LlmError {
    /// Classify a transport error from reqwest.
    pub(crate) fn from_reqwest(endpoint: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_decode() {
            LlmError::InvalidResponse(err.to_string())
        } else {
            LlmError::Connection {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl From<LlmError> for TunechatError {
    fn from(err: LlmError) -> Self {
        TunechatError::Llm(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::Connection {
            endpoint: "http://localhost:11434".to_string(),
            message: "refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "cannot connect to generation service at http://localhost:11434: refused"
        );

        let err = LlmError::Api {
            status: 404,
            body: "model not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "generation service returned 404: model not found"
        );

        assert_eq!(LlmError::Timeout.to_string(), "generation request timed out");
    }

    #[test]
    fn test_llm_error_into_tunechat_error() {
        let err: TunechatError = LlmError::Stream("eof".to_string()).into();
        assert!(matches!(err, TunechatError::Llm(_)));
        assert!(err.to_string().contains("eof"));
    }
}
