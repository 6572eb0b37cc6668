use thiserror::Error;

/// Top-level error type for Tunechat.
///
/// Subsystem crates define their own error enums and convert into this one
/// at the binary boundary, so `?` works from `main` down.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TunechatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for TunechatError {
    fn from(err: toml::de::Error) -> Self {
        TunechatError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TunechatError {
    fn from(err: toml::ser::Error) -> Self {
        TunechatError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TunechatError {
    fn from(err: serde_json::Error) -> Self {
        TunechatError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Tunechat operations.
pub type Result<T> = std::result::Result<T, TunechatError>;
