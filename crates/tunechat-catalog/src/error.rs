use tunechat_core::TunechatError;

/// Errors from the Spotify Web API and accounts service.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("Spotify returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response from Spotify: {0}")]
    InvalidResponse(String),
    #[error("invalid URL: {0}")]
    Url(String),
}

impl From<CatalogError> for TunechatError {
    fn from(err: CatalogError) -> Self {
        TunechatError::Catalog(err.to_string())
    }
}

/// Send a request and decode a JSON body, mapping non-2xx to `Status`.
pub(crate) async fn send_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
    url: &str,
) -> Result<T, CatalogError> {
    let response = request.send().await.map_err(|e| CatalogError::Transport {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CatalogError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| CatalogError::InvalidResponse(e.to_string()))
}
