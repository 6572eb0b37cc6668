//! Spotify Web API implementation of [`MusicCatalog`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};

use tunechat_core::config::SpotifyConfig;

use crate::error::{send_json, CatalogError};
use crate::{MusicCatalog, TopItemType};

pub struct SpotifyClient {
    api_base: String,
    client: Client,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CatalogError::Client(e.to_string()))?;
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get(
        &self,
        credential: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, CatalogError> {
        let url = format!("{}{}", self.api_base, path);
        let request = self
            .client
            .get(&url)
            .bearer_auth(credential)
            .query(query);
        send_json(request, &url).await
    }

    /// Fetch the user's top artists or tracks.
    pub async fn try_top_items(
        &self,
        credential: &str,
        item_type: TopItemType,
        limit: u32,
        time_range: &str,
    ) -> Result<Value, CatalogError> {
        let path = format!("/me/top/{}", item_type.as_str());
        self.get(
            credential,
            &path,
            &[
                ("limit", limit.to_string()),
                ("time_range", time_range.to_string()),
            ],
        )
        .await
    }

    /// Search the catalog across the given item types.
    pub async fn try_search(
        &self,
        credential: &str,
        query: &str,
        types: &[&str],
        limit: u32,
    ) -> Result<Value, CatalogError> {
        self.get(
            credential,
            "/search",
            &[
                ("q", query.to_string()),
                ("type", types.join(",")),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }
}

fn log_failure(what: &str, err: &CatalogError) {
    match err {
        CatalogError::Status { status, body } => {
            error!(status = *status, "Error getting {} from Spotify", what);
            debug!(body = %body, "Spotify error body");
        }
        other => error!(error = %other, "Error getting {} from Spotify", what),
    }
}

#[async_trait]
impl MusicCatalog for SpotifyClient {
    async fn top_items(
        &self,
        credential: &str,
        item_type: TopItemType,
        limit: u32,
        time_range: &str,
    ) -> Value {
        match self
            .try_top_items(credential, item_type, limit, time_range)
            .await
        {
            Ok(body) => body,
            Err(e) => {
                log_failure(&format!("top {}", item_type.as_str()), &e);
                json!({"items": []})
            }
        }
    }

    async fn search(&self, credential: &str, query: &str, types: &[&str], limit: u32) -> Value {
        match self.try_search(credential, query, types, limit).await {
            Ok(body) => body,
            Err(e) => {
                log_failure("search results", &e);
                json!({})
            }
        }
    }
}
