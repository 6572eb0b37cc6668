//! Spotify Web API access for Tunechat.
//!
//! [`MusicCatalog`] is the seam the chat layer depends on: top items and
//! search, both degrading to empty results instead of failing.
//! [`AccountService`] covers the OAuth (PKCE) half.

pub mod auth;
pub mod client;
pub mod error;
pub mod track;

use async_trait::async_trait;
use serde_json::Value;

pub use auth::{code_challenge, generate_code_verifier, SpotifyAuth, TokenResponse, UserProfile};
pub use client::SpotifyClient;
pub use error::CatalogError;
pub use track::{tracks_from_search, TrackSummary};

/// Which of the user's top items to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopItemType {
    Artists,
    Tracks,
}

impl TopItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopItemType::Artists => "artists",
            TopItemType::Tracks => "tracks",
        }
    }
}

/// Read access to a music catalog on behalf of a user.
///
/// Responses are the catalog's JSON bodies. Transport or status failures are
/// logged and reported as an empty structure: `{"items": []}` for top items,
/// `{}` for search.
#[async_trait]
pub trait MusicCatalog: Send + Sync {
    async fn top_items(
        &self,
        credential: &str,
        item_type: TopItemType,
        limit: u32,
        time_range: &str,
    ) -> Value;

    async fn search(&self, credential: &str, query: &str, types: &[&str], limit: u32) -> Value;
}

/// The OAuth side of the catalog: login, token exchange and profile.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// URL of the authorize page for a login using `verifier`.
    fn authorize_url(&self, verifier: &str) -> Result<String, CatalogError>;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(&self, code: &str, verifier: &str)
        -> Result<TokenResponse, CatalogError>;

    /// Obtain a new access token from a refresh token.
    async fn refresh_access_token(&self, refresh_token: &str)
        -> Result<TokenResponse, CatalogError>;

    /// The profile of the user owning `access_token`.
    async fn user_profile(&self, access_token: &str) -> Result<UserProfile, CatalogError>;
}

/// The `items` array of a top-items body, or an empty slice.
pub fn items(body: &Value) -> &[Value] {
    body.get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_top_item_type_as_str() {
        assert_eq!(TopItemType::Artists.as_str(), "artists");
        assert_eq!(TopItemType::Tracks.as_str(), "tracks");
    }

    #[test]
    fn test_items_helper() {
        let body = json!({"items": [{"name": "A"}, {"name": "B"}]});
        assert_eq!(items(&body).len(), 2);
        assert!(items(&json!({})).is_empty());
        assert!(items(&json!({"items": "nope"})).is_empty());
    }
}
