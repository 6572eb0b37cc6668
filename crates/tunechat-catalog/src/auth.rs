//! Spotify authorization-code flow with PKCE.
//!
//! The verifier is generated per login and kept in the caller's session, so
//! concurrent logins never share one. [`SpotifyAuth`] itself is stateless.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::distr::{Alphanumeric, SampleString};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info};

use tunechat_core::config::SpotifyConfig;

use crate::error::{send_json, CatalogError};
use crate::AccountService;

const VERIFIER_LEN: usize = 64;

/// Generate a 64-character alphanumeric PKCE code verifier.
pub fn generate_code_verifier() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), VERIFIER_LEN)
}

/// S256 code challenge: unpadded URL-safe base64 of SHA-256(verifier).
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Body of a successful token-endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    /// Lifetime of `access_token` in seconds.
    #[serde(default)]
    pub expires_in: u64,
    /// Absent on refresh responses that keep the old refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Client for the Spotify accounts service and profile endpoint.
pub struct SpotifyAuth {
    client_id: String,
    redirect_uri: String,
    scopes: Vec<String>,
    accounts_base: String,
    api_base: String,
    client: Client,
}

impl SpotifyAuth {
    pub fn new(config: &SpotifyConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CatalogError::Client(e.to_string()))?;
        Ok(Self {
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            accounts_base: config.accounts_base.trim_end_matches('/').to_string(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, CatalogError> {
        let url = format!("{}/api/token", self.accounts_base);
        let request = self.client.post(&url).form(form);
        send_json(request, &url).await
    }
}

#[async_trait]
impl AccountService for SpotifyAuth {
    fn authorize_url(&self, verifier: &str) -> Result<String, CatalogError> {
        let challenge = code_challenge(verifier);
        let scope = self.scopes.join(" ");
        let url = Url::parse_with_params(
            &format!("{}/authorize", self.accounts_base),
            [
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code_challenge_method", "S256"),
                ("code_challenge", challenge.as_str()),
                ("scope", scope.as_str()),
            ],
        )
        .map_err(|e| CatalogError::Url(e.to_string()))?;
        Ok(url.into())
    }

    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<TokenResponse, CatalogError> {
        let result = self
            .token_request(&[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code_verifier", verifier),
            ])
            .await;
        match &result {
            Ok(_) => info!("Exchanged authorization code for tokens"),
            Err(e) => error!(error = %e, "Error getting tokens"),
        }
        result
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, CatalogError> {
        let result = self
            .token_request(&[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await;
        if let Err(e) = &result {
            error!(error = %e, "Error refreshing token");
        }
        result
    }

    async fn user_profile(&self, access_token: &str) -> Result<UserProfile, CatalogError> {
        let url = format!("{}/me", self.api_base);
        let request = self.client.get(&url).bearer_auth(access_token);
        let result = send_json(request, &url).await;
        if let Err(e) = &result {
            error!(error = %e, "Error getting user profile");
        }
        result
    }
}
