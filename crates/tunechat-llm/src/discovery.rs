//! One-shot resolution of the generation service's address.

use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

/// Probe `primary` and return it if it answers 200 within `timeout`,
/// otherwise return `fallback` without probing it.
///
/// Runs once at startup; the result is injected into [`crate::OllamaClient`].
/// A wrong choice sticks until [`crate::OllamaClient::rediscover`] is called.
pub async fn discover_endpoint(
    client: &Client,
    primary: &str,
    fallback: &str,
    timeout: Duration,
) -> String {
    match client.get(primary).timeout(timeout).send().await {
        Ok(resp) if resp.status().is_success() => {
            info!(endpoint = %primary, "Connected to generation service");
            primary.to_string()
        }
        Ok(resp) => {
            warn!(
                endpoint = %primary,
                status = resp.status().as_u16(),
                fallback = %fallback,
                "Generation service probe failed, falling back"
            );
            fallback.to_string()
        }
        Err(e) => {
            warn!(
                endpoint = %primary,
                error = %e,
                fallback = %fallback,
                "Couldn't reach generation service, falling back"
            );
            fallback.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_primary_reachable_is_chosen() {
        let primary = spawn(Router::new().route("/", get(|| async { "Ollama is running" }))).await;
        let chosen = discover_endpoint(
            &Client::new(),
            &primary,
            "http://fallback.invalid:11434",
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(chosen, primary);
    }

    #[tokio::test]
    async fn test_non_200_falls_back() {
        let primary = spawn(Router::new().route(
            "/",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        ))
        .await;
        let chosen = discover_endpoint(
            &Client::new(),
            &primary,
            "http://ollama:11434",
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(chosen, "http://ollama:11434");
    }

    #[tokio::test]
    async fn test_unreachable_falls_back() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let chosen = discover_endpoint(
            &Client::new(),
            &format!("http://{}", addr),
            "http://ollama:11434",
            Duration::from_millis(500),
        )
        .await;
        assert_eq!(chosen, "http://ollama:11434");
    }
}
