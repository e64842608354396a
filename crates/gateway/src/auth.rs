//! OAuth client-credentials token provider.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{GatewayError, OAuthConfig, Result};

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Fetches and caches bearer tokens for the gateway.
pub struct OAuthTokenProvider {
    client: Client,
    config: OAuthConfig,
    cached: Mutex<Option<CachedToken>>,
}

impl OAuthTokenProvider {
    /// Create a provider sharing `client` for token requests.
    pub fn new(client: Client, config: OAuthConfig) -> Self {
        Self {
            client,
            config,
            cached: Mutex::new(None),
        }
    }

    /// A valid access token, requesting a new one if needed.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.request_token().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    /// Drop the cached token, e.g. after the gateway rejected it.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn request_token(&self) -> Result<CachedToken> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            #[serde(default)]
            expires_in: Option<u64>,
        }

        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        if let Some(audience) = &self.config.audience {
            form.push(("audience", audience.as_str()));
        }

        debug!(
            "Requesting access token from {}",
            self.config.authorization_server_url
        );

        let response = self
            .client
            .post(&self.config.authorization_server_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Auth(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Auth(format!("invalid token response: {}", e)))?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(300));
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn provider(url: String) -> OAuthTokenProvider {
        OAuthTokenProvider::new(
            Client::new(),
            OAuthConfig {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                authorization_server_url: url,
                audience: Some("zeebe-api".to_string()),
            },
        )
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/oauth/token")
                    .body_contains("grant_type=client_credentials")
                    .body_contains("audience=zeebe-api");
                then.status(200)
                    .json_body(json!({ "access_token": "tok", "expires_in": 3600 }));
            })
            .await;

        let provider = provider(server.url("/oauth/token"));
        assert_eq!(provider.token().await.unwrap(), "tok");
        assert_eq!(provider.token().await.unwrap(), "tok");
        assert_eq!(mock.hits_async().await, 1);

        provider.invalidate().await;
        provider.token().await.unwrap();
        assert_eq!(mock.hits_async().await, 2);
    }

    #[tokio::test]
    async fn test_token_endpoint_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/token");
                then.status(401).body("bad credentials");
            })
            .await;

        let err = provider(server.url("/oauth/token")).token().await.unwrap_err();
        assert!(matches!(err, GatewayError::Auth(_)));
    }
}
