//! Gateway client configuration.

use std::time::Duration;

use crate::{GatewayError, Result};

/// Configuration for [`crate::RestGatewayClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Gateway address, `host:port` or a full URL
    pub gateway_address: String,

    /// Timeout for single requests (activation adds its long-poll time)
    pub request_timeout: Duration,

    /// OAuth client credentials; `None` sends no auth header
    pub oauth: Option<OAuthConfig>,
}

impl ClientConfig {
    /// Configuration for a plaintext gateway without auth.
    pub fn new(gateway_address: impl Into<String>) -> Self {
        Self {
            gateway_address: gateway_address.into(),
            request_timeout: Duration::from_secs(30),
            oauth: None,
        }
    }

    /// Builder: set OAuth credentials.
    pub fn with_oauth(mut self, oauth: OAuthConfig) -> Self {
        self.oauth = Some(oauth);
        self
    }

    /// Builder: set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Base URL of the gateway REST API.
    ///
    /// `host:port` becomes `http://host:port`; an explicit scheme is kept.
    pub fn base_url(&self) -> Result<String> {
        normalize_address(&self.gateway_address)
    }
}

/// OAuth client-credentials settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    /// Client id
    pub client_id: String,

    /// Client secret
    pub client_secret: String,

    /// Token endpoint
    pub authorization_server_url: String,

    /// Token audience
    pub audience: Option<String>,
}

pub(crate) fn normalize_address(address: &str) -> Result<String> {
    let address = address.trim().trim_end_matches('/');
    if address.is_empty() {
        return Err(GatewayError::Config("gateway address is empty".to_string()));
    }

    if address.starts_with("http://") || address.starts_with("https://") {
        Ok(address.to_string())
    } else if address.contains("://") {
        Err(GatewayError::Config(format!(
            "unsupported scheme in gateway address '{}'",
            address
        )))
    } else {
        Ok(format!("http://{}", address))
    }
}
