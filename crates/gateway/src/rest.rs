//! Gateway client over the engine's REST API.

use async_trait::async_trait;
use domath_core::{CompleteJobCommand, FailJobCommand, Job};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use tracing::{debug, trace, warn};

use crate::types::{ActivateJobsBody, ActivateJobsResponse, CompleteJobBody, FailJobBody};
use crate::{
    ActivateJobsRequest, ClientConfig, GatewayClient, GatewayError, OAuthTokenProvider, Result,
    Topology,
};

/// REST gateway client.
pub struct RestGatewayClient {
    /// HTTP client
    client: Client,

    /// Base URL, without trailing slash
    base_url: String,

    /// Token source, when the gateway requires auth
    auth: Option<OAuthTokenProvider>,

    /// Configuration
    config: ClientConfig,
}

impl RestGatewayClient {
    /// Build a client. Fails on an invalid address.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = config.base_url()?;
        let client = ClientBuilder::new()
            .timeout(config.request_timeout)
            .build()?;
        let auth = config
            .oauth
            .clone()
            .map(|oauth| OAuthTokenProvider::new(client.clone(), oauth));

        debug!("Gateway client for {}", base_url);

        Ok(Self {
            client,
            base_url,
            auth,
            config,
        })
    }

    /// Base URL requests go to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2{}", self.base_url, path)
    }

    /// Send a request. A 401 drops the cached token and the request is
    /// retried once with a fresh one.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let retry = match &self.auth {
            Some(_) => request.try_clone(),
            None => None,
        };

        let response = self.authorize(request).await?.send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check(response).await;
        }

        if let Some(auth) = &self.auth {
            warn!("Gateway rejected access token, requesting a new one");
            auth.invalidate().await;

            if let Some(retry) = retry {
                let response = self.authorize(retry).await?.send().await?;
                return Self::check(response).await;
            }
        }

        Self::check(response).await
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match &self.auth {
            Some(auth) => request.bearer_auth(auth.token().await?),
            None => request,
        })
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl GatewayClient for RestGatewayClient {
    async fn topology(&self) -> Result<Topology> {
        let response = self.send(self.client.get(self.url("/topology"))).await?;
        response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn activate_jobs(&self, request: &ActivateJobsRequest) -> Result<Vec<Job>> {
        let body = ActivateJobsBody::from(request);
        trace!(
            "Activating up to {} jobs of type {}",
            request.max_jobs_to_activate,
            request.job_type
        );

        let http = self
            .client
            .post(self.url("/jobs/activation"))
            .timeout(self.config.request_timeout + request.request_timeout)
            .json(&body);

        let response: ActivateJobsResponse = self
            .send(http)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        Ok(response.jobs)
    }

    async fn complete_job(&self, command: &CompleteJobCommand) -> Result<()> {
        let path = format!("/jobs/{}/completion", command.job_key);
        let body = CompleteJobBody {
            variables: &command.variables,
        };
        self.send(self.client.post(self.url(&path)).json(&body)).await?;
        Ok(())
    }

    async fn fail_job(&self, command: &FailJobCommand) -> Result<()> {
        let path = format!("/jobs/{}/failure", command.job_key);
        let body = FailJobBody {
            retries: command.retries,
            error_message: command.error_message.as_deref(),
            retry_back_off: command.retry_back_off_ms,
        };
        self.send(self.client.post(self.url(&path)).json(&body)).await?;
        Ok(())
    }
}
