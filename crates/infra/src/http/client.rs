//! Origin HTTP client
//!
//! One call sends exactly one request. Every fetch is admitted by the shared
//! rate limiter before it reaches this client, so a failed request is never
//! repeated here; the next resolve or refresh sweep tries again.

use std::time::Duration;

use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Client as ReqwestClient, Response};
use tfmkt_domain::constants::{DEFAULT_ORIGIN_TIMEOUT_SECS, DEFAULT_ORIGIN_USER_AGENT};
use tfmkt_domain::TfmktError;
use tracing::debug;
use url::Url;

use crate::errors::InfraError;

/// JSON client for the scraper origin
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Client with the default timeout and user agent.
    ///
    /// # Errors
    /// Fails when the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, TfmktError> {
        Self::builder().build()
    }

    /// `GET url` asking for JSON.
    ///
    /// Any status is returned as a response; only transport failures
    /// (timeout, refused connection) are errors.
    pub async fn get_json(&self, url: Url) -> Result<Response, TfmktError> {
        debug!(%url, "Requesting origin");

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await
            .map_err(|err| {
                debug!(%url, error = %err, "Origin request failed");
                TfmktError::from(InfraError::from(err))
            })?;

        debug!(%url, status = %response.status(), "Origin responded");
        Ok(response)
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: String,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_ORIGIN_TIMEOUT_SECS),
            user_agent: DEFAULT_ORIGIN_USER_AGENT.to_string(),
        }
    }
}

impl HttpClientBuilder {
    /// Whole-request timeout, connect through body.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn build(self) -> Result<HttpClient, TfmktError> {
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .no_proxy()
            .build()
            .map_err(|err| TfmktError::from(InfraError::from(err)))?;

        Ok(HttpClient { client })
    }
}
