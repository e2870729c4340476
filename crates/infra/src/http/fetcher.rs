//! Origin fetcher
//!
//! Retrieves one entity as JSON from the scraper backend. Paths follow the
//! public API layout (`players/{id}/profile`, `clubs/{id}/profile`, ...)
//! relative to `origin.base_url`.

use async_trait::async_trait;
use reqwest::StatusCode;
use tfmkt_core::Fetcher;
use tfmkt_domain::{EntityId, EntityKind, OriginConfig, Payload, Result, TfmktError};
use tracing::{debug, instrument};
use url::Url;

use super::client::HttpClient;
use crate::errors::InfraError;

/// `Fetcher` backed by the HTTP origin
#[derive(Clone)]
pub struct HttpFetcher {
    client: HttpClient,
    base_url: Url,
}

impl HttpFetcher {
    /// Fetcher for the origin rooted at `base_url`.
    ///
    /// # Errors
    /// `Config` when `base_url` is not an absolute URL.
    pub fn new(client: HttpClient, base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url.trim())
            .map_err(|e| TfmktError::Config(format!("invalid origin base url {base_url:?}: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &OriginConfig) -> Result<Self> {
        let client = HttpClient::builder().timeout(config.timeout()).build()?;
        Self::new(client, &config.base_url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, kind: EntityKind, id: &EntityId) -> Result<Url> {
        self.base_url
            .join(&kind.origin_path(id))
            .map_err(|e| TfmktError::InvalidInput(format!("cannot build origin url for {id}: {e}")))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, kind: EntityKind, id: &EntityId) -> Result<Payload> {
        let url = self.url_for(kind, id)?;
        let response = self.client.get_json(url.clone()).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(TfmktError::NotFound(format!("{kind}/{id} does not exist at origin")));
        }
        if !status.is_success() {
            return Err(TfmktError::FetchFailed(format!("origin returned {status} for {url}")));
        }

        let payload: Payload =
            response.json().await.map_err(|e| TfmktError::from(InfraError::from(e)))?;
        debug!(%status, "Origin payload received");
        Ok(payload)
    }
}
