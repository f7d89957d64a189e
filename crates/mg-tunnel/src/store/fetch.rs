//! Subscription payload fetching

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use mg_core::config::FetchConfig;
use mg_core::error::FetchError;

/// Retrieves a subscription payload from its source
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the raw payload; the body is opaque to the store
    async fn fetch(&self, source: &Url) -> Result<Bytes, FetchError>;
}

/// HTTP(S) fetcher backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client with the configured timeout and user agent
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source: &Url) -> Result<Bytes, FetchError> {
        tracing::debug!("GET {}", source);

        let response = self
            .client
            .get(source.clone())
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        if body.is_empty() {
            return Err(FetchError::EmptyBody);
        }

        tracing::debug!("Fetched {} bytes from {}", body.len(), source);
        Ok(body)
    }
}
