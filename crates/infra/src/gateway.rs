//! Download of seller tables from a URL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{instrument, warn};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Invalid URL, connection failure or deadline elapsed.
    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected status code {0}")]
    Status(u16),

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Fetches the raw bytes of a seller's table.
#[async_trait]
pub trait TableDownloader: Send + Sync {
    async fn download(&self, url: &str) -> Result<Vec<u8>, GatewayError>;
}

#[async_trait]
impl<D> TableDownloader for Arc<D>
where
    D: TableDownloader + ?Sized,
{
    async fn download(&self, url: &str) -> Result<Vec<u8>, GatewayError> {
        (**self).download(url).await
    }
}

/// `GET`s the table over HTTP(S) and reads the whole body into memory.
#[derive(Debug, Clone)]
pub struct HttpTableDownloader {
    client: reqwest::Client,
}

impl HttpTableDownloader {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TableDownloader for HttpTableDownloader {
    #[instrument(skip(self), err)]
    async fn download(&self, url: &str) -> Result<Vec<u8>, GatewayError> {
        let resp = self.client.get(url).send().await.map_err(|e| {
            warn!(error = %e, "table download failed");
            GatewayError::Request(e.to_string())
        })?;

        if resp.status() != reqwest::StatusCode::OK {
            return Err(GatewayError::Status(resp.status().as_u16()));
        }

        let body = resp.bytes().await.map_err(|e| GatewayError::Body(e.to_string()))?;
        Ok(body.to_vec())
    }
}
