use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode,
};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::config::YandexConfig;

#[derive(Debug, Error)]
pub enum DiskError {
    #[error("API error: {status} - {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid JSON in response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("request limiter closed")]
    Unavailable,
}

/// Source of public-share directory listings.
#[async_trait]
pub trait DiskClient: Send + Sync {
    /// Returns the raw listing payload for `path` inside the share.
    async fn fetch_listing(&self, public_key: &str, path: &str) -> Result<Value, DiskError>;
}

pub struct YandexDisk {
    client: Client,
    base_url: String,
    oauth_token: Option<String>,
    limiter: Arc<Semaphore>,
    debug_dump_path: Option<PathBuf>,
}

impl YandexDisk {
    pub fn new(cfg: &YandexConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
            oauth_token: cfg.oauth_token.clone(),
            limiter: Arc::new(Semaphore::new(cfg.max_concurrent_requests.max(1))),
            debug_dump_path: cfg.debug_dump_path.as_ref().map(PathBuf::from),
        })
    }

    pub fn available_permits(&self) -> usize {
        self.limiter.available_permits()
    }

    async fn dump(&self, body: &str) {
        let Some(path) = &self.debug_dump_path else {
            return;
        };
        if let Err(e) = tokio::fs::write(path, body).await {
            warn!(error = %e, path = %path.display(), "failed to write listing dump");
        }
    }
}

#[async_trait]
impl DiskClient for YandexDisk {
    #[instrument(skip(self))]
    async fn fetch_listing(&self, public_key: &str, path: &str) -> Result<Value, DiskError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| DiskError::Unavailable)?;

        let mut request = self
            .client
            .get(&self.base_url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .query(&[("public_key", public_key), ("path", path)]);
        if let Some(token) = &self.oauth_token {
            request = request.header(AUTHORIZATION, format!("OAuth {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "listing request rejected upstream");
            return Err(DiskError::Status {
                status: status.as_u16(),
                body,
            });
        }

        self.dump(&body).await;
        let listing: Value = serde_json::from_str(&body)?;
        debug!(
            bytes = body.len(),
            permits_left = self.available_permits(),
            "listing fetched"
        );
        Ok(listing)
    }
}
