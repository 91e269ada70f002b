use async_trait::async_trait;
use futures_util::StreamExt;
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode, Url};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{ObjectStore, TransferError};

/// Process-wide HTTP client, built on first use and shared by every invocation
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!("gridcheck/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
});

pub fn shared_client() -> Client {
    HTTP_CLIENT.clone()
}

/// S3-compatible object store addressed path-style: `{endpoint}/{bucket}/{key}`
pub struct HttpObjectStore {
    client: Client,
    endpoint: Url,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str) -> Result<Self, TransferError> {
        Self::with_client(shared_client(), endpoint)
    }

    pub fn with_client(client: Client, endpoint: &str) -> Result<Self, TransferError> {
        let invalid = |reason: String| TransferError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };
        let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(invalid("not a base URL".to_string()));
        }
        Ok(Self {
            client,
            endpoint: url,
        })
    }

    /// Path-style URL for `bucket/key`.
    ///
    /// Keys with `.` or `..` segments are refused: URL path normalization would drop them and
    /// address a different object than the one named in the event.
    fn object_url(&self, bucket: &str, key: &str) -> Result<Url, TransferError> {
        if key.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(TransferError::InvalidKey(format!("{bucket}/{key}")));
        }
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| TransferError::InvalidEndpoint {
                endpoint: self.endpoint.to_string(),
                reason: "not a base URL".to_string(),
            })?
            .pop_if_empty()
            .push(bucket)
            .extend(key.split('/'));
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, TransferError> {
        let url = self.object_url(bucket, key)?;
        debug!(%url, "fetching object");

        let response = self.client.get(url).send().await?;
        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(TransferError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
                return Err(TransferError::Forbidden {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            s => {
                return Err(TransferError::Status {
                    status: s.as_u16(),
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
