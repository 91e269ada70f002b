//! Object storage access for uploaded grid models.

pub mod http;
pub mod local;

pub use http::HttpObjectStore;
pub use local::LocalObjectStore;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Failure to bring an artifact from object storage onto local disk
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("Access denied for {bucket}/{key}")]
    Forbidden { bucket: String, key: String },
    #[error("Storage returned HTTP {status} for {bucket}/{key}")]
    Status {
        status: u16,
        bucket: String,
        key: String,
    },
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    #[error("Invalid storage endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("Storage request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Scratch I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copy `bucket/key` into `dest`, returning the number of bytes written.
    async fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, TransferError>;

    fn name(&self) -> &'static str;
}
