use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use super::{ObjectStore, TransferError};

/// Object store backed by a directory tree: `{root}/{bucket}/{key}`.
///
/// Used for development and tests.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, bucket: &str, key: &str) -> Result<PathBuf, TransferError> {
        let mut path = self.root.clone();
        for part in [bucket, key] {
            let relative = Path::new(part);
            let confined = relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
            if part.is_empty() || !confined {
                return Err(TransferError::InvalidKey(format!("{bucket}/{key}")));
            }
            path.push(relative);
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, TransferError> {
        let source = self.resolve(bucket, key)?;
        match tokio::fs::copy(&source, dest).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(TransferError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(TransferError::Forbidden {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
