use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading a storage notification
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Malformed notification payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Notification contains no records")]
    Empty,
    #[error("Notification record is missing the {0}")]
    MissingField(&'static str),
}

/// One uploaded grid model to check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestEvent {
    pub source_bucket: String,
    pub object_key: String,
}

impl IngestEvent {
    pub fn new(source_bucket: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self {
            source_bucket: source_bucket.into(),
            object_key: object_key.into(),
        }
    }

    /// Build the event from an object-created notification.
    ///
    /// Only the first record of a batch is read.
    pub fn from_notification(notification: StorageNotification) -> Result<Self, EventError> {
        let record = notification
            .records
            .into_iter()
            .next()
            .ok_or(EventError::Empty)?;

        if record.s3.bucket.name.is_empty() {
            return Err(EventError::MissingField("bucket name"));
        }
        if record.s3.object.key.is_empty() {
            return Err(EventError::MissingField("object key"));
        }

        Ok(Self {
            source_bucket: record.s3.bucket.name,
            object_key: record.s3.object.key,
        })
    }

    pub fn from_json(payload: &[u8]) -> Result<Self, EventError> {
        let notification: StorageNotification = serde_json::from_slice(payload)?;
        Self::from_notification(notification)
    }
}

/// S3-style object-created notification
#[derive(Debug, Clone, Deserialize)]
pub struct StorageNotification {
    #[serde(rename = "Records", default)]
    pub records: Vec<NotificationRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectRef {
    pub key: String,
}
