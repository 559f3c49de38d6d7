//! Persistence seams: the face-record store and the object-metadata source.

use crate::types::FaceRecord;
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("face record {0} already exists")]
    AlreadyExists(String),
    #[error("field {field} is not a finite number")]
    NonFiniteNumber { field: &'static str },
    #[error("stored record {face_id} is corrupt: {reason}")]
    Corrupt { face_id: String, reason: String },
    #[error("store backend: {0}")]
    Backend(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("object storage backend: {0}")]
    Backend(String),
}

/// Key-value store of [`FaceRecord`]s keyed by face id.
///
/// Point reads after a point write from the same process are assumed to be
/// strongly consistent.
#[async_trait]
pub trait FaceStore: Send + Sync {
    /// Persist a new record. Records are never overwritten.
    async fn put(&self, record: &FaceRecord) -> Result<(), StoreError>;

    async fn get(&self, face_id: &str) -> Result<Option<FaceRecord>, StoreError>;
}

/// Source of the user metadata attached to stored objects.
#[async_trait]
pub trait ObjectMetadataSource: Send + Sync {
    async fn object_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<BTreeMap<String, String>, StorageError>;
}
