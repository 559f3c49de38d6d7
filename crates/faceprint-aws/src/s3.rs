//! Object metadata from S3 HeadObject.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use faceprint_core::{ObjectMetadataSource, StorageError};
use std::collections::{BTreeMap, HashMap};

const USER_METADATA_PREFIX: &str = "x-amz-meta-";

pub struct S3MetadataSource {
    client: aws_sdk_s3::Client,
}

impl S3MetadataSource {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectMetadataSource for S3MetadataSource {
    async fn object_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<BTreeMap<String, String>, StorageError> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::Backend(format!("HeadObject: {}", DisplayErrorContext(&err)))
                }
            })?;

        let metadata = user_metadata(output.metadata());
        tracing::debug!(bucket, key, entries = metadata.len(), "read object metadata");
        Ok(metadata)
    }
}

/// Normalize user metadata keys: lowercase, without the `x-amz-meta-` prefix.
fn user_metadata(raw: Option<&HashMap<String, String>>) -> BTreeMap<String, String> {
    raw.into_iter()
        .flatten()
        .map(|(k, v)| {
            let k = k.to_ascii_lowercase();
            let k = k.strip_prefix(USER_METADATA_PREFIX).map(str::to_string).unwrap_or(k);
            (k, v.clone())
        })
        .collect()
}
