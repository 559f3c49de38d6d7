//! faceprint-aws — AWS backends for the faceprint pipelines.
//!
//! Rekognition is the recognition engine, DynamoDB holds face records and
//! S3 HeadObject supplies object metadata.

pub mod dynamodb;
pub mod rekognition;
pub mod s3;

pub use dynamodb::DynamoFaceStore;
pub use rekognition::Rekognition;
pub use s3::S3MetadataSource;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::sync::Arc;

/// Load shared SDK configuration from the default provider chain,
/// overriding the region when one is given.
pub async fn sdk_config(region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    loader.load().await
}

/// The three AWS-backed collaborators, ready to hand to the pipelines.
pub struct AwsBackends {
    pub engine: Arc<Rekognition>,
    pub store: Arc<DynamoFaceStore>,
    pub objects: Arc<S3MetadataSource>,
}

impl AwsBackends {
    pub fn new(config: &SdkConfig, table: &str) -> Self {
        tracing::debug!(
            region = ?config.region(),
            table,
            "building AWS clients"
        );
        Self {
            engine: Arc::new(Rekognition::new(aws_sdk_rekognition::Client::new(config))),
            store: Arc::new(DynamoFaceStore::new(aws_sdk_dynamodb::Client::new(config), table)),
            objects: Arc::new(S3MetadataSource::new(aws_sdk_s3::Client::new(config))),
        }
    }
}
