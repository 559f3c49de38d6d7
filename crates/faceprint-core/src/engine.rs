//! Recognition engine contract.
//!
//! The engine detects faces, extracts faceprints and matches them against a
//! named collection. This crate only consumes it through [`RecognitionEngine`].

use crate::types::{EnrolledFace, ObjectRef, SearchResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Engine failure kinds, keyed by the service error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Throttling,
    ProvisionedThroughputExceeded,
    ServiceQuotaExceeded,
    AccessDenied,
    ResourceNotFound,
    InvalidS3Object,
    ImageTooLarge,
    InvalidImageFormat,
    /// Usually means the image has no detectable face.
    InvalidParameter,
    InternalServerError,
    /// Any code this crate does not know about.
    Unrecognized(String),
}

impl ErrorKind {
    /// Classify a service error code such as `"ThrottlingException"`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "ThrottlingException" => Self::Throttling,
            "ProvisionedThroughputExceededException" => Self::ProvisionedThroughputExceeded,
            "ServiceQuotaExceededException" => Self::ServiceQuotaExceeded,
            "AccessDeniedException" => Self::AccessDenied,
            "ResourceNotFoundException" => Self::ResourceNotFound,
            "InvalidS3ObjectException" => Self::InvalidS3Object,
            "ImageTooLargeException" => Self::ImageTooLarge,
            "InvalidImageFormatException" => Self::InvalidImageFormat,
            "InvalidParameterException" => Self::InvalidParameter,
            "InternalServerError" => Self::InternalServerError,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Throttling => "ThrottlingException",
            Self::ProvisionedThroughputExceeded => "ProvisionedThroughputExceededException",
            Self::ServiceQuotaExceeded => "ServiceQuotaExceededException",
            Self::AccessDenied => "AccessDeniedException",
            Self::ResourceNotFound => "ResourceNotFoundException",
            Self::InvalidS3Object => "InvalidS3ObjectException",
            Self::ImageTooLarge => "ImageTooLargeException",
            Self::InvalidImageFormat => "InvalidImageFormatException",
            Self::InvalidParameter => "InvalidParameterException",
            Self::InternalServerError => "InternalServerError",
            Self::Unrecognized(code) => code,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("recognition engine error {kind}: {message}")]
pub struct EngineError {
    pub kind: ErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether this failure is the engine's way of saying "no face found".
    pub fn is_no_face_detected(&self) -> bool {
        self.kind == ErrorKind::InvalidParameter
    }
}

/// Filter applied by the engine to low quality detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityFilter {
    None,
    #[default]
    Auto,
    Low,
    Medium,
    High,
}

impl QualityFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Auto => "AUTO",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl FromStr for QualityFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(Self::None),
            "AUTO" => Ok(Self::Auto),
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(format!("unknown quality filter: {s}")),
        }
    }
}

/// Facial attribute set the engine reports for each enrolled face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DetectionAttributes {
    #[default]
    Default,
    All,
}

impl DetectionAttributes {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::All => "ALL",
        }
    }
}

impl FromStr for DetectionAttributes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEFAULT" => Ok(Self::Default),
            "ALL" => Ok(Self::All),
            _ => Err(format!("unknown detection attribute set: {s}")),
        }
    }
}

/// Fixed engine parameters, read from configuration and never from requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionParams {
    pub collection_id: String,
    /// Upper bound on faces enrolled per image and on matches per search.
    pub max_faces: u32,
    /// Minimum similarity (percent) for a search match.
    pub similarity_threshold: f32,
    pub detection_attributes: DetectionAttributes,
    pub quality_filter: QualityFilter,
}

/// Result of enrolling one stored image.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrollOutcome {
    Enrolled(Vec<EnrolledFace>),
    NoFaceDetected,
}

/// Result of searching the collection with a query image.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Matches(SearchResponse),
    NoFaceDetected,
}

#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Detect faces in a stored object and enroll them into the collection,
    /// tagging each with `external_image_id`.
    async fn enroll(
        &self,
        params: &RecognitionParams,
        object: &ObjectRef,
        external_image_id: &str,
    ) -> Result<EnrollOutcome, EngineError>;

    /// Find the faces in the collection that best match the largest face in `image`.
    async fn search(
        &self,
        params: &RecognitionParams,
        image: &[u8],
    ) -> Result<SearchOutcome, EngineError>;
}
