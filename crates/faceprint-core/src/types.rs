use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Face geometry as ratios of the overall image size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoundingBox {
    pub width: f32,
    pub height: f32,
    pub left: f32,
    pub top: f32,
}

/// Head orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Pose {
    pub roll: f32,
    pub yaw: f32,
    pub pitch: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageQuality {
    pub brightness: f32,
    pub sharpness: f32,
}

/// Detection attributes reported alongside an enrolled face.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaceDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pose: Option<Pose>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<ImageQuality>,
}

/// A face as the recognition engine describes it, both for enrollment
/// results and for search matches.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Face {
    pub face_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_faces_model_version: Option<String>,
}

/// One face enrolled into the collection by an `enroll` call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnrolledFace {
    pub face: Face,
    pub detail: Option<FaceDetail>,
}

/// One entry of the engine's match list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaceMatch {
    pub similarity: f32,
    pub face: Face,
}

/// The engine's search payload, passed back to callers unmodified.
///
/// `face_matches` is ordered by descending similarity; that ordering is the
/// engine's postcondition and is never re-derived here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searched_face_bounding_box: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searched_face_confidence: Option<f32>,
    pub face_matches: Vec<FaceMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_model_version: Option<String>,
}

/// Location of a source image in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Persisted mapping from an engine face id to the image that produced it.
///
/// Written once at indexing time and never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceRecord {
    pub face_id: String,
    pub bucket: String,
    pub object_key: String,
    /// Identity tag supplied at enrollment (the object key).
    pub external_image_id: String,
    pub object_metadata: BTreeMap<String, String>,
    pub bounding_box: Option<BoundingBox>,
    pub confidence: Option<f32>,
    pub detection_attributes: Option<FaceDetail>,
    pub image_id: Option<String>,
    pub index_model_version: Option<String>,
    pub indexed_at: DateTime<Utc>,
}

impl FaceRecord {
    /// Build the record for one enrolled face of `object`.
    ///
    /// Falls back to the object key when the engine did not echo the
    /// external image id.
    pub fn from_enrollment(
        enrolled: EnrolledFace,
        object: &ObjectRef,
        metadata: &BTreeMap<String, String>,
        indexed_at: DateTime<Utc>,
    ) -> Self {
        let EnrolledFace { face, detail } = enrolled;
        Self {
            face_id: face.face_id,
            bucket: object.bucket.clone(),
            object_key: object.key.clone(),
            external_image_id: face.external_image_id.unwrap_or_else(|| object.key.clone()),
            object_metadata: metadata.clone(),
            bounding_box: face.bounding_box,
            confidence: face.confidence,
            detection_attributes: detail,
            image_id: face.image_id,
            index_model_version: face.index_faces_model_version,
            indexed_at,
        }
    }
}
