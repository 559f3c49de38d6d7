//! Recognition engine backed by Amazon Rekognition.
//!
//! `enroll` is IndexFaces against an S3 object reference and `search` is
//! SearchFacesByImage with inline bytes. `InvalidParameterException` from
//! either call becomes the `NoFaceDetected` outcome.

use async_trait::async_trait;
use aws_sdk_rekognition::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_rekognition::operation::index_faces::IndexFacesOutput;
use aws_sdk_rekognition::operation::search_faces_by_image::SearchFacesByImageOutput;
use aws_sdk_rekognition::primitives::Blob;
use aws_sdk_rekognition::types as rk;
use faceprint_core::types::{
    BoundingBox, EnrolledFace, Face, FaceDetail, FaceMatch, ImageQuality, ObjectRef, Pose,
    SearchResponse,
};
use faceprint_core::{
    EngineError, EnrollOutcome, ErrorKind, RecognitionEngine, RecognitionParams, SearchOutcome,
};

/// Rekognition client bound to the collection named in each call's params.
pub struct Rekognition {
    client: aws_sdk_rekognition::Client,
}

impl Rekognition {
    pub fn new(client: aws_sdk_rekognition::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecognitionEngine for Rekognition {
    async fn enroll(
        &self,
        params: &RecognitionParams,
        object: &ObjectRef,
        external_image_id: &str,
    ) -> Result<EnrollOutcome, EngineError> {
        let image = rk::Image::builder()
            .s3_object(
                rk::S3Object::builder()
                    .bucket(&object.bucket)
                    .name(&object.key)
                    .build(),
            )
            .build();

        let result = self
            .client
            .index_faces()
            .collection_id(&params.collection_id)
            .image(image)
            .external_image_id(external_image_id)
            .detection_attributes(rk::Attribute::from(params.detection_attributes.as_str()))
            .max_faces(max_faces(params))
            .quality_filter(rk::QualityFilter::from(params.quality_filter.as_str()))
            .send()
            .await;

        match result {
            Ok(output) => {
                tracing::debug!(
                    %object,
                    indexed = output.face_records().len(),
                    unindexed = output.unindexed_faces().len(),
                    "IndexFaces returned"
                );
                Ok(EnrollOutcome::Enrolled(enrolled_faces(&output)))
            }
            Err(err) => no_face_or(classify("IndexFaces", err), EnrollOutcome::NoFaceDetected),
        }
    }

    async fn search(
        &self,
        params: &RecognitionParams,
        image: &[u8],
    ) -> Result<SearchOutcome, EngineError> {
        let result = self
            .client
            .search_faces_by_image()
            .collection_id(&params.collection_id)
            .image(rk::Image::builder().bytes(Blob::new(image)).build())
            .max_faces(max_faces(params))
            .face_match_threshold(params.similarity_threshold)
            .quality_filter(rk::QualityFilter::from(params.quality_filter.as_str()))
            .send()
            .await;

        match result {
            Ok(output) => Ok(SearchOutcome::Matches(search_response(&output))),
            Err(err) => no_face_or(
                classify("SearchFacesByImage", err),
                SearchOutcome::NoFaceDetected,
            ),
        }
    }
}

fn max_faces(params: &RecognitionParams) -> i32 {
    i32::try_from(params.max_faces).unwrap_or(i32::MAX)
}

fn no_face_or<T>(err: EngineError, no_face: T) -> Result<T, EngineError> {
    if err.is_no_face_detected() {
        if rejects_external_image_id(&err) {
            tracing::warn!(
                message = %err.message,
                "engine rejected the external image id; image skipped"
            );
        } else {
            tracing::debug!(message = %err.message, "engine reported no detectable face");
        }
        Ok(no_face)
    } else {
        Err(err)
    }
}

/// IndexFaces only accepts ids matching `[a-zA-Z0-9_.\-:]+`; keys with
/// spaces or slashes come back as InvalidParameter naming the field.
fn rejects_external_image_id(err: &EngineError) -> bool {
    err.message.contains("ExternalImageId") || err.message.contains("externalImageId")
}

/// Classify an SDK failure by its service error code. Transport failures
/// (timeouts, dispatch) have no code and land in the catch-all.
fn classify<E, R>(operation: &'static str, err: SdkError<E, R>) -> EngineError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let kind = match err.as_service_error() {
        Some(service) => classify_code(service.code()),
        None => ErrorKind::Unrecognized(transport_failure(&err).to_string()),
    };
    EngineError::new(kind, format!("{operation}: {}", DisplayErrorContext(&err)))
}

fn classify_code(code: Option<&str>) -> ErrorKind {
    ErrorKind::from_code(code.unwrap_or("Unknown"))
}

fn transport_failure<E, R>(err: &SdkError<E, R>) -> &'static str {
    match err {
        SdkError::TimeoutError(_) => "TimeoutError",
        SdkError::DispatchFailure(_) => "DispatchFailure",
        SdkError::ConstructionFailure(_) => "ConstructionFailure",
        SdkError::ResponseError(_) => "ResponseError",
        _ => "Unknown",
    }
}

fn bounding_box(b: &rk::BoundingBox) -> BoundingBox {
    BoundingBox {
        width: b.width().unwrap_or_default(),
        height: b.height().unwrap_or_default(),
        left: b.left().unwrap_or_default(),
        top: b.top().unwrap_or_default(),
    }
}

/// Faces without an id cannot be stored or resolved and are skipped.
fn face(f: &rk::Face) -> Option<Face> {
    Some(Face {
        face_id: f.face_id()?.to_string(),
        bounding_box: f.bounding_box().map(bounding_box),
        image_id: f.image_id().map(str::to_string),
        external_image_id: f.external_image_id().map(str::to_string),
        confidence: f.confidence(),
        index_faces_model_version: f.index_faces_model_version().map(str::to_string),
    })
}

fn face_detail(d: &rk::FaceDetail) -> FaceDetail {
    FaceDetail {
        pose: d.pose().map(|p| Pose {
            roll: p.roll().unwrap_or_default(),
            yaw: p.yaw().unwrap_or_default(),
            pitch: p.pitch().unwrap_or_default(),
        }),
        quality: d.quality().map(|q| ImageQuality {
            brightness: q.brightness().unwrap_or_default(),
            sharpness: q.sharpness().unwrap_or_default(),
        }),
    }
}

fn enrolled_faces(output: &IndexFacesOutput) -> Vec<EnrolledFace> {
    output
        .face_records()
        .iter()
        .filter_map(|record| {
            let face = record.face().and_then(face);
            if face.is_none() {
                tracing::warn!("IndexFaces returned a face record without a face id");
            }
            Some(EnrolledFace {
                face: face?,
                detail: record.face_detail().map(face_detail),
            })
        })
        .collect()
}

fn search_response(output: &SearchFacesByImageOutput) -> SearchResponse {
    SearchResponse {
        searched_face_bounding_box: output.searched_face_bounding_box().map(bounding_box),
        searched_face_confidence: output.searched_face_confidence(),
        face_matches: output
            .face_matches()
            .iter()
            .filter_map(|m| {
                Some(FaceMatch {
                    similarity: m.similarity().unwrap_or_default(),
                    face: m.face().and_then(face)?,
                })
            })
            .collect(),
        face_model_version: output.face_model_version().map(str::to_string),
    }
}
