//! Inbound payload validation for both pipelines.
//!
//! The indexer receives an object-created notification; the searcher
//! receives an HTTP request whose body is a base64 encoded JPEG or PNG.

use crate::types::ObjectRef;
use base64::Engine as _;
use image::ImageFormat;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    #[error("notification has no Records array")]
    MissingRecords,
    #[error("record {index} has no {field}")]
    MissingField { index: usize, field: &'static str },
    #[error("record {index} object key is not valid UTF-8 after decoding")]
    KeyEncoding { index: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("request has no image body")]
    MissingBody,
    #[error("image body is not valid base64: {0}")]
    InvalidEncoding(String),
    #[error("image is not a JPEG or PNG")]
    UnsupportedImageFormat,
}

/// Extract the objects referenced by an object-created notification.
///
/// An empty `Records` array is valid and yields no objects.
pub fn parse_notification(event: &Value) -> Result<Vec<ObjectRef>, EventError> {
    let records = event
        .get("Records")
        .and_then(Value::as_array)
        .ok_or(EventError::MissingRecords)?;

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let s3 = record.get("s3");
            let bucket = s3
                .and_then(|s| s.pointer("/bucket/name"))
                .and_then(Value::as_str)
                .ok_or(EventError::MissingField { index, field: "s3.bucket.name" })?;
            let raw_key = s3
                .and_then(|s| s.pointer("/object/key"))
                .and_then(Value::as_str)
                .ok_or(EventError::MissingField { index, field: "s3.object.key" })?;
            let key = decode_object_key(raw_key).ok_or(EventError::KeyEncoding { index })?;
            Ok(ObjectRef::new(bucket, key))
        })
        .collect()
}

/// Decode a notification object key (form encoding: `+` is a space).
pub fn decode_object_key(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .ok()
        .map(|key| key.into_owned())
}

/// HTTP request as delivered by the API front door.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl ApiRequest {
    /// Wrap raw image bytes the way the front door would deliver them.
    pub fn from_image(bytes: &[u8]) -> Self {
        Self {
            body: Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
            is_base64_encoded: true,
        }
    }

    /// Decode the body into image bytes the engine accepts.
    ///
    /// The body is always treated as base64 text, whatever `isBase64Encoded`
    /// says; ASCII whitespace (line wrapping) is ignored.
    pub fn decode_image(&self) -> Result<Vec<u8>, RequestError> {
        let body = self.body.as_deref().unwrap_or_default();
        let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        if compact.is_empty() {
            return Err(RequestError::MissingBody);
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| RequestError::InvalidEncoding(e.to_string()))?;

        match image::guess_format(&bytes) {
            Ok(ImageFormat::Jpeg | ImageFormat::Png) => Ok(bytes),
            _ => Err(RequestError::UnsupportedImageFormat),
        }
    }
}
