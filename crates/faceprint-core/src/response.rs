//! Response envelopes returned by the two entry points.

use crate::error::{cause_chain, root_cause, PipelineError};
use crate::taxonomy::{self, Resolution};
use crate::types::SearchResponse;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResponseError {
    #[error("invalid HTTP status code: {0}")]
    InvalidStatus(u16),
    #[error("body serialization failed: {0}")]
    Serialize(String),
}

/// Error body shared by both entry points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Message of the underlying failure.
    pub error: String,
    /// Label, status and full cause chain for operators.
    pub description: String,
}

impl ErrorBody {
    pub fn new(err: &PipelineError, resolution: Resolution) -> Self {
        Self {
            error: root_cause(err),
            description: format!(
                "{} ({}): {}",
                resolution.label,
                resolution.status,
                cause_chain(err)
            ),
        }
    }
}

/// Successful search body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    /// Raw engine payload.
    pub faces: SearchResponse,
    /// Display names of matches with a stored record, in match order.
    pub matched_faces: Vec<String>,
}

/// Proxy-integration HTTP response with a JSON string body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    pub is_base64_encoded: bool,
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn json<T: Serialize>(status_code: u16, body: &T) -> Result<Self, ResponseError> {
        if !(100..=599).contains(&status_code) {
            return Err(ResponseError::InvalidStatus(status_code));
        }
        let body = serde_json::to_string(body).map_err(|e| ResponseError::Serialize(e.to_string()))?;
        Ok(Self {
            is_base64_encoded: false,
            status_code,
            headers: BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())]),
            body,
        })
    }

    /// Envelope for a failed invocation.
    pub fn from_error(err: &PipelineError) -> Self {
        let resolution = taxonomy::resolve(err);
        let body = ErrorBody::new(err, resolution);
        Self::json(resolution.status, &body).unwrap_or_else(|e| Self::fallback(&e))
    }

    /// Plain 500 used when a body could not be rendered at all.
    pub fn fallback(err: &ResponseError) -> Self {
        let body = serde_json::json!({
            "error": "response could not be rendered",
            "description": err.to_string(),
        });
        Self {
            is_base64_encoded: false,
            status_code: taxonomy::CATCH_ALL.status,
            headers: BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())]),
            body: body.to_string(),
        }
    }
}

/// Indexer result: a status and, on failure, the error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResponse {
    pub status_code: u16,
    pub data: Option<ErrorBody>,
}

impl IndexResponse {
    pub fn ok() -> Self {
        Self {
            status_code: 200,
            data: None,
        }
    }

    pub fn from_error(err: &PipelineError) -> Self {
        let resolution = taxonomy::resolve(err);
        Self {
            status_code: resolution.status,
            data: Some(ErrorBody::new(err, resolution)),
        }
    }
}
