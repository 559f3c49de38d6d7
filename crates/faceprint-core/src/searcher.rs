//! Searcher pipeline: query image to matched display names.

use crate::engine::{RecognitionEngine, RecognitionParams, SearchOutcome};
use crate::error::{cause_chain, PipelineError};
use crate::event::ApiRequest;
use crate::normalize::display_name;
use crate::response::{HttpResponse, SearchBody};
use crate::store::FaceStore;
use crate::taxonomy;
use crate::types::SearchResponse;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// What one search invocation found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchReport {
    /// Engine payload, unmodified.
    pub response: SearchResponse,
    /// Display names for matches that have a stored record, in match order.
    pub matched_faces: Vec<String>,
    /// Face ids the engine matched but the store has no record for.
    pub drifted: Vec<String>,
}

pub struct Searcher {
    engine: Arc<dyn RecognitionEngine>,
    store: Arc<dyn FaceStore>,
    params: RecognitionParams,
}

impl Searcher {
    pub fn new(
        engine: Arc<dyn RecognitionEngine>,
        store: Arc<dyn FaceStore>,
        params: RecognitionParams,
    ) -> Self {
        Self {
            engine,
            store,
            params,
        }
    }

    /// Entry point: search and render the HTTP response.
    pub async fn handle(&self, request: &ApiRequest) -> HttpResponse {
        let err = match self.search(request).await {
            Ok(report) => {
                let body = SearchBody {
                    faces: report.response,
                    matched_faces: report.matched_faces,
                };
                match HttpResponse::json(200, &body) {
                    Ok(response) => return response,
                    Err(e) => {
                        tracing::error!(error = %e, "search response could not be rendered");
                        return HttpResponse::fallback(&e);
                    }
                }
            }
            Err(err) => err,
        };

        let resolution = taxonomy::resolve(&err);
        tracing::error!(
            status = resolution.status,
            label = resolution.label,
            error = %cause_chain(&err),
            "search invocation failed"
        );
        HttpResponse::from_error(&err)
    }

    /// Decode the request image and search with it.
    pub async fn search(&self, request: &ApiRequest) -> Result<SearchReport, PipelineError> {
        let span = tracing::info_span!("search", invocation = %Uuid::new_v4());
        self.search_request(request).instrument(span).await
    }

    async fn search_request(&self, request: &ApiRequest) -> Result<SearchReport, PipelineError> {
        let image = request.decode_image()?;
        self.search_image(&image).await
    }

    /// Search the collection with raw image bytes and resolve each match.
    pub async fn search_image(&self, image: &[u8]) -> Result<SearchReport, PipelineError> {
        tracing::debug!(bytes = image.len(), "searching collection");

        let response = match self.engine.search(&self.params, image).await? {
            SearchOutcome::Matches(response) => response,
            SearchOutcome::NoFaceDetected => {
                tracing::info!("no face detected in query image");
                return Ok(SearchReport::default());
            }
        };

        let mut matched_faces = Vec::with_capacity(response.face_matches.len());
        let mut drifted = Vec::new();
        for face_match in &response.face_matches {
            let face_id = &face_match.face.face_id;
            match self.store.get(face_id).await? {
                Some(record) => matched_faces.push(display_name(&record.external_image_id)),
                None => {
                    tracing::warn!(
                        face_id = %face_id,
                        similarity = face_match.similarity,
                        "engine matched a face with no stored record"
                    );
                    drifted.push(face_id.clone());
                }
            }
        }

        tracing::info!(
            matches = response.face_matches.len(),
            resolved = matched_faces.len(),
            drifted = drifted.len(),
            "search complete"
        );
        Ok(SearchReport {
            response,
            matched_faces,
            drifted,
        })
    }
}
