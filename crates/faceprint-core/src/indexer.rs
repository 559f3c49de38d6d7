//! Indexer pipeline: object-created notification to persisted face records.
//!
//! Objects in one notification are handled sequentially. The first engine,
//! storage or store failure ends the batch; records already written for
//! earlier faces stay written.

use crate::engine::{EnrollOutcome, RecognitionEngine, RecognitionParams};
use crate::error::PipelineError;
use crate::event;
use crate::response::IndexResponse;
use crate::store::{FaceStore, ObjectMetadataSource};
use crate::taxonomy;
use crate::types::{FaceRecord, ObjectRef};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// What one indexing invocation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub objects: usize,
    pub faces_indexed: usize,
    /// Objects in which the engine found no face.
    pub objects_without_faces: usize,
}

pub struct Indexer {
    engine: Arc<dyn RecognitionEngine>,
    store: Arc<dyn FaceStore>,
    objects: Arc<dyn ObjectMetadataSource>,
    params: RecognitionParams,
}

impl Indexer {
    pub fn new(
        engine: Arc<dyn RecognitionEngine>,
        store: Arc<dyn FaceStore>,
        objects: Arc<dyn ObjectMetadataSource>,
        params: RecognitionParams,
    ) -> Self {
        Self {
            engine,
            store,
            objects,
            params,
        }
    }

    /// Entry point: run [`index`](Self::index) and collapse the outcome into
    /// the external response.
    pub async fn handle(&self, event: &Value) -> IndexResponse {
        match self.index(event).await {
            Ok(_) => IndexResponse::ok(),
            Err(err) => {
                let resolution = taxonomy::resolve(&err);
                tracing::error!(
                    status = resolution.status,
                    label = resolution.label,
                    error = %crate::error::cause_chain(&err),
                    "index invocation failed"
                );
                IndexResponse::from_error(&err)
            }
        }
    }

    /// Index every object referenced by `event`.
    pub async fn index(&self, event: &Value) -> Result<IndexReport, PipelineError> {
        let span = tracing::info_span!("index", invocation = %Uuid::new_v4());
        self.index_batch(event).instrument(span).await
    }

    async fn index_batch(&self, event: &Value) -> Result<IndexReport, PipelineError> {
        let objects = event::parse_notification(event)?;
        if objects.is_empty() {
            tracing::info!("notification has no records; nothing to index");
        }

        let mut report = IndexReport::default();
        for object in &objects {
            let indexed = self.index_object(object).await?;
            report.objects += 1;
            report.faces_indexed += indexed;
            if indexed == 0 {
                report.objects_without_faces += 1;
            }
        }

        tracing::info!(
            objects = report.objects,
            faces = report.faces_indexed,
            without_faces = report.objects_without_faces,
            "index invocation complete"
        );
        Ok(report)
    }

    /// Enroll one object and persist a record per detected face.
    async fn index_object(&self, object: &ObjectRef) -> Result<usize, PipelineError> {
        let metadata = self.objects.object_metadata(&object.bucket, &object.key).await?;
        tracing::debug!(%object, metadata = ?metadata, "fetched object metadata");

        let faces = match self.engine.enroll(&self.params, object, &object.key).await? {
            EnrollOutcome::Enrolled(faces) => faces,
            EnrollOutcome::NoFaceDetected => {
                tracing::info!(%object, "no face detected; nothing to persist");
                return Ok(0);
            }
        };

        let indexed_at = Utc::now();
        let mut written = 0;
        for face in faces {
            let record = FaceRecord::from_enrollment(face, object, &metadata, indexed_at);
            self.store.put(&record).await?;
            tracing::debug!(face_id = %record.face_id, %object, "face record written");
            written += 1;
        }

        tracing::info!(%object, faces = written, "object indexed");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, ErrorKind};
    use crate::testing::{notification, params, FakeEngine, MemoryStore, StaticMetadata};
    use std::collections::HashSet;

    fn indexer(
        engine: &Arc<FakeEngine>,
        store: &Arc<MemoryStore>,
        metadata: StaticMetadata,
    ) -> Indexer {
        Indexer::new(engine.clone(), store.clone(), Arc::new(metadata), params())
    }

    #[tokio::test]
    async fn test_one_put_per_object_and_face() {
        let engine = Arc::new(
            FakeEngine::default()
                .with_faces("a.jpg", 2)
                .with_faces("b.jpg", 3)
                .with_faces("c.jpg", 1),
        );
        let store = Arc::new(MemoryStore::default());
        let event = notification(&[("faces", "a.jpg"), ("faces", "b.jpg"), ("faces", "c.jpg")]);

        let report = indexer(&engine, &store, StaticMetadata::default())
            .index(&event)
            .await
            .unwrap();

        assert_eq!(report.objects, 3);
        assert_eq!(report.faces_indexed, 6);
        assert_eq!(store.puts(), 6);
        let ids: HashSet<_> = store.records().into_iter().map(|r| r.face_id).collect();
        assert_eq!(ids.len(), 6);
    }

    #[tokio::test]
    async fn test_two_faces_share_object_identity() {
        let engine = Arc::new(FakeEngine::default().with_faces("team.jpg", 2));
        let store = Arc::new(MemoryStore::default());
        let metadata = StaticMetadata::default().with("team.jpg", &[("event", "offsite")]);

        let response = indexer(&engine, &store, metadata)
            .handle(&notification(&[("faces", "team.jpg")]))
            .await;
        assert_eq!(response, IndexResponse::ok());

        let records = store.records();
        assert_eq!(records.len(), 2);
        assert_ne!(records[0].face_id, records[1].face_id);
        for record in &records {
            assert_eq!(record.bucket, "faces");
            assert_eq!(record.object_key, "team.jpg");
            assert_eq!(record.external_image_id, "team.jpg");
            assert_eq!(record.object_metadata.get("event").map(String::as_str), Some("offsite"));
        }
    }

    #[tokio::test]
    async fn test_zero_faces_is_success() {
        let engine = Arc::new(FakeEngine::default().with_faces("empty-room.jpg", 0));
        let store = Arc::new(MemoryStore::default());

        let response = indexer(&engine, &store, StaticMetadata::default())
            .handle(&notification(&[("faces", "empty-room.jpg")]))
            .await;

        assert_eq!(response.status_code, 200);
        assert!(response.data.is_none());
        assert_eq!(store.puts(), 0);
    }

    #[tokio::test]
    async fn test_no_face_detected_continues_batch() {
        let engine = Arc::new(FakeEngine::default().without_face("landscape.jpg"));
        let store = Arc::new(MemoryStore::default());
        let event = notification(&[("faces", "landscape.jpg"), ("faces", "bob.jpg")]);

        let report = indexer(&engine, &store, StaticMetadata::default())
            .index(&event)
            .await
            .unwrap();

        assert_eq!(report.objects_without_faces, 1);
        assert_eq!(report.faces_indexed, 1);
        assert_eq!(store.records()[0].object_key, "bob.jpg");
    }

    #[tokio::test]
    async fn test_empty_records_makes_no_engine_calls() {
        let engine = Arc::new(FakeEngine::default());
        let store = Arc::new(MemoryStore::default());

        let response = indexer(&engine, &store, StaticMetadata::default())
            .handle(&notification(&[]))
            .await;

        assert_eq!(response, IndexResponse::ok());
        assert!(engine.enroll_calls().is_empty());
        assert_eq!(store.puts(), 0);
    }

    #[tokio::test]
    async fn test_malformed_notification_is_500_without_engine_call() {
        let engine = Arc::new(FakeEngine::default());
        let store = Arc::new(MemoryStore::default());

        let response = indexer(&engine, &store, StaticMetadata::default())
            .handle(&serde_json::json!({ "detail": "not a notification" }))
            .await;

        assert_eq!(response.status_code, 500);
        let body = response.data.unwrap();
        assert!(body.description.starts_with("MalformedNotification (500)"));
        assert!(engine.enroll_calls().is_empty());
    }

    #[tokio::test]
    async fn test_engine_error_short_circuits_batch() {
        let engine = Arc::new(
            FakeEngine::default()
                .failing_enroll("b.jpg", EngineError::new(ErrorKind::Throttling, "rate exceeded")),
        );
        let store = Arc::new(MemoryStore::default());
        let event = notification(&[("faces", "a.jpg"), ("faces", "b.jpg"), ("faces", "c.jpg")]);

        let response = indexer(&engine, &store, StaticMetadata::default())
            .handle(&event)
            .await;

        assert_eq!(response.status_code, 401);
        let keys: Vec<_> = engine.enroll_calls().into_iter().map(|o| o.key).collect();
        assert_eq!(keys, vec!["a.jpg", "b.jpg"]);
        // The first object's record is not rolled back.
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_engine_errors_map_through_taxonomy() {
        for (kind, status) in [
            (ErrorKind::AccessDenied, 403),
            (ErrorKind::ResourceNotFound, 404),
            (ErrorKind::InvalidS3Object, 406),
            (ErrorKind::InternalServerError, 500),
            (ErrorKind::Unrecognized("Weird".into()), 500),
        ] {
            let engine = Arc::new(
                FakeEngine::default().failing_enroll("x.jpg", EngineError::new(kind, "boom")),
            );
            let store = Arc::new(MemoryStore::default());
            let response = indexer(&engine, &store, StaticMetadata::default())
                .handle(&notification(&[("faces", "x.jpg")]))
                .await;
            assert_eq!(response.status_code, status);
            assert!(response.data.is_some());
        }
    }

    #[tokio::test]
    async fn test_store_failure_keeps_earlier_writes() {
        let engine = Arc::new(FakeEngine::default().with_faces("crowd.jpg", 3));
        let store = Arc::new(MemoryStore::failing_put(2));

        let response = indexer(&engine, &store, StaticMetadata::default())
            .handle(&notification(&[("faces", "crowd.jpg")]))
            .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(store.puts(), 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_object_is_404() {
        let engine = Arc::new(FakeEngine::default());
        let store = Arc::new(MemoryStore::default());
        let metadata = StaticMetadata::default().missing("deleted.jpg");

        let response = indexer(&engine, &store, metadata)
            .handle(&notification(&[("faces", "deleted.jpg")]))
            .await;

        assert_eq!(response.status_code, 404);
        assert!(engine.enroll_calls().is_empty());
    }

    #[tokio::test]
    async fn test_object_key_is_url_decoded() {
        let engine = Arc::new(FakeEngine::default());
        let store = Arc::new(MemoryStore::default());

        indexer(&engine, &store, StaticMetadata::default())
            .index(&notification(&[("faces", "Jane_Doe%3A1.jpg")]))
            .await
            .unwrap();

        assert_eq!(engine.enroll_calls()[0].key, "Jane_Doe:1.jpg");
        assert_eq!(store.records()[0].external_image_id, "Jane_Doe:1.jpg");
    }
}
