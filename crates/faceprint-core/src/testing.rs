//! In-memory collaborators for pipeline tests.

use crate::engine::{
    DetectionAttributes, EngineError, EnrollOutcome, QualityFilter, RecognitionEngine,
    RecognitionParams, SearchOutcome,
};
use crate::event::ApiRequest;
use crate::store::{FaceStore, ObjectMetadataSource, StorageError, StoreError};
use crate::types::{
    BoundingBox, EnrolledFace, Face, FaceDetail, FaceMatch, FaceRecord, ImageQuality, ObjectRef,
    SearchResponse,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

pub fn params() -> RecognitionParams {
    RecognitionParams {
        collection_id: "facialrecognition-collection".into(),
        max_faces: 10,
        similarity_threshold: 80.0,
        detection_attributes: DetectionAttributes::Default,
        quality_filter: QualityFilter::Auto,
    }
}

pub fn notification(objects: &[(&str, &str)]) -> Value {
    let records: Vec<Value> = objects
        .iter()
        .map(|(bucket, key)| {
            json!({
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": { "bucket": { "name": bucket }, "object": { "key": key } }
            })
        })
        .collect();
    json!({ "Records": records })
}

pub fn jpeg_request() -> ApiRequest {
    ApiRequest::from_image(JPEG_MAGIC)
}

/// Scripted recognition engine backed by an in-memory collection.
///
/// Unless told otherwise, every enrolled image yields one face and every
/// search matches the whole collection in enrollment order.
#[derive(Default)]
pub struct FakeEngine {
    faces_per_key: Mutex<HashMap<String, usize>>,
    enroll_failures: Mutex<HashMap<String, EngineError>>,
    faceless_keys: Mutex<HashSet<String>>,
    search_failure: Mutex<Option<EngineError>>,
    search_finds_no_face: AtomicBool,
    similarities: Mutex<Option<Vec<f32>>>,
    collection: Mutex<Vec<Face>>,
    enroll_calls: Mutex<Vec<ObjectRef>>,
    search_calls: AtomicUsize,
    next_id: AtomicUsize,
}

impl FakeEngine {
    pub fn with_faces(self, key: &str, count: usize) -> Self {
        self.faces_per_key.lock().unwrap().insert(key.into(), count);
        self
    }

    pub fn without_face(self, key: &str) -> Self {
        self.faceless_keys.lock().unwrap().insert(key.into());
        self
    }

    pub fn failing_enroll(self, key: &str, err: EngineError) -> Self {
        self.enroll_failures.lock().unwrap().insert(key.into(), err);
        self
    }

    pub fn failing_search(self, err: EngineError) -> Self {
        *self.search_failure.lock().unwrap() = Some(err);
        self
    }

    pub fn search_finds_no_face(self) -> Self {
        self.search_finds_no_face.store(true, Ordering::SeqCst);
        self
    }

    /// Report these similarities, in this order, for the first matches
    /// instead of a descending sequence.
    pub fn with_similarities(self, similarities: &[f32]) -> Self {
        *self.similarities.lock().unwrap() = Some(similarities.to_vec());
        self
    }

    /// Put a face straight into the collection, bypassing the store.
    pub fn seed(&self, face_id: &str, external_image_id: &str) {
        self.collection.lock().unwrap().push(Face {
            face_id: face_id.into(),
            external_image_id: Some(external_image_id.into()),
            ..Default::default()
        });
    }

    pub fn enroll_calls(&self) -> Vec<ObjectRef> {
        self.enroll_calls.lock().unwrap().clone()
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionEngine for FakeEngine {
    async fn enroll(
        &self,
        params: &RecognitionParams,
        object: &ObjectRef,
        external_image_id: &str,
    ) -> Result<EnrollOutcome, EngineError> {
        self.enroll_calls.lock().unwrap().push(object.clone());

        if let Some(err) = self.enroll_failures.lock().unwrap().get(&object.key) {
            return Err(err.clone());
        }
        if self.faceless_keys.lock().unwrap().contains(&object.key) {
            return Ok(EnrollOutcome::NoFaceDetected);
        }

        let count = self
            .faces_per_key
            .lock()
            .unwrap()
            .get(&object.key)
            .copied()
            .unwrap_or(1)
            .min(params.max_faces as usize);

        let mut enrolled = Vec::with_capacity(count);
        for _ in 0..count {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            let face = Face {
                face_id: format!("face-{n:04}"),
                bounding_box: Some(BoundingBox { width: 0.25, height: 0.3, left: 0.1, top: 0.2 }),
                image_id: Some(format!("image-{n:04}")),
                external_image_id: Some(external_image_id.into()),
                confidence: Some(99.99),
                index_faces_model_version: Some("7.0".into()),
            };
            self.collection.lock().unwrap().push(face.clone());
            enrolled.push(EnrolledFace {
                face,
                detail: Some(FaceDetail {
                    pose: None,
                    quality: Some(ImageQuality { brightness: 80.5, sharpness: 92.1 }),
                }),
            });
        }
        Ok(EnrollOutcome::Enrolled(enrolled))
    }

    async fn search(
        &self,
        params: &RecognitionParams,
        _image: &[u8],
    ) -> Result<SearchOutcome, EngineError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.search_failure.lock().unwrap().clone() {
            return Err(err);
        }
        if self.search_finds_no_face.load(Ordering::SeqCst) {
            return Ok(SearchOutcome::NoFaceDetected);
        }

        let scripted = self.similarities.lock().unwrap().clone().unwrap_or_default();
        let face_matches = self
            .collection
            .lock()
            .unwrap()
            .iter()
            .take(params.max_faces as usize)
            .enumerate()
            .map(|(i, face)| FaceMatch {
                similarity: scripted.get(i).copied().unwrap_or(99.5 - i as f32),
                face: face.clone(),
            })
            .collect();

        Ok(SearchOutcome::Matches(SearchResponse {
            searched_face_bounding_box: Some(BoundingBox { width: 0.5, height: 0.5, left: 0.25, top: 0.25 }),
            searched_face_confidence: Some(99.9),
            face_matches,
            face_model_version: Some("7.0".into()),
        }))
    }
}

/// Face store held in a map, refusing overwrites like the real one.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, FaceRecord>>,
    puts: AtomicUsize,
    fail_put_number: Option<usize>,
    fail_gets: bool,
}

impl MemoryStore {
    /// Make the `n`th put (1-based) fail with a backend error.
    pub fn failing_put(n: usize) -> Self {
        Self {
            fail_put_number: Some(n),
            ..Default::default()
        }
    }

    /// Make every get fail with a backend error.
    pub fn failing_get() -> Self {
        Self {
            fail_gets: true,
            ..Default::default()
        }
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn records(&self) -> Vec<FaceRecord> {
        let mut records: Vec<_> = self.records.lock().unwrap().values().cloned().collect();
        records.sort_by(|a, b| a.face_id.cmp(&b.face_id));
        records
    }
}

#[async_trait]
impl FaceStore for MemoryStore {
    async fn put(&self, record: &FaceRecord) -> Result<(), StoreError> {
        let n = self.puts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_put_number == Some(n) {
            return Err(StoreError::Backend("simulated write failure".into()));
        }
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&record.face_id) {
            return Err(StoreError::AlreadyExists(record.face_id.clone()));
        }
        records.insert(record.face_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, face_id: &str) -> Result<Option<FaceRecord>, StoreError> {
        if self.fail_gets {
            return Err(StoreError::Backend("down".into()));
        }
        Ok(self.records.lock().unwrap().get(face_id).cloned())
    }
}

/// Metadata source answering from a fixed table; unknown keys have no metadata.
#[derive(Default)]
pub struct StaticMetadata {
    metadata: HashMap<String, BTreeMap<String, String>>,
    missing: HashSet<String>,
}

impl StaticMetadata {
    pub fn with(mut self, key: &str, entries: &[(&str, &str)]) -> Self {
        let map = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.metadata.insert(key.into(), map);
        self
    }

    pub fn missing(mut self, key: &str) -> Self {
        self.missing.insert(key.into());
        self
    }
}

#[async_trait]
impl ObjectMetadataSource for StaticMetadata {
    async fn object_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<BTreeMap<String, String>, StorageError> {
        if self.missing.contains(key) {
            return Err(StorageError::NotFound {
                bucket: bucket.into(),
                key: key.into(),
            });
        }
        Ok(self.metadata.get(key).cloned().unwrap_or_default())
    }
}
