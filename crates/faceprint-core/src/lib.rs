//! faceprint-core — Face index and search pipelines.
//!
//! Images landing in object storage are enrolled with a recognition engine
//! and one record per detected face is persisted. Search submits a query
//! image, resolves every match back to its record and returns display names.
//! The engine, the record store and the metadata source are traits so the
//! pipelines never see a concrete backend.

pub mod engine;
pub mod error;
pub mod event;
pub mod indexer;
pub mod normalize;
pub mod response;
pub mod searcher;
pub mod store;
pub mod taxonomy;
pub mod types;

#[cfg(test)]
mod testing;

pub use engine::{
    DetectionAttributes, EngineError, EnrollOutcome, ErrorKind, QualityFilter, RecognitionEngine,
    RecognitionParams, SearchOutcome,
};
pub use error::PipelineError;
pub use event::ApiRequest;
pub use indexer::{IndexReport, Indexer};
pub use response::{HttpResponse, IndexResponse};
pub use searcher::{SearchReport, Searcher};
pub use store::{FaceStore, ObjectMetadataSource, StorageError, StoreError};
pub use types::{FaceRecord, ObjectRef};
