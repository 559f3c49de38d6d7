use crate::engine::EngineError;
use crate::event::{EventError, RequestError};
use crate::store::{StorageError, StoreError};
use thiserror::Error;

/// Every way an index or search invocation can fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("malformed storage notification")]
    Notification(#[from] EventError),
    #[error("invalid search request")]
    Request(#[from] RequestError),
    #[error("recognition engine request failed")]
    Engine(#[from] EngineError),
    #[error("could not read source object")]
    Storage(#[from] StorageError),
    #[error("face store request failed")]
    Store(#[from] StoreError),
}

/// Render an error and its sources as `"outer: inner: root"`.
pub fn cause_chain(err: &dyn std::error::Error) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

/// Message of the innermost error in the source chain.
pub fn root_cause(err: &dyn std::error::Error) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}
