//! Maps internal failures onto the stable external status contract.
//!
//! Both pipelines resolve through here so that one internal failure always
//! yields the same status and label.

use crate::engine::ErrorKind;
use crate::error::PipelineError;
use crate::event::RequestError;
use crate::store::StorageError;

/// External status and canonical label for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub status: u16,
    pub label: &'static str,
}

impl Resolution {
    const fn new(status: u16, label: &'static str) -> Self {
        Self { status, label }
    }
}

/// Anything not listed in the table.
pub const CATCH_ALL: Resolution = Resolution::new(500, "InternalServerError");

/// Resolve an engine failure kind.
pub fn resolve_kind(kind: &ErrorKind) -> Resolution {
    match kind {
        ErrorKind::Throttling => Resolution::new(401, "ThrottlingException"),
        ErrorKind::ProvisionedThroughputExceeded => {
            Resolution::new(401, "ProvisionedThroughputExceededException")
        }
        ErrorKind::ServiceQuotaExceeded => Resolution::new(401, "ServiceQuotaExceededException"),
        ErrorKind::AccessDenied => Resolution::new(403, "AccessDeniedException"),
        ErrorKind::ResourceNotFound => Resolution::new(404, "ResourceNotFoundException"),
        ErrorKind::InvalidS3Object => Resolution::new(406, "InvalidS3ObjectException"),
        ErrorKind::ImageTooLarge => Resolution::new(406, "ImageTooLargeException"),
        ErrorKind::InvalidImageFormat => Resolution::new(406, "InvalidImageFormatException"),
        ErrorKind::InternalServerError => CATCH_ALL,
        // The engine adapter turns InvalidParameter into an empty result, so
        // reaching here means it came from somewhere unexpected.
        ErrorKind::InvalidParameter | ErrorKind::Unrecognized(_) => CATCH_ALL,
    }
}

/// Resolve any pipeline failure.
pub fn resolve(err: &PipelineError) -> Resolution {
    match err {
        PipelineError::Notification(_) => Resolution::new(500, "MalformedNotification"),
        PipelineError::Request(RequestError::UnsupportedImageFormat) => {
            resolve_kind(&ErrorKind::InvalidImageFormat)
        }
        PipelineError::Request(_) => Resolution::new(400, "InvalidImageEncoding"),
        PipelineError::Engine(e) => resolve_kind(&e.kind),
        PipelineError::Storage(StorageError::NotFound { .. }) => {
            resolve_kind(&ErrorKind::ResourceNotFound)
        }
        PipelineError::Storage(_) | PipelineError::Store(_) => CATCH_ALL,
    }
}
