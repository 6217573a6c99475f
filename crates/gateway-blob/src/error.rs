//! Blob backend error taxonomy.
//!
//! Deliberately small: the storage coordinator (C4) is the only caller and
//! it collapses these into [`gateway_common::Error`] at its boundary, so
//! this only needs to distinguish the cases C4 branches on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("no such blob: {0}")]
    NotFound(String),

    #[error("precondition failed")]
    PreconditionFailed,

    #[error("not modified")]
    NotModified,

    #[error("invalid byte range")]
    InvalidRange,

    #[error("no such multipart upload: {0}")]
    NoSuchUpload(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlobError {
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) | Self::NoSuchUpload(_) => 404,
            Self::PreconditionFailed => 412,
            Self::NotModified => 304,
            Self::InvalidRange => 416,
            Self::Unavailable(_) => 503,
            Self::Backend(_) | Self::Io(_) => 500,
        }
    }
}

impl From<BlobError> for gateway_common::Error {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(key) => Self::NoSuchKey {
                bucket: String::new(),
                key,
            },
            BlobError::NoSuchUpload(id) => Self::NoSuchUpload(id),
            BlobError::PreconditionFailed | BlobError::NotModified => {
                Self::invalid_parameter("precondition failed")
            }
            BlobError::InvalidRange => Self::invalid_parameter("invalid byte range"),
            BlobError::Unavailable(msg) => Self::S3Error(msg),
            BlobError::Backend(msg) => Self::S3Error(msg),
            BlobError::Io(e) => Self::internal(e.to_string()),
        }
    }
}
