//! Blob backend adapter (C2): a narrow, tenant-agnostic interface over
//! object bytes, with an S3-compatible implementation and a local
//! filesystem implementation for `STORAGE_BACKEND=file` deployments.

pub mod backend;
pub mod error;
pub mod file;
pub mod s3;
pub mod types;

pub use backend::BlobBackend;
pub use error::BlobError;
pub use file::FileBackend;
pub use s3::S3Backend;
pub use types::{
    ByteRange, CompletedPart, ConditionalGet, ConditionalOutcome, GetObjectOutput, ObjectMeta,
    PartInfo, PutObjectOutput,
};
