//! C7: the TUS 1.0 resumable-upload coordinator. Speaks the offset
//! extension over the same multipart primitives `gateway-s3` drives, so a
//! TUS upload and an S3 multipart upload are interchangeable in storage —
//! only the wire protocol in front differs.

pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod lock;
pub mod metadata;
pub mod router;
pub mod upload_id;

pub use coordinator::{PatchOutcome, TusCoordinator};
pub use error::TusError;
pub use lock::UploadLockRegistry;
pub use router::tus_router;
pub use upload_id::UploadId;

/// The only TUS protocol version this gateway speaks.
pub const TUS_VERSION: &str = "1.0.0";
