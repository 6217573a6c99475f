//! The gateway-wide error taxonomy (§7).
//!
//! Every crate in the workspace converts its own errors into this type at
//! its public boundary; `gateway-s3` is the translation point that turns it
//! into an XML response, `gateway-rest` the one that turns it into JSON.

use crate::types::{BucketNameError, ObjectKeyError, VersionError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the gateway core.
#[derive(Debug, Error)]
pub enum Error {
    // ---- NotFound ----
    #[error("no such bucket: {0}")]
    NoSuchBucket(String),

    #[error("no such key: {bucket}/{key}")]
    NoSuchKey { bucket: String, key: String },

    #[error("no such upload: {0}")]
    NoSuchUpload(String),

    #[error("version not found")]
    VersionNotFound,

    // ---- AlreadyExists ----
    #[error("bucket already exists: {0}")]
    BucketAlreadyExists(String),

    #[error("resource already exists: {0}")]
    ResourceAlreadyExists(String),

    // ---- Validation ----
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid bucket name: {0}")]
    InvalidBucketName(#[from] BucketNameError),

    #[error("invalid key: {0}")]
    InvalidKey(#[from] ObjectKeyError),

    #[error("invalid version: {0}")]
    InvalidVersion(#[from] VersionError),

    #[error("invalid JWT: {0}")]
    InvalidJwt(String),

    #[error("signature mismatch")]
    InvalidSignature,

    #[error("request signature expired")]
    ExpiredSignature,

    // ---- Permission ----
    #[error("access denied")]
    AccessDenied,

    #[error("forbidden: {0}")]
    Forbidden(String),

    // ---- Resource (locking) ----
    #[error("resource locked: {0}")]
    ResourceLocked(String),

    #[error("lock wait timed out: {0}")]
    LockTimeout(String),

    #[error("upload offset mismatch: expected {expected}, got {actual}")]
    OffsetMismatch { expected: u64, actual: u64 },

    // ---- Backpressure ----
    #[error("slow down")]
    SlowDown,

    #[error("database timeout")]
    DatabaseTimeout,

    // ---- Size/Payload ----
    #[error("payload too large: max {max_size} bytes")]
    PayloadTooLarge { max_size: u64 },

    // ---- Feature ----
    #[error("feature not enabled: {0}")]
    FeatureNotEnabled(String),

    // ---- External ----
    #[error("upstream storage error: {0}")]
    S3Error(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    #[error("database unavailable for tenant: {0}")]
    DatabaseUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    #[must_use]
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Whether a caller may usefully retry this error after a backoff.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SlowDown | Self::DatabaseTimeout | Self::LockTimeout(_)
        )
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NoSuchBucket(_) | Self::NoSuchKey { .. } | Self::NoSuchUpload(_) | Self::VersionNotFound
        )
    }

    /// HTTP status code per the §7 table.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::NoSuchBucket(_)
            | Self::NoSuchKey { .. }
            | Self::NoSuchUpload(_)
            | Self::VersionNotFound => 404,

            Self::BucketAlreadyExists(_) | Self::ResourceAlreadyExists(_) => 409,

            Self::InvalidParameter(_)
            | Self::InvalidBucketName(_)
            | Self::InvalidKey(_)
            | Self::InvalidVersion(_)
            | Self::InvalidJwt(_)
            | Self::InvalidSignature
            | Self::ExpiredSignature
            | Self::FeatureNotEnabled(_) => 400,

            Self::AccessDenied | Self::Forbidden(_) => 403,

            Self::ResourceLocked(_) | Self::OffsetMismatch { .. } => 409,
            Self::LockTimeout(_) => 423,

            Self::SlowDown | Self::DatabaseTimeout => 429,

            Self::PayloadTooLarge { .. } => 413,

            Self::S3Error(_) | Self::DatabaseError(_) | Self::Internal(_) => 500,
            Self::TenantNotFound(_) | Self::DatabaseUnavailable(_) => 503,
        }
    }

    /// Error code for the native JSON surface (§6, §7) — the same taxonomy
    /// as [`Self::s3_error_code`], spelled the way the native handlers'
    /// JSON bodies name it rather than the S3 XML convention.
    #[must_use]
    pub fn native_error_code(&self) -> &'static str {
        match self {
            Self::NoSuchKey { .. } => "NoSuchKey",
            Self::ResourceAlreadyExists(_) => "KeyAlreadyExists",
            other => other.s3_error_code(),
        }
    }

    /// S3 error code for XML responses (§4.5, §7).
    #[must_use]
    pub fn s3_error_code(&self) -> &'static str {
        match self {
            Self::NoSuchBucket(_) => "NoSuchBucket",
            Self::NoSuchKey { .. } => "NoSuchKey",
            Self::NoSuchUpload(_) => "NoSuchUpload",
            Self::VersionNotFound => "NoSuchVersion",
            Self::BucketAlreadyExists(_) => "BucketAlreadyExists",
            Self::ResourceAlreadyExists(_) => "ResourceAlreadyExists",
            Self::InvalidParameter(_) => "InvalidArgument",
            Self::InvalidBucketName(_) => "InvalidBucketName",
            Self::InvalidKey(_) => "InvalidKey",
            Self::InvalidVersion(_) => "InvalidArgument",
            Self::InvalidJwt(_) => "InvalidJWT",
            Self::InvalidSignature => "SignatureDoesNotMatch",
            Self::ExpiredSignature => "ExpiredSignature",
            Self::AccessDenied | Self::Forbidden(_) => "AccessDenied",
            Self::ResourceLocked(_) => "ResourceLocked",
            Self::OffsetMismatch { .. } => "ConflictingUploadOffset",
            Self::LockTimeout(_) => "LockTimeout",
            Self::SlowDown | Self::DatabaseTimeout => "SlowDown",
            Self::PayloadTooLarge { .. } => "EntityTooLarge",
            Self::FeatureNotEnabled(_) => "FeatureNotEnabled",
            Self::S3Error(_) | Self::DatabaseError(_) | Self::Internal(_) => "InternalError",
            Self::TenantNotFound(_) | Self::DatabaseUnavailable(_) => "ServiceUnavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(Error::SlowDown.is_retryable());
        assert!(Error::DatabaseTimeout.is_retryable());
        assert!(!Error::AccessDenied.is_retryable());
    }

    #[test]
    fn not_found_classification() {
        assert!(Error::NoSuchBucket("b".into()).is_not_found());
        assert!(Error::NoSuchKey {
            bucket: "b".into(),
            key: "k".into()
        }
        .is_not_found());
        assert!(!Error::AccessDenied.is_not_found());
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(Error::AccessDenied.http_status_code(), 403);
        assert_eq!(Error::NoSuchBucket("b".into()).http_status_code(), 404);
        assert_eq!(Error::PayloadTooLarge { max_size: 10 }.http_status_code(), 413);
        assert_eq!(Error::ResourceLocked("x".into()).http_status_code(), 409);
        assert_eq!(Error::LockTimeout("x".into()).http_status_code(), 423);
    }

    #[test]
    fn s3_error_codes() {
        assert_eq!(Error::NoSuchBucket("b".into()).s3_error_code(), "NoSuchBucket");
        assert_eq!(Error::SlowDown.s3_error_code(), "SlowDown");
    }
}
