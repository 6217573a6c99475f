//! Authentication error types

use thiserror::Error;

/// Authentication and authorization errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingAuthHeader,

    #[error("invalid authorization header format")]
    InvalidAuthHeader,

    #[error("invalid signature version: expected AWS4-HMAC-SHA256")]
    InvalidSignatureVersion,

    #[error("access key not found: {0}")]
    AccessKeyNotFound(String),

    #[error("access key is inactive")]
    AccessKeyInactive,

    #[error("tenant is suspended")]
    TenantSuspended,

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("request has expired")]
    RequestExpired,

    #[error("missing required signed header: {0}")]
    MissingSignedHeader(String),

    #[error("invalid date format")]
    InvalidDateFormat,

    #[error("missing x-amz-date or date header")]
    MissingDateHeader,

    #[error("malformed streaming chunk framing")]
    MalformedChunk,

    #[error("streaming chunk signature mismatch")]
    ChunkSignatureMismatch,

    #[error("declared chunk length does not match decoded body")]
    ChunkLengthMismatch,

    #[error("missing bearer token")]
    MissingBearerToken,

    #[error("invalid JWT: {0}")]
    InvalidJwt(String),

    #[error("access denied")]
    AccessDenied,

    #[error("access key already exists: {0}")]
    AccessKeyAlreadyExists(String),

    #[error("internal error: {0}")]
    Internal(String),
}
