//! Value types shared by every [`crate::BlobBackend`] implementation.

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// An inclusive byte range, as parsed from an HTTP `Range: bytes=a-b` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    #[must_use]
    pub fn to_http_range_header(self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

/// Preconditions for a conditional GET/HEAD (§4.2 "conditional GET/304 handling").
#[derive(Debug, Clone, Default)]
pub struct ConditionalGet {
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<DateTime<Utc>>,
    pub range: Option<ByteRange>,
}

impl ConditionalGet {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// True when `meta` satisfies the preconditions and a body (or 304/416)
    /// doesn't need to be computed specially. Returns `Some(reason)` when the
    /// request should short-circuit.
    #[must_use]
    pub fn short_circuit(&self, meta: &ObjectMeta) -> Option<ConditionalOutcome> {
        if let Some(etag) = &self.if_none_match {
            if etag == "*" || etag.trim_matches('"') == meta.etag.trim_matches('"') {
                return Some(ConditionalOutcome::NotModified);
            }
        }
        if let Some(since) = self.if_modified_since {
            if meta.last_modified <= since {
                return Some(ConditionalOutcome::NotModified);
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalOutcome {
    NotModified,
}

/// Metadata about a stored blob, independent of the backend.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub size: u64,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
}

/// Result of a successful GET.
pub struct GetObjectOutput {
    pub meta: ObjectMeta,
    pub body: Bytes,
}

/// Result of a successful PUT or completed multipart upload.
#[derive(Debug, Clone)]
pub struct PutObjectOutput {
    pub etag: String,
    pub size: u64,
}

/// One uploaded part, as returned by `UploadPart` / `UploadPartCopy` and
/// enumerated by `ListParts`.
#[derive(Debug, Clone)]
pub struct PartInfo {
    pub part_number: u16,
    pub etag: String,
    pub size: u64,
}

/// A part reference supplied to `CompleteMultipartUpload`.
#[derive(Debug, Clone)]
pub struct CompletedPart {
    pub part_number: u16,
    pub etag: String,
}
