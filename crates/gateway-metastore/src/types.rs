//! Row types for the metadata plane (§3).

use chrono::{DateTime, Utc};
use gateway_common::types::BucketType;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Bucket {
    pub id: String,
    pub name: String,
    pub public: bool,
    pub owner: Option<String>,
    pub file_size_limit: Option<i64>,
    pub allowed_mime_types: Option<Vec<String>>,
    pub bucket_type: BucketType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Object {
    pub id: String,
    pub bucket_id: String,
    pub name: String,
    pub owner: Option<String>,
    pub version: String,
    pub metadata: Value,
    pub user_metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl Object {
    #[must_use]
    pub fn size(&self) -> u64 {
        self.metadata
            .get("size")
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    #[must_use]
    pub fn etag(&self) -> Option<&str> {
        self.metadata.get("eTag").and_then(Value::as_str)
    }

    #[must_use]
    pub fn mimetype(&self) -> Option<&str> {
        self.metadata.get("mimetype").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct MultipartUploadRow {
    pub id: String,
    pub bucket_id: String,
    pub key: String,
    pub version: String,
    /// The blob backend's own multipart upload handle (its `UploadId` for
    /// an S3 backend); opaque to the metastore.
    pub backend_upload_id: String,
    /// Rotates on every `UploadPart`; lets a racing writer on a stale
    /// value detect it lost the race without needing the backend id.
    pub upload_signature: String,
    pub in_progress_size: i64,
    pub owner: Option<String>,
    pub user_metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PartRow {
    pub upload_id: String,
    pub part_number: i32,
    pub etag: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
}

/// Delimiter-aware listing result (§4.3 "list v2 with delimiter").
#[derive(Debug, Clone, Default)]
pub struct ListObjectsV2Page {
    pub objects: Vec<Object>,
    pub common_prefixes: Vec<String>,
    pub next_continuation_token: Option<String>,
}

/// Parameters for `listObjectsV2`/search.
#[derive(Debug, Clone)]
pub struct ListObjectsV2Query<'a> {
    pub bucket_id: &'a str,
    pub prefix: &'a str,
    pub delimiter: Option<&'a str>,
    pub start_after: Option<&'a str>,
    pub continuation_token: Option<&'a str>,
    pub max_keys: i64,
    pub sort_by: SortBy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Name,
    CreatedAt,
    UpdatedAt,
}

/// Row lock modifier for `findObject` (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    #[default]
    None,
    ForUpdate,
    ForShare,
    ForKeyShare,
}

impl LockMode {
    #[must_use]
    pub fn as_sql_suffix(self, no_wait: bool) -> &'static str {
        match (self, no_wait) {
            (Self::None, _) => "",
            (Self::ForUpdate, false) => " FOR UPDATE",
            (Self::ForUpdate, true) => " FOR UPDATE NOWAIT",
            (Self::ForShare, false) => " FOR SHARE",
            (Self::ForShare, true) => " FOR SHARE NOWAIT",
            (Self::ForKeyShare, false) => " FOR KEY SHARE",
            (Self::ForKeyShare, true) => " FOR KEY SHARE NOWAIT",
        }
    }
}

/// One illustrative tenant feature-flag set carried alongside an object
/// row for callers that need it without a second round trip.
pub type FeatureFlags = HashMap<String, bool>;
