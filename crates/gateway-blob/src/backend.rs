//! The `BlobBackend` trait (C2): the narrow capability set the storage
//! coordinator (C4) needs from whatever holds object bytes. Every method
//! takes a flat string key already laid out as
//! `<tenant>/<bucket>/<object>/<version>` (§6) — this layer has no notion
//! of tenants, buckets, or versions, only keys and bytes.

use crate::error::BlobError;
use crate::types::{
    ByteRange, CompletedPart, ConditionalGet, GetObjectOutput, ObjectMeta, PartInfo,
    PutObjectOutput,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Fetch metadata without the body (S3 `HeadObject`).
    async fn head(&self, key: &str) -> Result<ObjectMeta, BlobError>;

    /// Fetch an object, honoring range and conditional-get preconditions.
    async fn get(&self, key: &str, conditional: &ConditionalGet) -> Result<GetObjectOutput, BlobError>;

    /// Single-shot upload.
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<PutObjectOutput, BlobError>;

    /// Server-side copy between two keys in the same backend.
    async fn copy(&self, source_key: &str, dest_key: &str) -> Result<PutObjectOutput, BlobError>;

    async fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Batch delete; backends that lack a native bulk API fall back to
    /// sequential deletes. Best-effort: individual failures are logged, not
    /// propagated, matching the "no-orphan-rows" compensating-delete model
    /// at the storage-coordinator layer rather than transactional delete
    /// here.
    async fn delete_many(&self, keys: &[String]);

    // ---- Multipart primitives (§4.4 "S3 protocol handler") ----

    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String, BlobError>;

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u16,
        body: Bytes,
    ) -> Result<PartInfo, BlobError>;

    async fn upload_part_copy(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u16,
        source_key: &str,
        range: Option<ByteRange>,
    ) -> Result<PartInfo, BlobError>;

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<PutObjectOutput, BlobError>;

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<(), BlobError>;

    async fn list_parts(&self, key: &str, upload_id: &str) -> Result<Vec<PartInfo>, BlobError>;

    /// A time-limited URL a client can fetch directly, bypassing the
    /// gateway (§6 `SIGNED_URL_UPLOAD_EXPIRATION_SEC` /
    /// `UPLOAD_SIGNED_URL_EXPIRATION_SEC`). Backends that can't produce one
    /// (e.g. the local filesystem backend outside of tests) return
    /// [`BlobError::Unavailable`].
    async fn private_asset_url(&self, key: &str, expires_in: Duration) -> Result<String, BlobError>;
}
