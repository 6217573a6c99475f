//! The TUS upload coordinator (C7, §4.7): speaks the TUS 1.0
//! offset-extension protocol over the same multipart primitives `gateway-s3`
//! drives for `UploadPart`/`CompleteMultipartUpload` — every chunk PATCH is
//! one part, and a TUS upload is exactly one row in
//! `s3_multipart_uploads`/`s3_parts` until it completes.

use crate::lock::UploadLockRegistry;
use gateway_blob::CompletedPart;
use gateway_common::Error;
use gateway_storage::StorageCoordinator;
use std::sync::Arc;

/// Result of a chunk write: whether this PATCH brought the upload to its
/// declared length (and therefore finalised it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOutcome {
    pub offset: u64,
    pub completed: bool,
}

pub struct TusCoordinator {
    storage: Arc<StorageCoordinator>,
    locks: UploadLockRegistry,
}

impl TusCoordinator {
    #[must_use]
    pub fn new(storage: Arc<StorageCoordinator>) -> Self {
        Self { storage, locks: UploadLockRegistry::new() }
    }

    /// `POST` (§4.7 "Size cap" + "Completion" precursor): creates the
    /// backing multipart upload and returns the row id the client will use
    /// as the `version` segment of its upload id for every subsequent
    /// `PATCH`/`HEAD`. The effective cap is
    /// `min(bucket.file_size_limit ?? tenant.global, tenant.global)`, the
    /// same computation `put_object` uses; a declared `Upload-Length` over
    /// it is rejected at creation time rather than partway through the
    /// upload.
    pub async fn create_upload(
        &self,
        bucket: &str,
        object: &str,
        declared_length: Option<u64>,
        tenant_file_size_limit: Option<u64>,
        content_type: Option<&str>,
    ) -> Result<String, Error> {
        if let Some(length) = declared_length {
            let bucket_row = self
                .storage
                .meta()
                .get_bucket(bucket)
                .await?
                .ok_or_else(|| Error::NoSuchBucket(bucket.to_string()))?;
            let cap = gateway_storage::limits::effective_size_limit(
                bucket_row.file_size_limit.map(|v| v.max(0) as u64),
                tenant_file_size_limit,
                self.storage.global_file_size_limit(),
            );
            gateway_storage::limits::check_size(length, cap)?;
        }

        let (_backend_upload_id, row) = self.storage.create_multipart_upload(bucket, object, content_type, None, None).await?;
        Ok(row.id)
    }

    /// `PATCH`: writes one chunk at `offset`, which must match the
    /// upload's current progress exactly (TUS requires the client send
    /// the offset it believes is current; a mismatch means the client
    /// and server have diverged and must not proceed silently).
    pub async fn patch(&self, upload_id: &str, offset: u64, chunk: bytes::Bytes, declared_length: Option<u64>) -> Result<PatchOutcome, Error> {
        let mutex = self.locks.mutex_for(upload_id);
        let _guard = mutex.lock().await;

        let upload = self.storage.get_multipart_upload(upload_id).await?;
        let current_offset = upload.in_progress_size as u64;
        if offset != current_offset {
            return Err(Error::OffsetMismatch { expected: current_offset, actual: offset });
        }

        let mut new_offset = offset;
        if !chunk.is_empty() {
            let bucket = self.storage.bucket_by_id(&upload.bucket_id).await?;
            let part_number = self.storage.list_parts(upload_id).await?.len() as i32 + 1;
            let blob_key = self.storage.object_blob_key(&bucket.name, &upload.key, &upload.version);
            let part = self
                .storage
                .blob()
                .upload_part(&blob_key, &upload.backend_upload_id, part_number as u16, chunk.clone())
                .await
                .map_err(Error::from)?;
            let new_signature = uuid::Uuid::new_v4().to_string();
            self.storage
                .meta()
                .record_part_locked(&bucket.name, &upload.key, upload_id, part_number, &part.etag, part.size as i64, &new_signature)
                .await?;
            new_offset = offset + chunk.len() as u64;
        }

        let completed = declared_length.is_some_and(|length| new_offset == length);
        if completed {
            self.finalize(upload_id).await?;
            self.locks.forget(upload_id);
            tracing::debug!(upload_id, "tus upload finalised");
        }

        Ok(PatchOutcome { offset: new_offset, completed })
    }

    /// `HEAD`: current committed offset, for a client resuming after a
    /// disconnect.
    pub async fn offset(&self, upload_id: &str) -> Result<u64, Error> {
        Ok(self.storage.get_multipart_upload(upload_id).await?.in_progress_size as u64)
    }

    /// `DELETE`: abandons an in-flight upload.
    pub async fn abort(&self, upload_id: &str) -> Result<(), Error> {
        let mutex = self.locks.mutex_for(upload_id);
        let _guard = mutex.lock().await;
        self.storage.abort_multipart_upload(upload_id).await?;
        self.locks.forget(upload_id);
        Ok(())
    }

    /// Finalises the backend multipart upload and upserts the object row
    /// (§4.7 "Completion"), same shape as `gateway-s3`'s
    /// `CompleteMultipartUpload` handler.
    async fn finalize(&self, upload_id: &str) -> Result<(), Error> {
        let mut parts = self.storage.list_parts(upload_id).await?;
        parts.sort_by_key(|p| p.part_number);
        let completed: Vec<CompletedPart> =
            parts.into_iter().map(|p| CompletedPart { part_number: p.part_number as u16, etag: p.etag }).collect();
        self.storage.complete_multipart_upload(upload_id, &completed).await?;
        Ok(())
    }
}

// `create_upload`/`patch`/`abort` all resolve the bucket and touch the
// metastore, so (per `StorageCoordinator`'s own test module) they aren't
// unit-testable without a live database; coverage for the cap computation
// lives in `gateway_storage::limits`, and for the offset/locking logic in
// `upload_id.rs`/`lock.rs`.
