//! Facade over a tenant's Postgres pool: the storage coordinator (C4)
//! calls through here rather than reaching into `bucket`/`object`/
//! `multipart`/`lock` directly, so a single place owns "what executor do
//! I run this against".

use crate::types::{
    Bucket, ListObjectsV2Page, ListObjectsV2Query, LockMode, MultipartUploadRow, Object, PartRow,
    SortBy,
};
use crate::{bucket, lock, multipart, object};
use gateway_common::types::BucketType;
use gateway_common::Error;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};

pub struct MetaStore {
    pool: PgPool,
}

impl MetaStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, Error> {
        self.pool.begin().await.map_err(crate::error::map_sqlx_error)
    }

    // ---- Buckets ----

    #[allow(clippy::too_many_arguments)]
    pub async fn create_bucket(
        &self,
        id: &str,
        name: &str,
        public: bool,
        owner: Option<&str>,
        file_size_limit: Option<i64>,
        allowed_mime_types: Option<&[String]>,
        bucket_type: BucketType,
    ) -> Result<Bucket, Error> {
        bucket::create_bucket(
            &self.pool,
            id,
            name,
            public,
            owner,
            file_size_limit,
            allowed_mime_types,
            bucket_type,
        )
        .await
    }

    pub async fn get_bucket(&self, name: &str) -> Result<Option<Bucket>, Error> {
        bucket::get_bucket(&self.pool, name).await
    }

    pub async fn list_buckets(&self) -> Result<Vec<Bucket>, Error> {
        bucket::list_buckets(&self.pool).await
    }

    pub async fn delete_bucket(&self, name: &str) -> Result<(), Error> {
        bucket::delete_bucket(&self.pool, name).await
    }

    pub async fn update_bucket(
        &self,
        name: &str,
        public: bool,
        file_size_limit: Option<i64>,
        allowed_mime_types: Option<&[String]>,
    ) -> Result<(), Error> {
        bucket::update_bucket(&self.pool, name, public, file_size_limit, allowed_mime_types).await
    }

    // ---- Objects ----

    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_object(
        &self,
        id: &str,
        bucket_id: &str,
        name: &str,
        owner: Option<&str>,
        version: &str,
        metadata: &Value,
        user_metadata: Option<&Value>,
    ) -> Result<Object, Error> {
        object::upsert_object(&self.pool, id, bucket_id, name, owner, version, metadata, user_metadata).await
    }

    pub async fn get_object(&self, bucket_id: &str, name: &str) -> Result<Option<Object>, Error> {
        object::get_object(&self.pool, bucket_id, name).await
    }

    pub async fn delete_object(&self, bucket_id: &str, name: &str) -> Result<Option<Object>, Error> {
        object::delete_object(&self.pool, bucket_id, name).await
    }

    pub async fn list_objects_v2(&self, query: &ListObjectsV2Query<'_>) -> Result<ListObjectsV2Page, Error> {
        object::list_objects_v2(&self.pool, query).await
    }

    pub async fn find_object_locked<'a>(
        &self,
        tx: &mut Transaction<'a, Postgres>,
        bucket_id: &str,
        name: &str,
        mode: LockMode,
        no_wait: bool,
    ) -> Result<Option<Object>, Error> {
        object::get_object_locked(&mut **tx, bucket_id, name, mode, no_wait).await
    }

    pub async fn search_objects(
        &self,
        bucket_id: &str,
        prefix: &str,
        offset: i64,
        limit: i64,
        sort_by: SortBy,
    ) -> Result<Vec<Object>, Error> {
        object::search_objects(&self.pool, bucket_id, prefix, offset, limit, sort_by).await
    }

    // ---- Multipart uploads ----

    #[allow(clippy::too_many_arguments)]
    pub async fn create_multipart_upload(
        &self,
        id: &str,
        bucket_id: &str,
        key: &str,
        version: &str,
        backend_upload_id: &str,
        owner: Option<&str>,
        user_metadata: Option<&Value>,
    ) -> Result<MultipartUploadRow, Error> {
        multipart::create_multipart_upload(
            &self.pool,
            id,
            bucket_id,
            key,
            version,
            backend_upload_id,
            owner,
            user_metadata,
        )
        .await
    }

    pub async fn get_multipart_upload(&self, id: &str) -> Result<Option<MultipartUploadRow>, Error> {
        multipart::get_multipart_upload(&self.pool, id).await
    }

    pub async fn list_multipart_uploads(
        &self,
        bucket_id: &str,
        max_uploads: i64,
    ) -> Result<Vec<MultipartUploadRow>, Error> {
        multipart::list_multipart_uploads(&self.pool, bucket_id, max_uploads).await
    }

    pub async fn list_parts(&self, upload_id: &str) -> Result<Vec<PartRow>, Error> {
        multipart::list_parts(&self.pool, upload_id).await
    }

    /// Runs lock acquisition, part bookkeeping, and signature rotation in
    /// one transaction so a concurrent `uploadPart` on the same upload
    /// either waits or observes the rotated signature.
    pub async fn record_part_locked(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        etag: &str,
        size: i64,
        new_upload_signature: &str,
    ) -> Result<(), Error> {
        let mut tx = self.begin().await?;
        lock::must_lock_object(&mut tx, bucket, key, None).await?;
        multipart::record_part(&mut tx, upload_id, part_number, etag, size, new_upload_signature).await?;
        tx.commit().await.map_err(crate::error::map_sqlx_error)?;
        Ok(())
    }

    pub async fn complete_multipart_upload(
        &self,
        id: &str,
        bucket_id: &str,
        key: &str,
        owner: Option<&str>,
        metadata: &Value,
        user_metadata: Option<&Value>,
    ) -> Result<Object, Error> {
        let upload = multipart::get_multipart_upload(&self.pool, id)
            .await?
            .ok_or_else(|| Error::NoSuchUpload(id.to_string()))?;

        let mut tx = self.begin().await?;
        lock::must_lock_object(&mut tx, bucket_id, key, None).await?;
        let object = object::upsert_object(
            &mut *tx,
            &gateway_common::ObjectId::new().to_string(),
            bucket_id,
            key,
            owner,
            &upload.version,
            metadata,
            user_metadata,
        )
        .await?;
        multipart::delete_multipart_upload(&mut tx, id).await?;
        tx.commit().await.map_err(crate::error::map_sqlx_error)?;
        Ok(object)
    }

    pub async fn abort_multipart_upload(&self, id: &str) -> Result<(), Error> {
        let mut tx = self.begin().await?;
        multipart::delete_multipart_upload(&mut tx, id).await?;
        tx.commit().await.map_err(crate::error::map_sqlx_error)?;
        Ok(())
    }

    // ---- Locking ----

    pub async fn must_lock_object<'a>(
        &self,
        tx: &mut Transaction<'a, Postgres>,
        bucket: &str,
        object: &str,
        version: Option<&str>,
    ) -> Result<(), Error> {
        lock::must_lock_object(tx, bucket, object, version).await
    }

    pub async fn wait_object_lock<'a>(
        &self,
        tx: &mut Transaction<'a, Postgres>,
        bucket: &str,
        object: &str,
        version: Option<&str>,
        timeout_ms: u64,
    ) -> Result<(), Error> {
        lock::wait_object_lock(tx, bucket, object, version, timeout_ms).await
    }
}
