//! Multipart upload and part bookkeeping (§3).

use crate::error::map_sqlx_error;
use crate::types::{MultipartUploadRow, PartRow};
use gateway_common::Error;
use serde_json::Value;
use sqlx::{PgExecutor, Row};

fn row_to_upload(row: sqlx::postgres::PgRow) -> Result<MultipartUploadRow, Error> {
    Ok(MultipartUploadRow {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        bucket_id: row.try_get("bucket_id").map_err(map_sqlx_error)?,
        key: row.try_get("key").map_err(map_sqlx_error)?,
        version: row.try_get("version").map_err(map_sqlx_error)?,
        backend_upload_id: row.try_get("backend_upload_id").map_err(map_sqlx_error)?,
        upload_signature: row.try_get("upload_signature").map_err(map_sqlx_error)?,
        in_progress_size: row.try_get("in_progress_size").map_err(map_sqlx_error)?,
        owner: row.try_get("owner").map_err(map_sqlx_error)?,
        user_metadata: row.try_get("user_metadata").map_err(map_sqlx_error)?,
        created_at: row.try_get("created_at").map_err(map_sqlx_error)?,
    })
}

fn row_to_part(row: sqlx::postgres::PgRow) -> Result<PartRow, Error> {
    Ok(PartRow {
        upload_id: row.try_get("upload_id").map_err(map_sqlx_error)?,
        part_number: row.try_get("part_number").map_err(map_sqlx_error)?,
        etag: row.try_get("etag").map_err(map_sqlx_error)?,
        size: row.try_get("size").map_err(map_sqlx_error)?,
        created_at: row.try_get("created_at").map_err(map_sqlx_error)?,
    })
}

#[allow(clippy::too_many_arguments)]
pub async fn create_multipart_upload<'e, E>(
    executor: E,
    id: &str,
    bucket_id: &str,
    key: &str,
    version: &str,
    backend_upload_id: &str,
    owner: Option<&str>,
    user_metadata: Option<&Value>,
) -> Result<MultipartUploadRow, Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        r"
        INSERT INTO s3_multipart_uploads (id, bucket_id, key, version, backend_upload_id, upload_signature, in_progress_size, owner, user_metadata, created_at)
        VALUES ($1, $2, $3, $4, $5, $5, 0, $6, $7, now())
        RETURNING id, bucket_id, key, version, backend_upload_id, upload_signature, in_progress_size, owner, user_metadata, created_at
        ",
    )
    .bind(id)
    .bind(bucket_id)
    .bind(key)
    .bind(version)
    .bind(backend_upload_id)
    .bind(owner)
    .bind(user_metadata)
    .fetch_one(executor)
    .await
    .map_err(map_sqlx_error)?;

    row_to_upload(row)
}

pub async fn get_multipart_upload<'e, E>(executor: E, id: &str) -> Result<Option<MultipartUploadRow>, Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        r"
        SELECT id, bucket_id, key, version, backend_upload_id, upload_signature, in_progress_size, owner, user_metadata, created_at
        FROM s3_multipart_uploads WHERE id = $1
        ",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
    .map_err(map_sqlx_error)?;

    row.map(row_to_upload).transpose()
}

/// Records an uploaded part and rotates `upload_signature` so a
/// concurrent writer racing on the same `UploadId` is detectable: the
/// next `uploadPart` call from a stale signature fails the optimistic
/// check the caller performs before this write.
pub async fn record_part(
    conn: &mut sqlx::PgConnection,
    upload_id: &str,
    part_number: i32,
    etag: &str,
    size: i64,
    new_upload_signature: &str,
) -> Result<(), Error> {
    sqlx::query(
        r"
        INSERT INTO s3_parts (upload_id, part_number, etag, size, created_at)
        VALUES ($1, $2, $3, $4, now())
        ON CONFLICT (upload_id, part_number) DO UPDATE SET etag = EXCLUDED.etag, size = EXCLUDED.size, created_at = now()
        ",
    )
    .bind(upload_id)
    .bind(part_number)
    .bind(etag)
    .bind(size)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    sqlx::query(
        "UPDATE s3_multipart_uploads SET in_progress_size = in_progress_size + $2, upload_signature = $3 WHERE id = $1",
    )
    .bind(upload_id)
    .bind(size)
    .bind(new_upload_signature)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    Ok(())
}

pub async fn list_parts<'e, E>(executor: E, upload_id: &str) -> Result<Vec<PartRow>, Error>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        "SELECT upload_id, part_number, etag, size, created_at FROM s3_parts WHERE upload_id = $1 ORDER BY part_number ASC",
    )
    .bind(upload_id)
    .fetch_all(executor)
    .await
    .map_err(map_sqlx_error)?;

    rows.into_iter().map(row_to_part).collect()
}

/// Completion deletes the upload and its parts rows; the caller is
/// responsible for upserting the finished object beforehand in the same
/// transaction.
pub async fn delete_multipart_upload(conn: &mut sqlx::PgConnection, id: &str) -> Result<(), Error> {
    sqlx::query("DELETE FROM s3_parts WHERE upload_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

    let result = sqlx::query("DELETE FROM s3_multipart_uploads WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

    if result.rows_affected() == 0 {
        return Err(Error::NoSuchUpload(id.to_string()));
    }
    Ok(())
}

/// Backs `ListMultipartUploads` (§4.5); ordered by key then id to give a
/// stable pagination cursor across calls.
pub async fn list_multipart_uploads<'e, E>(
    executor: E,
    bucket_id: &str,
    max_uploads: i64,
) -> Result<Vec<MultipartUploadRow>, Error>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        r"
        SELECT id, bucket_id, key, version, backend_upload_id, upload_signature, in_progress_size, owner, user_metadata, created_at
        FROM s3_multipart_uploads WHERE bucket_id = $1 ORDER BY key ASC, id ASC LIMIT $2
        ",
    )
    .bind(bucket_id)
    .bind(max_uploads)
    .fetch_all(executor)
    .await
    .map_err(map_sqlx_error)?;

    rows.into_iter().map(row_to_upload).collect()
}
