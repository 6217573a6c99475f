//! Bucket CRUD (§3, §4.3). Every function accepts an executor so callers
//! can run bucket operations either directly against the pool or inside
//! an already-open transaction (e.g. one holding an object's advisory
//! lock).

use crate::error::map_sqlx_error;
use crate::types::Bucket;
use gateway_common::types::BucketType;
use gateway_common::Error;
use sqlx::{PgExecutor, Row};

fn bucket_type_to_sql(bucket_type: BucketType) -> &'static str {
    match bucket_type {
        BucketType::Standard => "STANDARD",
        BucketType::Analytics => "ANALYTICS",
    }
}

fn bucket_type_from_sql(s: &str) -> BucketType {
    match s {
        "ANALYTICS" => BucketType::Analytics,
        _ => BucketType::Standard,
    }
}

fn row_to_bucket(row: sqlx::postgres::PgRow) -> Result<Bucket, Error> {
    let bucket_type_str: String = row.try_get("bucket_type").map_err(map_sqlx_error)?;
    Ok(Bucket {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        name: row.try_get("name").map_err(map_sqlx_error)?,
        public: row.try_get("public").map_err(map_sqlx_error)?,
        owner: row.try_get("owner").map_err(map_sqlx_error)?,
        file_size_limit: row.try_get("file_size_limit").map_err(map_sqlx_error)?,
        allowed_mime_types: row.try_get("allowed_mime_types").map_err(map_sqlx_error)?,
        bucket_type: bucket_type_from_sql(&bucket_type_str),
        created_at: row.try_get("created_at").map_err(map_sqlx_error)?,
        updated_at: row.try_get("updated_at").map_err(map_sqlx_error)?,
    })
}

pub async fn create_bucket<'e, E>(
    executor: E,
    id: &str,
    name: &str,
    public: bool,
    owner: Option<&str>,
    file_size_limit: Option<i64>,
    allowed_mime_types: Option<&[String]>,
    bucket_type: BucketType,
) -> Result<Bucket, Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        r"
        INSERT INTO buckets (id, name, public, owner, file_size_limit, allowed_mime_types, bucket_type, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, now(), now())
        RETURNING id, name, public, owner, file_size_limit, allowed_mime_types, bucket_type, created_at, updated_at
        ",
    )
    .bind(id)
    .bind(name)
    .bind(public)
    .bind(owner)
    .bind(file_size_limit)
    .bind(allowed_mime_types)
    .bind(bucket_type_to_sql(bucket_type))
    .fetch_one(executor)
    .await
    .map_err(map_sqlx_error)?;

    row_to_bucket(row)
}

pub async fn get_bucket<'e, E>(executor: E, name: &str) -> Result<Option<Bucket>, Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        r"
        SELECT id, name, public, owner, file_size_limit, allowed_mime_types, bucket_type, created_at, updated_at
        FROM buckets WHERE name = $1
        ",
    )
    .bind(name)
    .fetch_optional(executor)
    .await
    .map_err(map_sqlx_error)?;

    row.map(row_to_bucket).transpose()
}

pub async fn list_buckets<'e, E>(executor: E) -> Result<Vec<Bucket>, Error>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, name, public, owner, file_size_limit, allowed_mime_types, bucket_type, created_at, updated_at
        FROM buckets ORDER BY name COLLATE "C" ASC
        "#,
    )
    .fetch_all(executor)
    .await
    .map_err(map_sqlx_error)?;

    rows.into_iter().map(row_to_bucket).collect()
}

pub async fn delete_bucket<'e, E>(executor: E, name: &str) -> Result<(), Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM buckets WHERE name = $1")
        .bind(name)
        .execute(executor)
        .await
        .map_err(map_sqlx_error)?;

    if result.rows_affected() == 0 {
        return Err(Error::NoSuchBucket(name.to_string()));
    }
    Ok(())
}

pub async fn update_bucket_limits<'e, E>(
    executor: E,
    name: &str,
    file_size_limit: Option<i64>,
    allowed_mime_types: Option<&[String]>,
) -> Result<(), Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE buckets SET file_size_limit = $2, allowed_mime_types = $3, updated_at = now() WHERE name = $1",
    )
    .bind(name)
    .bind(file_size_limit)
    .bind(allowed_mime_types)
    .execute(executor)
    .await
    .map_err(map_sqlx_error)?;

    if result.rows_affected() == 0 {
        return Err(Error::NoSuchBucket(name.to_string()));
    }
    Ok(())
}

/// Native REST `PUT /bucket/:id` (§6): `update_bucket_limits` plus the
/// `public` flag, which the S3/TUS surfaces never need to change.
pub async fn update_bucket<'e, E>(
    executor: E,
    name: &str,
    public: bool,
    file_size_limit: Option<i64>,
    allowed_mime_types: Option<&[String]>,
) -> Result<(), Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE buckets SET public = $2, file_size_limit = $3, allowed_mime_types = $4, updated_at = now() WHERE name = $1",
    )
    .bind(name)
    .bind(public)
    .bind(file_size_limit)
    .bind(allowed_mime_types)
    .execute(executor)
    .await
    .map_err(map_sqlx_error)?;

    if result.rows_affected() == 0 {
        return Err(Error::NoSuchBucket(name.to_string()));
    }
    Ok(())
}
