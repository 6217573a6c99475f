//! Object metadata operations (§3, §4.3): upsert, lookup, delete, and
//! delimiter-aware listing.

use crate::error::map_sqlx_error;
use crate::types::{ListObjectsV2Page, ListObjectsV2Query, LockMode, Object, SortBy};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use gateway_common::Error;
use serde_json::Value;
use sqlx::{PgExecutor, Row};

fn row_to_object(row: sqlx::postgres::PgRow) -> Result<Object, Error> {
    Ok(Object {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        bucket_id: row.try_get("bucket_id").map_err(map_sqlx_error)?,
        name: row.try_get("name").map_err(map_sqlx_error)?,
        owner: row.try_get("owner").map_err(map_sqlx_error)?,
        version: row.try_get("version").map_err(map_sqlx_error)?,
        metadata: row.try_get("metadata").map_err(map_sqlx_error)?,
        user_metadata: row.try_get("user_metadata").map_err(map_sqlx_error)?,
        created_at: row.try_get("created_at").map_err(map_sqlx_error)?,
        updated_at: row.try_get("updated_at").map_err(map_sqlx_error)?,
        last_accessed_at: row.try_get("last_accessed_at").map_err(map_sqlx_error)?,
    })
}

/// Create-or-replace: the caller already holds the `(bucket, object)`
/// advisory lock, so this is a plain upsert keyed on the
/// `(bucket_id, name)` uniqueness invariant rather than a
/// compare-and-swap.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_object<'e, E>(
    executor: E,
    id: &str,
    bucket_id: &str,
    name: &str,
    owner: Option<&str>,
    version: &str,
    metadata: &Value,
    user_metadata: Option<&Value>,
) -> Result<Object, Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        r"
        INSERT INTO objects (id, bucket_id, name, owner, version, metadata, user_metadata, created_at, updated_at, last_accessed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, now(), now(), now())
        ON CONFLICT (bucket_id, name) DO UPDATE SET
            owner = EXCLUDED.owner,
            version = EXCLUDED.version,
            metadata = EXCLUDED.metadata,
            user_metadata = EXCLUDED.user_metadata,
            updated_at = now(),
            last_accessed_at = now()
        RETURNING id, bucket_id, name, owner, version, metadata, user_metadata, created_at, updated_at, last_accessed_at
        ",
    )
    .bind(id)
    .bind(bucket_id)
    .bind(name)
    .bind(owner)
    .bind(version)
    .bind(metadata)
    .bind(user_metadata)
    .fetch_one(executor)
    .await
    .map_err(map_sqlx_error)?;

    row_to_object(row)
}

pub async fn get_object<'e, E>(executor: E, bucket_id: &str, name: &str) -> Result<Option<Object>, Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        r"
        SELECT id, bucket_id, name, owner, version, metadata, user_metadata, created_at, updated_at, last_accessed_at
        FROM objects WHERE bucket_id = $1 AND name = $2
        ",
    )
    .bind(bucket_id)
    .bind(name)
    .fetch_optional(executor)
    .await
    .map_err(map_sqlx_error)?;

    row.map(row_to_object).transpose()
}

pub async fn delete_object<'e, E>(executor: E, bucket_id: &str, name: &str) -> Result<Option<Object>, Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        r"
        DELETE FROM objects WHERE bucket_id = $1 AND name = $2
        RETURNING id, bucket_id, name, owner, version, metadata, user_metadata, created_at, updated_at, last_accessed_at
        ",
    )
    .bind(bucket_id)
    .bind(name)
    .fetch_optional(executor)
    .await
    .map_err(map_sqlx_error)?;

    row.map(row_to_object).transpose()
}

/// `findObject` with a row lock modifier (§4.4). Only meaningful inside an
/// open transaction; `LockMode::None` behaves exactly like [`get_object`].
pub async fn get_object_locked<'e, E>(
    executor: E,
    bucket_id: &str,
    name: &str,
    mode: LockMode,
    no_wait: bool,
) -> Result<Option<Object>, Error>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        r"
        SELECT id, bucket_id, name, owner, version, metadata, user_metadata, created_at, updated_at, last_accessed_at
        FROM objects WHERE bucket_id = $1 AND name = $2{}
        ",
        mode.as_sql_suffix(no_wait)
    );

    let row = sqlx::query(&sql)
        .bind(bucket_id)
        .bind(name)
        .fetch_optional(executor)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("55P03") => {
                Error::ResourceLocked(format!("{bucket_id}/{name}"))
            }
            _ => map_sqlx_error(e),
        })?;

    row.map(row_to_object).transpose()
}

pub async fn touch_last_accessed<'e, E>(executor: E, bucket_id: &str, name: &str) -> Result<(), Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query("UPDATE objects SET last_accessed_at = now() WHERE bucket_id = $1 AND name = $2")
        .bind(bucket_id)
        .bind(name)
        .execute(executor)
        .await
        .map_err(map_sqlx_error)?;
    Ok(())
}

/// Encodes a continuation token for a timestamp sort: base64 of
/// `"<rfc3339 timestamp>|<name>"`, opaque to callers. Name-sorted listings
/// keep using the bare name as their token (§4.3) — only the timestamp
/// sorts need a tuple, since only they need a tie-break past the column
/// `ORDER BY` actually sorts on.
fn encode_timestamp_cursor(timestamp: DateTime<Utc>, name: &str) -> String {
    BASE64.encode(format!("{}|{name}", timestamp.to_rfc3339()))
}

fn decode_timestamp_cursor(token: &str) -> Result<(DateTime<Utc>, String), Error> {
    let decoded = BASE64.decode(token).map_err(|_| Error::invalid_parameter("malformed continuation token"))?;
    let decoded = String::from_utf8(decoded).map_err(|_| Error::invalid_parameter("malformed continuation token"))?;
    let (ts, name) = decoded.split_once('|').ok_or_else(|| Error::invalid_parameter("malformed continuation token"))?;
    let timestamp = DateTime::parse_from_rfc3339(ts)
        .map_err(|_| Error::invalid_parameter("malformed continuation token"))?
        .with_timezone(&Utc);
    Ok((timestamp, name.to_string()))
}

/// Delimiter-aware `ListObjectsV2` (§4.3). `delimiter = "/"` collapses
/// everything past the first occurrence after `prefix` into a common
/// prefix; results are sorted `name COLLATE "C"` for byte-wise
/// determinism. Name-sorted pages paginate by continuation token = last
/// returned name; timestamp-sorted pages paginate by a `(timestamp, name)`
/// tuple token, since filtering by name alone while ordering by timestamp
/// would skip or repeat rows across pages. `start_after` only applies on
/// the first page (no continuation token supplied yet) and is always a
/// bare name, matching the S3 API regardless of sort mode.
pub async fn list_objects_v2<'e, E>(
    executor: E,
    query: &ListObjectsV2Query<'_>,
) -> Result<ListObjectsV2Page, Error>
where
    E: PgExecutor<'e>,
{
    let like_pattern = format!("{}%", query.prefix.replace('%', "\\%").replace('_', "\\_"));
    let limit = query.max_keys + 1;

    let rows = match query.sort_by {
        SortBy::Name => {
            let cursor = query.continuation_token.or(query.start_after);
            let sql = r#"
                SELECT id, bucket_id, name, owner, version, metadata, user_metadata, created_at, updated_at, last_accessed_at
                FROM objects
                WHERE bucket_id = $1
                  AND name LIKE $2
                  AND ($3::text IS NULL OR name COLLATE "C" > $3)
                ORDER BY name COLLATE "C" ASC
                LIMIT $4
            "#;
            sqlx::query(sql).bind(query.bucket_id).bind(like_pattern).bind(cursor).bind(limit).fetch_all(executor).await
        }
        SortBy::CreatedAt | SortBy::UpdatedAt => {
            let order_column = if query.sort_by == SortBy::CreatedAt { "created_at" } else { "updated_at" };
            let (cursor_ts, cursor_name) = match query.continuation_token {
                Some(token) => {
                    let (ts, name) = decode_timestamp_cursor(token)?;
                    (Some(ts), Some(name))
                }
                None => (None, query.start_after.map(str::to_string)),
            };
            // Three cursor states: no cursor (first page), a bare `start_after`
            // name (first page, no timestamp to anchor on), or a decoded
            // `(timestamp, name)` continuation token (subsequent pages).
            let sql = format!(
                r#"
                SELECT id, bucket_id, name, owner, version, metadata, user_metadata, created_at, updated_at, last_accessed_at
                FROM objects
                WHERE bucket_id = $1
                  AND name LIKE $2
                  AND (
                    ($3::timestamptz IS NULL AND $4::text IS NULL)
                    OR ($3::timestamptz IS NULL AND $4::text IS NOT NULL AND name COLLATE "C" > $4)
                    OR ($3::timestamptz IS NOT NULL AND (
                      {order_column} > $3::timestamptz
                      OR ({order_column} = $3::timestamptz AND name COLLATE "C" > $4)
                    ))
                  )
                ORDER BY {order_column} ASC, name COLLATE "C" ASC
                LIMIT $5
                "#
            );
            sqlx::query(&sql)
                .bind(query.bucket_id)
                .bind(like_pattern)
                .bind(cursor_ts)
                .bind(cursor_name)
                .bind(limit)
                .fetch_all(executor)
                .await
        }
    }
    .map_err(map_sqlx_error)?;

    let mut objects = Vec::new();
    let mut common_prefixes = Vec::new();
    let mut seen_prefixes = std::collections::HashSet::new();

    for row in rows {
        let object = row_to_object(row)?;
        if let Some(delim) = query.delimiter {
            let rest = &object.name[query.prefix.len().min(object.name.len())..];
            if let Some(idx) = rest.find(delim) {
                let prefix = format!("{}{}", query.prefix, &rest[..idx + delim.len()]);
                if seen_prefixes.insert(prefix.clone()) {
                    common_prefixes.push(prefix);
                }
                continue;
            }
        }
        objects.push(object);
    }

    let total_returned = objects.len() + common_prefixes.len();
    let truncated = total_returned as i64 > query.max_keys;
    if truncated {
        objects.truncate(query.max_keys as usize);
    }

    let next_continuation_token = if truncated {
        objects.last().map(|o| match query.sort_by {
            SortBy::Name => o.name.clone(),
            SortBy::CreatedAt => encode_timestamp_cursor(o.created_at, &o.name),
            SortBy::UpdatedAt => encode_timestamp_cursor(o.updated_at, &o.name),
        })
    } else {
        None
    };

    Ok(ListObjectsV2Page {
        objects,
        common_prefixes,
        next_continuation_token,
    })
}

/// Search / prefix listing v1 (§4.3): a simpler non-delimiter listing
/// used by the native REST surface's search endpoint.
pub async fn search_objects<'e, E>(
    executor: E,
    bucket_id: &str,
    prefix: &str,
    offset: i64,
    limit: i64,
    sort_by: SortBy,
) -> Result<Vec<Object>, Error>
where
    E: PgExecutor<'e>,
{
    let order_column = match sort_by {
        SortBy::Name => "name",
        SortBy::CreatedAt => "created_at",
        SortBy::UpdatedAt => "updated_at",
    };
    let sql = format!(
        r#"
        SELECT id, bucket_id, name, owner, version, metadata, user_metadata, created_at, updated_at, last_accessed_at
        FROM objects
        WHERE bucket_id = $1 AND name LIKE $2
        ORDER BY {order_column} COLLATE "C" ASC
        OFFSET $3 LIMIT $4
        "#
    );
    let like_pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));

    let rows = sqlx::query(&sql)
        .bind(bucket_id)
        .bind(like_pattern)
        .bind(offset)
        .bind(limit)
        .fetch_all(executor)
        .await
        .map_err(map_sqlx_error)?;

    rows.into_iter().map(row_to_object).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_cursor_round_trips_name_and_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z").unwrap().with_timezone(&Utc);
        let token = encode_timestamp_cursor(ts, "photos/cat.png");
        let (decoded_ts, decoded_name) = decode_timestamp_cursor(&token).unwrap();
        assert_eq!(decoded_ts, ts);
        assert_eq!(decoded_name, "photos/cat.png");
    }

    #[test]
    fn timestamp_cursor_rejects_malformed_tokens() {
        assert!(decode_timestamp_cursor("not-base64!!").is_err());
        assert!(decode_timestamp_cursor(&BASE64.encode("no-pipe-separator")).is_err());
    }
}
