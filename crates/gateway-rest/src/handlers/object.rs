//! `/object/*` (§6): upload, delete, the `public`/`authenticated` read
//! paths, presigned `sign`/`upload/sign` URLs, `list`/`list-v2`, `copy`,
//! `move` and `info`.

use crate::error::RestError;
use crate::handlers::RestState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use gateway_auth::AuthResult;
use gateway_common::Error;
use gateway_metastore::{ListObjectsV2Query, Object, SortBy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

fn object_view(o: &Object) -> Value {
    serde_json::json!({
        "id": o.id,
        "name": o.name,
        "bucket_id": o.bucket_id,
        "owner": o.owner,
        "version": o.version,
        "metadata": o.metadata,
        "user_metadata": o.user_metadata,
        "created_at": o.created_at.to_rfc3339(),
        "updated_at": o.updated_at.to_rfc3339(),
        "last_accessed_at": o.last_accessed_at.to_rfc3339(),
    })
}

pub async fn upload_object(
    State(state): State<RestState>,
    Extension(auth): Extension<AuthResult>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let cache_control = headers.get(header::CACHE_CONTROL).and_then(|v| v.to_str().ok());
    let req = gateway_storage::PutObjectRequest {
        bucket: &bucket,
        key: &key,
        body,
        content_type,
        owner: auth.owner.as_deref(),
        user_metadata: None,
        cache_control,
        tenant_file_size_limit: None,
    };
    match state.coordinator.put_object(req).await {
        Ok(object) => Json(serde_json::json!({ "Key": format!("{bucket}/{}", object.name) })).into_response(),
        Err(e) => RestError::from(e).into_response(),
    }
}

pub async fn delete_object(State(state): State<RestState>, Path((bucket, key)): Path<(String, String)>) -> Response {
    match state.coordinator.delete_object(&bucket, &key).await {
        Ok(()) => Json(serde_json::json!({ "message": "Successfully deleted" })).into_response(),
        Err(e) => RestError::from(e).into_response(),
    }
}

async fn render_get(state: &RestState, bucket: &str, key: &str) -> Response {
    match state.coordinator.get_object(bucket, key, &gateway_blob::ConditionalGet::none()).await {
        Ok(output) => {
            let builder = axum::http::Response::builder()
                .status(StatusCode::OK)
                .header(header::ETAG, format!("\"{}\"", output.meta.etag.trim_matches('"')))
                .header(header::CONTENT_LENGTH, output.meta.size);
            let builder = if let Some(ct) = &output.meta.content_type {
                builder.header(header::CONTENT_TYPE, ct)
            } else {
                builder
            };
            builder.body(axum::body::Body::from(output.body)).unwrap()
        }
        Err(e) => RestError::from(e).into_response(),
    }
}

/// `GET /object/public/:bucket/*key` (§6, scenario S2): serves the object
/// only when its bucket is public; otherwise the bucket is treated as
/// nonexistent from this path's point of view rather than leaking that a
/// private bucket with that name exists.
pub async fn get_public_object(State(state): State<RestState>, Path((bucket, key)): Path<(String, String)>) -> Response {
    match state.coordinator.find_bucket(&bucket).await {
        Ok(Some(b)) if b.public => render_get(&state, &bucket, &key).await,
        Ok(_) => RestError::from(Error::NoSuchBucket(bucket)).into_response(),
        Err(e) => RestError::from(e).into_response(),
    }
}

/// `GET /object/authenticated/:bucket/*key`: the caller has already been
/// authenticated by the layer in front of this router; no further
/// bucket-visibility check applies here.
pub async fn get_authenticated_object(
    State(state): State<RestState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    render_get(&state, &bucket, &key).await
}

/// `GET /object/sign/:bucket/*key?expiresIn=N`: a presigned, time-limited
/// GET URL from the blob backend (`BlobBackend::private_asset_url`). The
/// file backend has no notion of presigned URLs and returns
/// `BlobError::Unavailable`, which this surfaces as a 500.
#[derive(Deserialize)]
pub struct SignQuery {
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

pub async fn sign_object(
    State(state): State<RestState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(q): Query<SignQuery>,
) -> Response {
    let Ok(Some(b)) = state.coordinator.find_bucket(&bucket).await else {
        return RestError::from(Error::NoSuchBucket(bucket)).into_response();
    };
    let Ok(Some(object)) = state.coordinator.find_object(&b.id, &key).await else {
        return RestError::from(Error::NoSuchKey { bucket, key }).into_response();
    };
    let blob_key = state.coordinator.object_blob_key(&bucket, &key, &object.version);
    match state.coordinator.blob().private_asset_url(&blob_key, Duration::from_secs(q.expires_in)).await {
        Ok(url) => Json(serde_json::json!({ "signedURL": url })).into_response(),
        Err(e) => RestError::from(Error::from(e)).into_response(),
    }
}

/// `GET /object/upload/sign/:bucket/*key`: a presigned upload handle. The
/// blob backend capability set (§4.2) only presigns reads, so this signs
/// the same `private_asset_url` and leaves the client to `PUT` through the
/// native path directly; real presigned-PUT support would need a new
/// `BlobBackend` method, tracked as an open question rather than faked.
pub async fn sign_upload_object(
    State(state): State<RestState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(q): Query<SignQuery>,
) -> Response {
    sign_object(State(state), Path((bucket, key)), Query(q)).await
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    prefix: String,
    #[serde(default)]
    offset: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// `GET /object/list/:bucket` (§4.3 "search/prefix listing v1").
pub async fn list_objects(State(state): State<RestState>, Path(bucket): Path<String>, Query(q): Query<ListQuery>) -> Response {
    let Ok(Some(b)) = state.coordinator.find_bucket(&bucket).await else {
        return RestError::from(Error::NoSuchBucket(bucket)).into_response();
    };
    match state.coordinator.search_objects(&b.id, &q.prefix, q.offset, q.limit, SortBy::Name).await {
        Ok(objects) => Json(objects.iter().map(object_view).collect::<Vec<_>>()).into_response(),
        Err(e) => RestError::from(e).into_response(),
    }
}

#[derive(Deserialize)]
pub struct ListV2Request {
    #[serde(default)]
    prefix: String,
    #[serde(default)]
    delimiter: Option<String>,
    #[serde(default)]
    start_after: Option<String>,
    #[serde(default)]
    continuation_token: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
}

#[derive(Serialize)]
struct ListV2Response {
    objects: Vec<Value>,
    common_prefixes: Vec<String>,
    next_continuation_token: Option<String>,
}

/// `POST /object/list-v2/:bucket` (§4.3 "List v2 with delimiter").
pub async fn list_objects_v2(
    State(state): State<RestState>,
    Path(bucket): Path<String>,
    Json(req): Json<ListV2Request>,
) -> Response {
    let Ok(Some(b)) = state.coordinator.find_bucket(&bucket).await else {
        return RestError::from(Error::NoSuchBucket(bucket)).into_response();
    };
    let query = ListObjectsV2Query {
        bucket_id: &b.id,
        prefix: &req.prefix,
        delimiter: req.delimiter.as_deref(),
        start_after: req.start_after.as_deref(),
        continuation_token: req.continuation_token.as_deref(),
        max_keys: req.limit,
        sort_by: SortBy::Name,
    };
    match state.coordinator.list_objects_v2(&query).await {
        Ok(page) => Json(ListV2Response {
            objects: page.objects.iter().map(object_view).collect(),
            common_prefixes: page.common_prefixes,
            next_continuation_token: page.next_continuation_token,
        })
        .into_response(),
        Err(e) => RestError::from(e).into_response(),
    }
}

#[derive(Deserialize)]
pub struct CopyRequest {
    pub source_bucket: String,
    pub source_key: String,
    pub destination_bucket: String,
    pub destination_key: String,
    #[serde(default = "default_true")]
    pub copy_metadata: bool,
}

fn default_true() -> bool {
    true
}

pub async fn copy_object(
    State(state): State<RestState>,
    Extension(auth): Extension<AuthResult>,
    Json(req): Json<CopyRequest>,
) -> Response {
    match state
        .coordinator
        .copy_object(&req.source_bucket, &req.source_key, &req.destination_bucket, &req.destination_key, auth.owner.as_deref(), req.copy_metadata)
        .await
    {
        Ok(object) => Json(serde_json::json!({ "Key": format!("{}/{}", req.destination_bucket, object.name) })).into_response(),
        Err(e) => RestError::from(e).into_response(),
    }
}

#[derive(Deserialize)]
pub struct MoveRequest {
    pub source_bucket: String,
    pub source_key: String,
    pub destination_bucket: String,
    pub destination_key: String,
}

pub async fn move_object(
    State(state): State<RestState>,
    Extension(auth): Extension<AuthResult>,
    Json(req): Json<MoveRequest>,
) -> Response {
    match state
        .coordinator
        .move_object(&req.source_bucket, &req.source_key, &req.destination_bucket, &req.destination_key, auth.owner.as_deref())
        .await
    {
        Ok(object) => Json(serde_json::json!({ "Key": format!("{}/{}", req.destination_bucket, object.name) })).into_response(),
        Err(e) => RestError::from(e).into_response(),
    }
}

pub async fn object_info(State(state): State<RestState>, Path((bucket, key)): Path<(String, String)>) -> Response {
    let Ok(Some(b)) = state.coordinator.find_bucket(&bucket).await else {
        return RestError::from(Error::NoSuchBucket(bucket)).into_response();
    };
    match state.coordinator.find_object(&b.id, &key).await {
        Ok(Some(object)) => Json(object_view(&object)).into_response(),
        Ok(None) => RestError::from(Error::NoSuchKey { bucket, key }).into_response(),
        Err(e) => RestError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_query_defaults_to_one_hour() {
        let q: SignQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.expires_in, 3600);
    }

    #[test]
    fn sign_query_honors_an_explicit_expiry() {
        let q: SignQuery = serde_json::from_str(r#"{"expires_in":60}"#).unwrap();
        assert_eq!(q.expires_in, 60);
    }

    #[test]
    fn list_query_defaults_to_a_hundred_with_no_prefix() {
        let q: ListQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.prefix, "");
        assert_eq!(q.offset, 0);
        assert_eq!(q.limit, 100);
    }

    #[test]
    fn copy_request_defaults_to_copying_metadata() {
        let req: CopyRequest = serde_json::from_str(
            r#"{"source_bucket":"a","source_key":"x","destination_bucket":"b","destination_key":"y"}"#,
        )
        .unwrap();
        assert!(req.copy_metadata);
    }

    #[test]
    fn object_view_serializes_owner_and_version() {
        let object = Object {
            id: "o1".into(),
            bucket_id: "b1".into(),
            name: "cat.png".into(),
            owner: Some("user-1".into()),
            version: "v1".into(),
            metadata: serde_json::json!({ "size": 42 }),
            user_metadata: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            last_accessed_at: chrono::Utc::now(),
        };
        let view = object_view(&object);
        assert_eq!(view["owner"], "user-1");
        assert_eq!(view["version"], "v1");
    }
}
