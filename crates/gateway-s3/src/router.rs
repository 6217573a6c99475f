//! The S3 route table (§4.6): each method/path pair is a single axum
//! handler that dispatches to an operation by inspecting query parameters
//! and headers, mirroring the declarative
//! `(method, path, queryMatchers, headerMatchers, operationId)` shape the
//! protocol actually needs — `?uploadId`, `?partNumber`, `?uploads`,
//! `?tagging`, `?location`, `?versioning` and `x-amz-copy-source` all steer
//! one HTTP verb toward different operations on the same path.

use crate::handlers::{self, S3State};
use axum::extract::{Extension, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, head, post, put};
use axum::Router;
use bytes::Bytes;
use gateway_auth::{decode_streaming_body, ChunkSigningContext};
use gateway_common::Error;
use std::collections::HashMap;

#[must_use]
pub fn s3_router(state: S3State) -> Router {
    Router::new()
        .route("/", get(handlers::list_buckets))
        .route("/{bucket}", put(handlers::create_bucket))
        .route("/{bucket}", get(bucket_get_dispatch))
        .route("/{bucket}", head(handlers::head_bucket))
        .route("/{bucket}", delete(handlers::delete_bucket))
        .route("/{bucket}", post(bucket_post_dispatch))
        .route("/{bucket}/{*key}", put(object_put_dispatch))
        .route("/{bucket}/{*key}", get(object_get_dispatch))
        .route("/{bucket}/{*key}", head(handlers::head_object))
        .route("/{bucket}/{*key}", delete(object_delete_dispatch))
        .route("/{bucket}/{*key}", post(object_post_dispatch))
        .with_state(state)
}

fn has(query: &HashMap<String, String>, name: &str) -> bool {
    query.contains_key(name)
}

/// A `STREAMING-AWS4-HMAC-SHA256-PAYLOAD` request carries a
/// [`ChunkSigningContext`] (seeded during auth) as a request extension;
/// decode and verify the chunk framing before the raw bytes reach a handler.
/// A request signed in header mode has no context and passes `body` through.
fn decode_streaming_if_needed(chunk_ctx: Option<Extension<ChunkSigningContext>>, body: Bytes) -> Result<Bytes, Error> {
    let Some(Extension(mut ctx)) = chunk_ctx else { return Ok(body) };
    decode_streaming_body(&body, &mut ctx).map(Bytes::from).map_err(crate::auth::auth_error_to_error)
}

/// `POST /{bucket}`: a `multipart/form-data` body is a browser-style object
/// upload (§4.5, §6); anything else is `DeleteObjects`.
async fn bucket_post_dispatch(state: State<S3State>, path: Path<String>, headers: HeaderMap, body: Bytes) -> Response {
    let is_form_upload = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().starts_with("multipart/form-data"));
    if is_form_upload {
        return handlers::bucket_post_multipart(state, path, headers, body).await;
    }
    handlers::delete_objects(state, path, body).await
}

/// `GET /{bucket}`: plain `ListObjectsV2`, or `?uploads` for
/// `ListMultipartUploads`, or `?location`/`?versioning` for the
/// (static) bucket-attribute reads.
async fn bucket_get_dispatch(
    state: State<S3State>,
    path: Path<String>,
    Query(raw): Query<HashMap<String, String>>,
) -> Response {
    if has(&raw, "uploads") {
        let query = Query(handlers::ListMultipartUploadsParams {
            max_uploads: raw.get("max-uploads").and_then(|v| v.parse().ok()),
        });
        return handlers::list_multipart_uploads(state, path, query).await;
    }
    if has(&raw, "location") {
        return handlers::get_bucket_location(path).await;
    }
    if has(&raw, "versioning") {
        return handlers::get_bucket_versioning().await;
    }
    let query = Query(handlers::ListObjectsV2Params {
        prefix: raw.get("prefix").cloned(),
        delimiter: raw.get("delimiter").cloned(),
        continuation_token: raw.get("continuation-token").cloned(),
        start_after: raw.get("start-after").cloned(),
        max_keys: raw.get("max-keys").and_then(|v| v.parse().ok()),
    });
    handlers::list_objects_v2(state, path, query).await
}

/// `PUT /{bucket}/{key}`: `UploadPart` when `uploadId`+`partNumber` are
/// both present (and `UploadPartCopy` when `x-amz-copy-source` also is);
/// otherwise `PutObject` (which itself dispatches to `CopyObject` on the
/// same header — see [`handlers::put_object`]). A streaming-SigV4 body is
/// decoded and its chunk signatures verified before either path sees it.
async fn object_put_dispatch(
    state: State<S3State>,
    Path((bucket, key)): Path<(String, String)>,
    Query(raw): Query<HashMap<String, String>>,
    headers: HeaderMap,
    chunk_ctx: Option<Extension<ChunkSigningContext>>,
    body: Bytes,
) -> Response {
    let body = match decode_streaming_if_needed(chunk_ctx, body) {
        Ok(body) => body,
        Err(e) => return crate::error::S3Error::new(e, format!("/{bucket}/{key}")).into_response(),
    };
    let path = Path((bucket, key));
    if has(&raw, "uploadId") && has(&raw, "partNumber") {
        if headers.contains_key("x-amz-copy-source") {
            let query = Query(handlers::UploadPartCopyParams {
                upload_id: raw.get("uploadId").cloned().unwrap_or_default(),
                part_number: raw.get("partNumber").and_then(|v| v.parse().ok()).unwrap_or(1),
            });
            return handlers::upload_part_copy(state, path, query, headers).await;
        }
        let query = Query(handlers::UploadPartParams {
            upload_id: raw.get("uploadId").cloned().unwrap_or_default(),
            part_number: raw.get("partNumber").and_then(|v| v.parse().ok()).unwrap_or(1),
        });
        return handlers::upload_part(state, path, query, body).await;
    }
    handlers::put_object(state, path, headers, body).await
}

/// `GET /{bucket}/{key}`: `ListParts` when `uploadId` is present,
/// `GetObjectTagging` when `tagging` is present, else `GetObject`.
async fn object_get_dispatch(
    state: State<S3State>,
    Path((bucket, key)): Path<(String, String)>,
    Query(raw): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let path = Path((bucket, key));
    if let Some(upload_id) = raw.get("uploadId") {
        let query = Query(handlers::ListPartsParams { upload_id: upload_id.clone() });
        return handlers::list_parts(state, path, query).await;
    }
    if has(&raw, "tagging") {
        return handlers::get_object_tagging(state, path).await;
    }
    handlers::get_object(state, path, headers).await
}

/// `DELETE /{bucket}/{key}`: `AbortMultipartUpload` when `uploadId` is
/// present, else `DeleteObject`.
async fn object_delete_dispatch(
    state: State<S3State>,
    Path((bucket, key)): Path<(String, String)>,
    Query(raw): Query<HashMap<String, String>>,
) -> Response {
    let path = Path((bucket, key));
    if let Some(upload_id) = raw.get("uploadId") {
        let query = Query(handlers::AbortUploadParams { upload_id: upload_id.clone() });
        return handlers::abort_multipart_upload(state, path, query).await;
    }
    handlers::delete_object(state, path).await
}

/// `POST /{bucket}/{key}`: `CreateMultipartUpload` (`?uploads`) or
/// `CompleteMultipartUpload` (`?uploadId`) — a bare `POST` to an object
/// path with neither is not a valid S3 operation.
async fn object_post_dispatch(
    state: State<S3State>,
    Path((bucket, key)): Path<(String, String)>,
    Query(raw): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = Path((bucket.clone(), key.clone()));
    if has(&raw, "uploads") {
        return handlers::create_multipart_upload(state, path, headers).await;
    }
    if let Some(upload_id) = raw.get("uploadId") {
        let query = Query(handlers::CompleteUploadParams { upload_id: upload_id.clone() });
        return handlers::complete_multipart_upload(state, path, query, body).await;
    }
    crate::error::S3Error::new(
        gateway_common::Error::invalid_parameter("POST requires ?uploads or ?uploadId"),
        format!("/{bucket}/{key}"),
    )
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_detects_present_query_keys() {
        let mut query = HashMap::new();
        query.insert("uploadId".to_string(), "abc".to_string());
        assert!(has(&query, "uploadId"));
        assert!(!has(&query, "partNumber"));
    }
}
