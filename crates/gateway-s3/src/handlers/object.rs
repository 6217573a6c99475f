//! `HeadObject`, `GetObject`, `PutObject` (incl. multipart/form-data POST),
//! `CopyObject`, `DeleteObject(s)`, `GetObjectTagging` (§4.5).

use crate::error::S3Error;
use crate::handlers::{add_metadata_headers, extract_user_metadata, user_metadata_to_json, S3State};
use crate::multipart_form::{self, MultipartForm};
use crate::xml::{self, DeleteError, DeletedObject, DeleteObjectsResult, TagSet, TaggingResult};
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use gateway_blob::{ByteRange, ConditionalGet};
use gateway_common::Error;

fn parse_range(headers: &HeaderMap) -> Option<ByteRange> {
    let value = headers.get(header::RANGE)?.to_str().ok()?;
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: u64 = start.parse().ok()?;
    let end = if end.is_empty() { None } else { end.parse().ok() };
    Some(ByteRange { start, end })
}

fn conditional_from_headers(headers: &HeaderMap) -> ConditionalGet {
    ConditionalGet {
        if_none_match: headers.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok()).map(str::to_string),
        if_modified_since: headers
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| chrono::DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc)),
        range: parse_range(headers),
    }
}

pub async fn head_object(
    State(state): State<S3State>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    match state.coordinator.head_object(&bucket, &key).await {
        Ok(meta) => {
            let builder = Response::builder()
                .status(StatusCode::OK)
                .header(header::ETAG, format!("\"{}\"", meta.etag.trim_matches('"')))
                .header(header::CONTENT_LENGTH, meta.size)
                .header(header::LAST_MODIFIED, meta.last_modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
            let builder =
                if let Some(ct) = &meta.content_type { builder.header(header::CONTENT_TYPE, ct) } else { builder };
            builder.body(Body::empty()).unwrap()
        }
        Err(e) => S3Error::new(e, format!("/{bucket}/{key}")).into_response(),
    }
}

pub async fn get_object(
    State(state): State<S3State>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let conditional = conditional_from_headers(&headers);
    match state.coordinator.get_object(&bucket, &key, &conditional).await {
        Ok(output) => {
            let builder = Response::builder()
                .status(StatusCode::OK)
                .header(header::ETAG, format!("\"{}\"", output.meta.etag.trim_matches('"')))
                .header(header::CONTENT_LENGTH, output.meta.size)
                .header(
                    header::LAST_MODIFIED,
                    output.meta.last_modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
                );
            let builder = if let Some(ct) = &output.meta.content_type {
                builder.header(header::CONTENT_TYPE, ct)
            } else {
                builder
            };
            builder.body(Body::from(output.body)).unwrap()
        }
        Err(e) => S3Error::new(e, format!("/{bucket}/{key}")).into_response(),
    }
}

pub async fn put_object(
    State(state): State<S3State>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if headers.get("x-amz-copy-source").is_some() {
        return copy_object(State(state), Path((bucket, key)), headers).await;
    }

    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let cache_control = headers.get(header::CACHE_CONTROL).and_then(|v| v.to_str().ok());
    let user_metadata = extract_user_metadata(&headers);
    let user_metadata_json = user_metadata_to_json(&user_metadata);

    let request = gateway_storage::PutObjectRequest {
        bucket: &bucket,
        key: &key,
        body,
        content_type,
        owner: None,
        user_metadata: user_metadata_json.as_ref(),
        cache_control,
        tenant_file_size_limit: None,
    };

    match state.coordinator.put_object(request).await {
        Ok(object) => {
            let etag = object.metadata.get("eTag").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            Response::builder().status(StatusCode::OK).header(header::ETAG, etag).body(Body::empty()).unwrap()
        }
        Err(e) => S3Error::new(e, format!("/{bucket}/{key}")).into_response(),
    }
}

/// Browser-style `POST /{bucket}` upload: the form's `key` field names the
/// object, the `file` field is its content (§4.5, §6). The `uploadId`/
/// `uploads` query-param POSTs and the plain `DeleteObjects` POST live on the
/// same path/method pair but are routed here by content-type, not by query
/// params, so this takes the already-parsed form rather than extracting it.
pub async fn put_object_form(State(state): State<S3State>, Path(bucket): Path<String>, form: MultipartForm) -> Response {
    let Some(key) = form.fields.get("key").cloned() else {
        return S3Error::new(Error::invalid_parameter("missing key field in multipart form data"), format!("/{bucket}"))
            .into_response();
    };

    let request = gateway_storage::PutObjectRequest {
        bucket: &bucket,
        key: &key,
        body: form.file_data,
        content_type: form.file_content_type.as_deref(),
        owner: None,
        user_metadata: None,
        cache_control: None,
        tenant_file_size_limit: None,
    };

    match state.coordinator.put_object(request).await {
        Ok(object) => {
            let etag = object.metadata.get("eTag").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            Response::builder()
                .status(StatusCode::NO_CONTENT)
                .header(header::ETAG, etag)
                .header(header::LOCATION, format!("/{bucket}/{key}"))
                .body(Body::empty())
                .unwrap()
        }
        Err(e) => S3Error::new(e, format!("/{bucket}/{key}")).into_response(),
    }
}

/// Parses a `POST /{bucket}` multipart/form-data body and routes it to
/// [`put_object_form`]; a malformed body (bad boundary, no `file` part)
/// renders as `InvalidRequest` rather than falling through to `DeleteObjects`.
pub async fn bucket_post_multipart(
    State(state): State<S3State>,
    Path(bucket): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or_default();
    let boundary = match multipart_form::extract_boundary(content_type) {
        Ok(b) => b,
        Err(e) => return S3Error::new(e, format!("/{bucket}")).into_response(),
    };
    let form = match multipart_form::parse_multipart(&body, &boundary) {
        Ok(f) => f,
        Err(e) => return S3Error::new(e, format!("/{bucket}")).into_response(),
    };
    put_object_form(State(state), Path(bucket), form).await
}

async fn copy_object(
    State(state): State<S3State>,
    Path((dst_bucket, dst_key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let Some(source) = headers.get("x-amz-copy-source").and_then(|v| v.to_str().ok()) else {
        return S3Error::new(Error::invalid_parameter("missing x-amz-copy-source"), format!("/{dst_bucket}/{dst_key}"))
            .into_response();
    };
    let source = source.trim_start_matches('/');
    let Some((src_bucket, src_key)) = source.split_once('/') else {
        return S3Error::new(Error::invalid_parameter("malformed x-amz-copy-source"), format!("/{dst_bucket}/{dst_key}"))
            .into_response();
    };

    let copy_metadata = headers
        .get("x-amz-metadata-directive")
        .and_then(|v| v.to_str().ok())
        .is_none_or(|v| !v.eq_ignore_ascii_case("REPLACE"));

    match state.coordinator.copy_object(src_bucket, src_key, &dst_bucket, &dst_key, None, copy_metadata).await {
        Ok(object) => {
            let etag = object.metadata.get("eTag").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let result = xml::CopyObjectResult {
                etag,
                last_modified: object.updated_at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            };
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/xml")
                .body(Body::from(xml::to_xml_document(&result)))
                .unwrap()
        }
        Err(e) => S3Error::new(e, format!("/{dst_bucket}/{dst_key}")).into_response(),
    }
}

pub async fn delete_object(
    State(state): State<S3State>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    match state.coordinator.delete_object(&bucket, &key).await {
        Ok(()) => Response::builder().status(StatusCode::NO_CONTENT).body(Body::empty()).unwrap(),
        Err(e) if e.is_not_found() => Response::builder().status(StatusCode::NO_CONTENT).body(Body::empty()).unwrap(),
        Err(e) => S3Error::new(e, format!("/{bucket}/{key}")).into_response(),
    }
}

pub async fn delete_objects(
    State(state): State<S3State>,
    Path(bucket): Path<String>,
    body: Bytes,
) -> Response {
    let request: xml::DeleteObjectsRequest = match quick_xml::de::from_reader(body.as_ref()) {
        Ok(r) => r,
        Err(e) => {
            return S3Error::new(Error::invalid_parameter(format!("malformed DeleteObjects body: {e}")), format!("/{bucket}"))
                .into_response()
        }
    };

    let mut deleted = Vec::new();
    let mut errors = Vec::new();
    for object in request.objects {
        match state.coordinator.delete_object(&bucket, &object.key).await {
            Ok(()) => deleted.push(DeletedObject { key: object.key }),
            Err(e) if e.is_not_found() => deleted.push(DeletedObject { key: object.key }),
            Err(e) => errors.push(DeleteError {
                key: object.key,
                code: e.s3_error_code().to_string(),
                message: e.to_string(),
            }),
        }
    }

    let result = DeleteObjectsResult {
        deleted: if request.quiet { Vec::new() } else { deleted },
        errors,
    };
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/xml")
        .body(Body::from(xml::to_xml_document(&result)))
        .unwrap()
}

/// The backend is treated as a black box for tags; surface an empty set
/// unless/until a backend advertises tagging support (§4.5).
pub async fn get_object_tagging(
    State(state): State<S3State>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    if let Err(e) = state.coordinator.head_object(&bucket, &key).await {
        return S3Error::new(e, format!("/{bucket}/{key}")).into_response();
    }
    let result = TaggingResult { tag_set: TagSet::default() };
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/xml")
        .body(Body::from(xml::to_xml_document(&result)))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_inclusive_byte_range() {
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, HeaderValue::from_static("bytes=0-499"));
        let range = parse_range(&headers).unwrap();
        assert_eq!(range.start, 0);
        assert_eq!(range.end, Some(499));
    }

    #[test]
    fn parses_open_ended_range() {
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, HeaderValue::from_static("bytes=100-"));
        let range = parse_range(&headers).unwrap();
        assert_eq!(range.start, 100);
        assert_eq!(range.end, None);
    }

    #[test]
    fn missing_range_header_yields_none() {
        assert!(parse_range(&HeaderMap::new()).is_none());
    }
}
