//! `CreateMultipartUpload`, `UploadPart`, `UploadPartCopy`,
//! `CompleteMultipartUpload`, `AbortMultipartUpload`, `ListMultipartUploads`,
//! `ListParts` (§4.5).
//!
//! `UploadPart`/`UploadPartCopy`/`ListParts` call `meta()`/`blob()` on the
//! coordinator directly rather than through a dedicated coordinator method:
//! each part upload only ever touches one row and isn't guarded by the
//! object's advisory lock the way create/overwrite/copy/move are (§5
//! "Multipart `UploadPart` calls are not serialised against each other"),
//! so routing them through `StorageCoordinator`'s lock-then-write shape
//! would be the wrong abstraction.

use crate::error::S3Error;
use crate::handlers::{extract_user_metadata, user_metadata_to_json, S3State};
use crate::xml::{self, CompleteMultipartUploadResult, InitiateMultipartUploadResult, ListPartsResult, PartItem};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use gateway_blob::{ByteRange, CompletedPart};
use gateway_common::Error;
use serde::Deserialize;
use uuid::Uuid;

pub async fn create_multipart_upload(
    State(state): State<S3State>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let user_metadata = extract_user_metadata(&headers);
    let user_metadata_json = user_metadata_to_json(&user_metadata);

    match state.coordinator.create_multipart_upload(&bucket, &key, content_type, None, user_metadata_json.as_ref()).await
    {
        Ok((_backend_upload_id, row)) => {
            let result = InitiateMultipartUploadResult { bucket, key, upload_id: row.id };
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/xml")
                .body(Body::from(xml::to_xml_document(&result)))
                .unwrap()
        }
        Err(e) => S3Error::new(e, format!("/{bucket}/{key}")).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadPartParams {
    #[serde(rename = "uploadId")]
    pub upload_id: String,
    #[serde(rename = "partNumber")]
    pub part_number: i32,
}

pub async fn upload_part(
    State(state): State<S3State>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<UploadPartParams>,
    body: Bytes,
) -> Response {
    let upload = match state.coordinator.get_multipart_upload(&params.upload_id).await {
        Ok(upload) => upload,
        Err(e) => return S3Error::new(e, format!("/{bucket}/{key}")).into_response(),
    };

    let blob_key = state.coordinator.object_blob_key(&bucket, &key, &upload.version);
    let part = match state
        .coordinator
        .blob()
        .upload_part(&blob_key, &upload.backend_upload_id, params.part_number as u16, body)
        .await
    {
        Ok(part) => part,
        Err(e) => return S3Error::new(Error::from(e), format!("/{bucket}/{key}")).into_response(),
    };

    let new_signature = Uuid::new_v4().to_string();
    if let Err(e) = state
        .coordinator
        .meta()
        .record_part_locked(&bucket, &key, &params.upload_id, params.part_number, &part.etag, part.size as i64, &new_signature)
        .await
    {
        return S3Error::new(e, format!("/{bucket}/{key}")).into_response();
    }

    Response::builder().status(StatusCode::OK).header(header::ETAG, format!("\"{}\"", part.etag)).body(Body::empty()).unwrap()
}

#[derive(Debug, Deserialize)]
pub struct UploadPartCopyParams {
    #[serde(rename = "uploadId")]
    pub upload_id: String,
    #[serde(rename = "partNumber")]
    pub part_number: i32,
}

pub async fn upload_part_copy(
    State(state): State<S3State>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<UploadPartCopyParams>,
    headers: HeaderMap,
) -> Response {
    let Some(source) = headers.get("x-amz-copy-source").and_then(|v| v.to_str().ok()) else {
        return S3Error::new(Error::invalid_parameter("missing x-amz-copy-source"), format!("/{bucket}/{key}"))
            .into_response();
    };
    let source = source.trim_start_matches('/');
    let Some((src_bucket, src_key)) = source.split_once('/') else {
        return S3Error::new(Error::invalid_parameter("malformed x-amz-copy-source"), format!("/{bucket}/{key}"))
            .into_response();
    };

    let range = headers
        .get("x-amz-copy-source-range")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("bytes="))
        .and_then(|v| v.split_once('-'))
        .and_then(|(start, end)| Some(ByteRange { start: start.parse().ok()?, end: end.parse().ok() }));

    let upload = match state.coordinator.get_multipart_upload(&params.upload_id).await {
        Ok(upload) => upload,
        Err(e) => return S3Error::new(e, format!("/{bucket}/{key}")).into_response(),
    };
    let Ok(Some(src_bucket_row)) = state.coordinator.find_bucket(src_bucket).await else {
        return S3Error::new(Error::NoSuchBucket(src_bucket.to_string()), format!("/{bucket}/{key}")).into_response();
    };
    let Ok(Some(src_object)) = state.coordinator.find_object(&src_bucket_row.id, src_key).await else {
        return S3Error::new(
            Error::NoSuchKey { bucket: src_bucket.to_string(), key: src_key.to_string() },
            format!("/{bucket}/{key}"),
        )
        .into_response();
    };

    let src_blob_key = state.coordinator.object_blob_key(src_bucket, src_key, &src_object.version);
    let blob_key = state.coordinator.object_blob_key(&bucket, &key, &upload.version);

    let part = match state
        .coordinator
        .blob()
        .upload_part_copy(&blob_key, &upload.backend_upload_id, params.part_number as u16, &src_blob_key, range)
        .await
    {
        Ok(part) => part,
        Err(e) => return S3Error::new(Error::from(e), format!("/{bucket}/{key}")).into_response(),
    };

    let new_signature = Uuid::new_v4().to_string();
    if let Err(e) = state
        .coordinator
        .meta()
        .record_part_locked(&bucket, &key, &params.upload_id, params.part_number, &part.etag, part.size as i64, &new_signature)
        .await
    {
        return S3Error::new(e, format!("/{bucket}/{key}")).into_response();
    }

    let result = xml::CopyObjectResult { etag: format!("\"{}\"", part.etag), last_modified: String::new() };
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/xml")
        .body(Body::from(xml::to_xml_document(&result)))
        .unwrap()
}

#[derive(Debug, Deserialize)]
pub struct CompleteUploadParams {
    #[serde(rename = "uploadId")]
    pub upload_id: String,
}

pub async fn complete_multipart_upload(
    State(state): State<S3State>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<CompleteUploadParams>,
    body: Bytes,
) -> Response {
    let request: xml::CompleteMultipartUploadXml = match quick_xml::de::from_reader(body.as_ref()) {
        Ok(r) => r,
        Err(e) => {
            return S3Error::new(Error::invalid_parameter(format!("malformed CompleteMultipartUpload body: {e}")), format!("/{bucket}/{key}"))
                .into_response()
        }
    };

    let part_numbers: Vec<i32> = request.parts.iter().map(|p| p.part_number).collect();
    if !part_numbers.windows(2).all(|w| w[0] < w[1]) {
        return S3Error::new(Error::invalid_parameter("parts must be in strictly ascending PartNumber order"), format!("/{bucket}/{key}"))
            .into_response();
    }

    let parts: Vec<CompletedPart> = request
        .parts
        .into_iter()
        .map(|p| CompletedPart { part_number: p.part_number as u16, etag: p.etag })
        .collect();

    match state.coordinator.complete_multipart_upload(&params.upload_id, &parts).await {
        Ok(object) => {
            let etag = object.metadata.get("eTag").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let result = CompleteMultipartUploadResult {
                location: format!("/{bucket}/{key}"),
                bucket,
                key,
                etag,
            };
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/xml")
                .body(Body::from(xml::to_xml_document(&result)))
                .unwrap()
        }
        Err(e) => S3Error::new(e, format!("/{bucket}/{key}")).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct AbortUploadParams {
    #[serde(rename = "uploadId")]
    pub upload_id: String,
}

pub async fn abort_multipart_upload(
    State(state): State<S3State>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<AbortUploadParams>,
) -> Response {
    match state.coordinator.abort_multipart_upload(&params.upload_id).await {
        Ok(()) => Response::builder().status(StatusCode::NO_CONTENT).body(Body::empty()).unwrap(),
        Err(e) => S3Error::new(e, format!("/{bucket}/{key}")).into_response(),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ListMultipartUploadsParams {
    #[serde(rename = "max-uploads")]
    pub max_uploads: Option<i64>,
}

pub async fn list_multipart_uploads(
    State(state): State<S3State>,
    Path(bucket): Path<String>,
    Query(params): Query<ListMultipartUploadsParams>,
) -> Response {
    match state.coordinator.list_multipart_uploads(&bucket, params.max_uploads.unwrap_or(1000).clamp(1, 1000)).await {
        Ok(uploads) => {
            let result = xml::ListMultipartUploadsResult {
                bucket: bucket.clone(),
                is_truncated: false,
                uploads: uploads
                    .into_iter()
                    .map(|u| xml::UploadItem {
                        key: u.key,
                        upload_id: u.id,
                        initiated: u.created_at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
                        storage_class: "STANDARD".to_string(),
                    })
                    .collect(),
            };
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/xml")
                .body(Body::from(xml::to_xml_document(&result)))
                .unwrap()
        }
        Err(e) => S3Error::new(e, format!("/{bucket}")).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListPartsParams {
    #[serde(rename = "uploadId")]
    pub upload_id: String,
}

pub async fn list_parts(
    State(state): State<S3State>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<ListPartsParams>,
) -> Response {
    match state.coordinator.list_parts(&params.upload_id).await {
        Ok(parts) => {
            let result = ListPartsResult {
                bucket,
                key,
                upload_id: params.upload_id,
                max_parts: 1000,
                is_truncated: false,
                parts: parts
                    .into_iter()
                    .map(|p| PartItem {
                        part_number: p.part_number,
                        last_modified: p.created_at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
                        etag: format!("\"{}\"", p.etag),
                        size: p.size,
                    })
                    .collect(),
            };
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/xml")
                .body(Body::from(xml::to_xml_document(&result)))
                .unwrap()
        }
        Err(e) => S3Error::new(e, format!("/{bucket}/{key}")).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strictly_ascending(numbers: &[i32]) -> bool {
        numbers.windows(2).all(|w| w[0] < w[1])
    }

    #[test]
    fn ascending_part_numbers_pass_the_order_check() {
        assert!(strictly_ascending(&[1, 2, 3]));
    }

    #[test]
    fn out_of_order_part_numbers_fail_the_check() {
        assert!(!strictly_ascending(&[2, 1, 3]));
    }

    #[test]
    fn duplicate_part_numbers_fail_the_check() {
        assert!(!strictly_ascending(&[1, 1, 2]));
    }
}
