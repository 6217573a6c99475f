//! TUS HTTP handlers (§6 "HTTP surface (TUS)"). Each handler is
//! tenant-scoped the same way `gateway-s3`'s are: the router resolves which
//! tenant a request belongs to and hands down that tenant's
//! [`TusCoordinator`] plus the separator mode its upload ids use.

use crate::error::TusError;
use crate::metadata::parse_upload_metadata;
use crate::upload_id::UploadId;
use crate::{TusCoordinator, TUS_VERSION};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use gateway_common::Error;
use std::sync::Arc;

/// Shared handler state: one [`TusCoordinator`] per tenant, plus whether
/// that tenant's upload ids use the file-version separator encoding.
#[derive(Clone)]
pub struct TusState {
    pub coordinator: Arc<TusCoordinator>,
    pub tenant: String,
    pub use_file_version_separator: bool,
    pub tenant_file_size_limit: Option<u64>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_length(headers: &HeaderMap, name: &str) -> Result<Option<u64>, Error> {
    match header_str(headers, name) {
        None => Ok(None),
        Some(raw) => raw.parse::<u64>().map(Some).map_err(|_| Error::invalid_parameter(format!("malformed {name}"))),
    }
}

/// `POST /{prefix}`: creates an upload and returns its id in `Location`.
pub async fn create_upload(State(state): State<TusState>, headers: HeaderMap) -> Response {
    match create_upload_inner(&state, &headers).await {
        Ok(upload_id) => {
            let mut response = Response::builder().status(StatusCode::CREATED).header(header::LOCATION, upload_id).body(axum::body::Body::empty()).unwrap();
            response.headers_mut().insert("Tus-Resumable", HeaderValue::from_static(TUS_VERSION));
            response
        }
        Err(e) => TusError(e).into_response(),
    }
}

async fn create_upload_inner(state: &TusState, headers: &HeaderMap) -> Result<String, Error> {
    let declared_length = parse_length(headers, "upload-length")?;
    let metadata = header_str(headers, "upload-metadata").map(parse_upload_metadata).unwrap_or_default();
    let bucket = metadata.get("bucketName").cloned().ok_or_else(|| Error::invalid_parameter("missing bucketName in Upload-Metadata"))?;
    let object = metadata.get("objectName").cloned().ok_or_else(|| Error::invalid_parameter("missing objectName in Upload-Metadata"))?;
    let content_type = metadata.get("contentType").cloned();

    let row_id = state.coordinator.create_upload(&bucket, &object, declared_length, state.tenant_file_size_limit, content_type.as_deref()).await?;
    let id = UploadId { tenant: state.tenant.clone(), bucket, object, version: row_id };
    Ok(id.encode(state.use_file_version_separator))
}

/// `PATCH /{prefix}/{upload_id}`: writes one chunk at `Upload-Offset`.
pub async fn patch(State(state): State<TusState>, Path(upload_id): Path<String>, headers: HeaderMap, body: Bytes) -> Response {
    match patch_inner(&state, &upload_id, &headers, body).await {
        Ok(outcome) => {
            let mut response = Response::builder().status(StatusCode::NO_CONTENT).header("Upload-Offset", outcome.offset.to_string()).body(axum::body::Body::empty()).unwrap();
            response.headers_mut().insert("Tus-Resumable", HeaderValue::from_static(TUS_VERSION));
            response
        }
        Err(e) => TusError(e).into_response(),
    }
}

async fn patch_inner(state: &TusState, raw_upload_id: &str, headers: &HeaderMap, body: Bytes) -> Result<crate::PatchOutcome, Error> {
    let id = decode_for_tenant(state, raw_upload_id)?;
    let offset = parse_length(headers, "upload-offset")?.ok_or_else(|| Error::invalid_parameter("missing Upload-Offset"))?;
    let declared_length = parse_length(headers, "upload-length")?;
    state.coordinator.patch(&id.version, offset, body, declared_length).await
}

/// Decodes an upload id and confirms it belongs to the tenant this
/// [`TusState`] was built for — a client cannot reach across tenants by
/// guessing another tenant's upload id.
fn decode_for_tenant(state: &TusState, raw_upload_id: &str) -> Result<UploadId, Error> {
    let id = UploadId::decode(raw_upload_id, state.use_file_version_separator)?;
    if id.tenant != state.tenant {
        return Err(Error::NoSuchUpload(raw_upload_id.to_string()));
    }
    Ok(id)
}

/// `HEAD /{prefix}/{upload_id}`: reports the current committed offset.
pub async fn head(State(state): State<TusState>, Path(upload_id): Path<String>) -> Response {
    let id = match decode_for_tenant(&state, &upload_id) {
        Ok(id) => id,
        Err(e) => return TusError(e).into_response(),
    };
    match state.coordinator.offset(&id.version).await {
        Ok(offset) => {
            let mut response = Response::builder()
                .status(StatusCode::NO_CONTENT)
                .header("Upload-Offset", offset.to_string())
                .header(header::CACHE_CONTROL, "no-store")
                .body(axum::body::Body::empty())
                .unwrap();
            response.headers_mut().insert("Tus-Resumable", HeaderValue::from_static(TUS_VERSION));
            response
        }
        Err(e) => TusError(e).into_response(),
    }
}

/// `DELETE /{prefix}/{upload_id}`: abandons an in-flight upload.
pub async fn delete(State(state): State<TusState>, Path(upload_id): Path<String>) -> Response {
    let id = match decode_for_tenant(&state, &upload_id) {
        Ok(id) => id,
        Err(e) => return TusError(e).into_response(),
    };
    match state.coordinator.abort(&id.version).await {
        Ok(()) => {
            let mut response = Response::builder().status(StatusCode::NO_CONTENT).body(axum::body::Body::empty()).unwrap();
            response.headers_mut().insert("Tus-Resumable", HeaderValue::from_static(TUS_VERSION));
            response
        }
        Err(e) => TusError(e).into_response(),
    }
}

/// `OPTIONS /{prefix}`: advertises protocol capabilities, per TUS's
/// discovery extension.
pub async fn options() -> Response {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Tus-Resumable", TUS_VERSION)
        .header("Tus-Version", TUS_VERSION)
        .header("Tus-Extension", "creation,expiration")
        .body(axum::body::Body::empty())
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_length_rejects_non_numeric_header() {
        let mut headers = HeaderMap::new();
        headers.insert("upload-length", HeaderValue::from_static("not-a-number"));
        assert!(parse_length(&headers, "upload-length").is_err());
    }

    #[test]
    fn parse_length_absent_header_is_none() {
        let headers = HeaderMap::new();
        assert_eq!(parse_length(&headers, "upload-length").unwrap(), None);
    }
}
