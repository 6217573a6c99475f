//! Request metrics middleware (§4.5): classifies each request into a
//! [`S3Operation`] and records it through `gateway_s3::metrics`. A
//! separate layer, rather than recording inside each handler, because the
//! router dispatches by method and query string (see `gateway-s3`'s own
//! `router.rs`) and the operation isn't known until after that parsing.

use axum::body::Body;
use axum::extract::Request;
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use gateway_s3::metrics::{OperationTimer, S3Operation};

/// Extract S3 operation type from HTTP method and path shape alone.
fn extract_operation(method: &Method, path: &str) -> Option<S3Operation> {
    let path = path.split('?').next().unwrap_or(path);
    let path = path.trim_start_matches('/');
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method, segments.as_slice()) {
        (m, []) if m == Method::GET => Some(S3Operation::ListBuckets),
        (m, [_bucket]) if m == Method::GET => Some(S3Operation::ListObjects),
        (m, [_bucket]) if m == Method::PUT => Some(S3Operation::CreateBucket),
        (m, [_bucket]) if m == Method::DELETE => Some(S3Operation::DeleteBucket),
        (m, [_bucket]) if m == Method::HEAD => Some(S3Operation::HeadBucket),
        (m, [_bucket]) if m == Method::POST => Some(S3Operation::DeleteObjects),
        (m, [_bucket, ..]) if m == Method::GET => Some(S3Operation::GetObject),
        (m, [_bucket, ..]) if m == Method::PUT => Some(S3Operation::PutObject),
        (m, [_bucket, ..]) if m == Method::DELETE => Some(S3Operation::DeleteObject),
        (m, [_bucket, ..]) if m == Method::HEAD => Some(S3Operation::HeadObject),
        (m, [_bucket, ..]) if m == Method::POST => Some(S3Operation::CreateMultipartUpload),
        _ => None,
    }
}

/// Refine operation type based on query parameters, the same way
/// `gateway-s3`'s router steers one method/path toward different
/// operations using `?uploadId`, `?partNumber`, `?uploads`, `?tagging`.
fn refine_operation(op: S3Operation, query: Option<&str>) -> S3Operation {
    let query = match query {
        Some(q) if !q.is_empty() => q,
        _ => return op,
    };

    match op {
        S3Operation::PutObject if query.contains("uploadId") && query.contains("partNumber") => {
            if query.contains("x-amz-copy-source") {
                S3Operation::UploadPartCopy
            } else {
                S3Operation::UploadPart
            }
        }
        S3Operation::GetObject if query.contains("uploadId") => S3Operation::ListParts,
        S3Operation::GetObject if query.contains("tagging") => S3Operation::GetObjectTagging,
        S3Operation::ListObjects if query.contains("uploads") => S3Operation::ListMultipartUploads,
        S3Operation::DeleteObject if query.contains("uploadId") => S3Operation::AbortMultipartUpload,
        S3Operation::CreateMultipartUpload if query.contains("uploadId") => S3Operation::CompleteMultipartUpload,
        _ => op,
    }
}

/// Metrics middleware that records S3 operation metrics for every request
/// except the metrics/health endpoints themselves.
pub async fn metrics_layer(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = uri.path();

    if path == "/metrics" || path == "/health" {
        return next.run(request).await;
    }

    let op = extract_operation(&method, path).map(|op| refine_operation(op, uri.query()));
    let request_bytes = request
        .headers()
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let response = next.run(request).await;

    if let Some(op) = op {
        let response_bytes = response
            .headers()
            .get(axum::http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        OperationTimer::new(op).with_request_bytes(request_bytes).complete(response.status().as_u16(), response_bytes);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_list_buckets() {
        assert_eq!(extract_operation(&Method::GET, "/"), Some(S3Operation::ListBuckets));
    }

    #[test]
    fn extract_put_object_under_nested_key() {
        assert_eq!(extract_operation(&Method::PUT, "/mybucket/a/b.txt"), Some(S3Operation::PutObject));
    }

    #[test]
    fn refine_upload_part_from_query() {
        let op = refine_operation(S3Operation::PutObject, Some("uploadId=abc&partNumber=1"));
        assert_eq!(op, S3Operation::UploadPart);
    }

    #[test]
    fn refine_list_multipart_uploads_from_query() {
        let op = refine_operation(S3Operation::ListObjects, Some("uploads"));
        assert_eq!(op, S3Operation::ListMultipartUploads);
    }

    #[test]
    fn unrecognized_method_path_shape_is_none() {
        assert_eq!(extract_operation(&Method::OPTIONS, "/"), None);
    }
}
