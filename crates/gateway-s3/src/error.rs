//! S3 XML error responses (§4.5, §7): every `gateway_common::Error` raised
//! by a handler is rendered here with `Code`, `Message`, `Resource` (the
//! request URL minus the `/s3` mount prefix) and a fresh `RequestId`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gateway_common::Error;
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize)]
#[serde(rename = "Error")]
pub struct S3ErrorBody {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Resource")]
    pub resource: String,
    #[serde(rename = "RequestId")]
    pub request_id: String,
}

/// Wraps a domain error with the request context needed to render it;
/// constructed by the router right before a handler's `Result::Err` is
/// turned into an HTTP response.
pub struct S3Error {
    pub inner: Error,
    pub resource: String,
}

impl S3Error {
    #[must_use]
    pub fn new(inner: Error, resource: impl Into<String>) -> Self {
        Self { inner, resource: resource.into() }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.inner.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn body(&self) -> S3ErrorBody {
        S3ErrorBody {
            code: self.inner.s3_error_code().to_string(),
            message: self.inner.to_string(),
            resource: self.resource.clone(),
            request_id: Uuid::new_v4().to_string(),
        }
    }
}

impl From<Error> for S3Error {
    fn from(inner: Error) -> Self {
        Self { inner, resource: String::new() }
    }
}

impl IntoResponse for S3Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.body();
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}",
            quick_xml::se::to_string(&body).unwrap_or_default()
        );
        (status, [("Content-Type", "application/xml")], xml).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_not_found_with_resource_and_status() {
        let err = S3Error::new(Error::NoSuchBucket("photos".into()), "/photos");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.body().code, "NoSuchBucket");
        assert_eq!(err.body().resource, "/photos");
    }

    #[test]
    fn database_pool_exhaustion_surfaces_as_slow_down() {
        let err = S3Error::new(Error::SlowDown, "/photos/cat.png");
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.body().code, "SlowDown");
    }
}
