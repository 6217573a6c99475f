//! TUS error responses. Unlike S3's XML error bodies, TUS clients key off
//! status code and headers alone — the body is just the message, for logs.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use gateway_common::Error;

use crate::TUS_VERSION;

pub struct TusError(pub Error);

impl From<Error> for TusError {
    fn from(inner: Error) -> Self {
        Self(inner)
    }
}

impl IntoResponse for TusError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.0.to_string()).into_response();
        response.headers_mut().insert("Tus-Resumable", HeaderValue::from_static(TUS_VERSION));
        response
    }
}
