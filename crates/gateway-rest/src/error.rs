//! Native JSON error responses (§6, §7): every `gateway_common::Error`
//! raised by a handler is rendered as `{statusCode, error, message}`,
//! mirroring `gateway-s3`'s XML rendering but for the native surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_common::Error;
use serde::Serialize;

#[derive(Serialize)]
pub struct RestErrorBody {
    #[serde(rename = "statusCode")]
    pub status_code: String,
    pub error: String,
    pub message: String,
}

pub struct RestError {
    pub inner: Error,
}

impl RestError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.inner.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn body(&self) -> RestErrorBody {
        RestErrorBody {
            status_code: self.status().as_u16().to_string(),
            error: self.inner.native_error_code().to_string(),
            message: self.inner.to_string(),
        }
    }
}

impl From<Error> for RestError {
    fn from(inner: Error) -> Self {
        Self { inner }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_no_such_key_with_native_spelling() {
        let err = RestError::from(Error::NoSuchKey { bucket: "avatars".into(), key: "cat.png".into() });
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.body().error, "NoSuchKey");
    }

    #[test]
    fn renders_resource_already_exists_as_key_already_exists() {
        let err = RestError::from(Error::ResourceAlreadyExists("avatars/cat.png".into()));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.body().error, "KeyAlreadyExists");
    }

    #[test]
    fn falls_back_to_the_s3_code_for_everything_else() {
        let err = RestError::from(Error::BucketAlreadyExists("avatars".into()));
        assert_eq!(err.body().error, "BucketAlreadyExists");
    }
}
