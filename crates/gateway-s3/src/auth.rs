//! Request-level authentication dispatch (§4.6): picks SigV4 or JWT bearer
//! per request. "A request may alternatively present a JWT bearer; when
//! both are present SigV4 wins." SigV4 resolves its own tenant from the
//! access key; JWT carries no tenant hint, so the caller must already have
//! resolved one (via host/path, §4.1) before falling back to it.

use axum::http::Request;
use gateway_auth::{verify_bearer_token, AccessKeyStore, AuthError, AuthResult, ChunkSigningContext, SigV4Verifier};
use gateway_common::Error;
use std::sync::Arc;

pub(crate) fn auth_error_to_error(err: AuthError) -> Error {
    match err {
        AuthError::InvalidJwt(msg) => Error::InvalidJwt(msg),
        AuthError::RequestExpired => Error::ExpiredSignature,
        AuthError::SignatureMismatch
        | AuthError::InvalidSignatureVersion
        | AuthError::ChunkSignatureMismatch
        | AuthError::ChunkLengthMismatch
        | AuthError::MalformedChunk => Error::InvalidSignature,
        AuthError::AccessKeyNotFound(_) | AuthError::AccessKeyInactive | AuthError::TenantSuspended => {
            Error::AccessDenied
        }
        AuthError::AccessDenied => Error::AccessDenied,
        AuthError::MissingAuthHeader
        | AuthError::InvalidAuthHeader
        | AuthError::MissingSignedHeader(_)
        | AuthError::InvalidDateFormat
        | AuthError::MissingDateHeader
        | AuthError::MissingBearerToken => Error::invalid_parameter(err.to_string()),
        AuthError::AccessKeyAlreadyExists(_) => Error::ResourceAlreadyExists(err.to_string()),
        AuthError::Internal(msg) => Error::internal(msg),
    }
}

fn has_sigv4_header<B>(request: &Request<B>) -> bool {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("AWS4-HMAC-SHA256"))
}

/// Dispatches an incoming request to SigV4 or JWT verification.
pub struct RequestAuthenticator {
    sigv4: SigV4Verifier,
}

impl RequestAuthenticator {
    #[must_use]
    pub fn new(key_store: Arc<dyn AccessKeyStore>, region: impl Into<String>) -> Self {
        Self { sigv4: SigV4Verifier::new(key_store, region) }
    }

    /// `resolved_tenant_jwt_secret` is the decrypted `jwt_secret` of the
    /// tenant already resolved for this request (host/path, §4.1); only
    /// consulted when the request carries a bearer token instead of SigV4.
    ///
    /// A `STREAMING-AWS4-HMAC-SHA256-PAYLOAD` request comes back with a
    /// [`ChunkSigningContext`]; the caller must thread it to wherever the
    /// body is later decoded (the router inserts it as a request extension
    /// for the PUT dispatch to pick up) — this only verifies headers, it
    /// never touches the body.
    pub async fn authenticate<B>(
        &self,
        request: &Request<B>,
        resolved_tenant_id: Option<&str>,
        resolved_tenant_jwt_secret: Option<&str>,
    ) -> Result<(AuthResult, Option<ChunkSigningContext>), Error> {
        if has_sigv4_header(request) {
            return self.sigv4.verify_streaming(request).await.map_err(auth_error_to_error);
        }

        let header = request
            .headers()
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingAuthHeader)
            .map_err(auth_error_to_error)?;
        let token = header.strip_prefix("Bearer ").map(str::trim).filter(|s| !s.is_empty());
        let token = token.ok_or(AuthError::MissingBearerToken).map_err(auth_error_to_error)?;

        let tenant_id = resolved_tenant_id.ok_or(AuthError::MissingAuthHeader).map_err(auth_error_to_error)?;
        let secret = resolved_tenant_jwt_secret.ok_or(AuthError::MissingAuthHeader).map_err(auth_error_to_error)?;
        let claims = verify_bearer_token(token, secret).map_err(auth_error_to_error)?;

        Ok((AuthResult { tenant_id: tenant_id.to_string(), access_key_id: None, owner: Some(claims.sub) }, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, Request};

    #[test]
    fn detects_sigv4_header() {
        let request = Request::builder()
            .header(header::AUTHORIZATION, "AWS4-HMAC-SHA256 Credential=AKIA.../20240101/us-east-1/s3/aws4_request")
            .body(())
            .unwrap();
        assert!(has_sigv4_header(&request));
    }

    #[test]
    fn bearer_header_is_not_sigv4() {
        let request = Request::builder().header(header::AUTHORIZATION, "Bearer abc.def.ghi").body(()).unwrap();
        assert!(!has_sigv4_header(&request));
    }

    #[test]
    fn auth_error_maps_to_domain_error() {
        assert_eq!(auth_error_to_error(AuthError::RequestExpired).s3_error_code(), "ExpiredSignature");
        assert_eq!(auth_error_to_error(AuthError::SignatureMismatch).s3_error_code(), "SignatureDoesNotMatch");
        assert_eq!(auth_error_to_error(AuthError::AccessKeyNotFound("x".into())).s3_error_code(), "AccessDenied");
    }
}
