//! Authentication middleware for single-tenant deployments (§4.1, §4.6):
//! a thin `axum::middleware::from_fn_with_state` wrapper around
//! [`RequestAuthenticator`], inserting the resolved [`AuthResult`] (and, for
//! a streaming-SigV4 request, its `ChunkSigningContext`) into request
//! extensions the way `gateway-s3`'s router expects to find them.
//!
//! Multi-tenant deployments don't use this layer at all — tenant
//! resolution there happens per-request inside `dispatch.rs`, since the
//! tenant (and therefore its `jwt_secret`) isn't known until the URL path
//! prefix is parsed, which a static `from_fn_with_state` layer bound at
//! router-build time can't do.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use gateway_s3::RequestAuthenticator;
use gateway_s3::S3Error;
use std::sync::Arc;

pub struct AuthState {
    pub authenticator: RequestAuthenticator,
    pub tenant_id: String,
    pub jwt_secret: Option<String>,
}

impl AuthState {
    #[must_use]
    pub fn new(authenticator: RequestAuthenticator, tenant_id: impl Into<String>, jwt_secret: Option<String>) -> Self {
        Self { authenticator, tenant_id: tenant_id.into(), jwt_secret }
    }
}

pub async fn auth_layer(State(state): State<Arc<AuthState>>, mut request: Request<Body>, next: Next) -> Response {
    let path = request.uri().path();
    if path == "/metrics" || path == "/health" {
        return next.run(request).await;
    }

    match state.authenticator.authenticate(&request, Some(state.tenant_id.as_str()), state.jwt_secret.as_deref()).await {
        Ok((auth_result, chunk_ctx)) => {
            request.extensions_mut().insert(auth_result);
            if let Some(chunk_ctx) = chunk_ctx {
                request.extensions_mut().insert(chunk_ctx);
            }
            next.run(request).await
        }
        Err(e) => S3Error::new(e, path.to_string()).into_response(),
    }
}
