//! Multi-tenant dispatch (§4.1 tenant resolution): mounted at
//! `/{tenant}/{*rest}`, this resolves the tenant from the URL path prefix,
//! authenticates the request against that tenant's credentials, and
//! forwards it into a freshly built `gateway-s3`/`gateway-tus` sub-router
//! with the `/{tenant}` prefix stripped.
//!
//! Single-tenant deployments skip all of this: `gateway_s3::s3_router`/
//! `gateway_tus::tus_router` are mounted directly at root in `main.rs`,
//! since a deployment with exactly one tenant has no prefix to resolve.

use crate::tenant_runtime;
use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::uri::{PathAndQuery, Uri};
use axum::response::{IntoResponse, Response};
use gateway_auth::RequestAuthenticator;
use gateway_blob::BlobBackend;
use gateway_rest::rest_router;
use gateway_rest::handlers::RestState;
use gateway_s3::{s3_router, S3Error};
use gateway_s3::handlers::S3State;
use gateway_tenant::TenantPoolCache;
use gateway_tus::tus_router;
use gateway_tus::handlers::TusState;
use std::sync::Arc;
use tower::ServiceExt;

pub struct DispatchState {
    pub tenants: Arc<TenantPoolCache>,
    pub blob: Arc<dyn BlobBackend>,
    pub authenticator: RequestAuthenticator,
    pub global_file_size_limit: u64,
    pub tus_base_path: String,
    pub s3_protocol_enabled: bool,
}

pub async fn dispatch_root(state: State<Arc<DispatchState>>, Path(tenant): Path<String>, request: Request) -> Response {
    dispatch_inner(state, tenant, String::new(), request).await
}

pub async fn dispatch(
    state: State<Arc<DispatchState>>,
    Path((tenant, rest)): Path<(String, String)>,
    request: Request,
) -> Response {
    dispatch_inner(state, tenant, rest, request).await
}

async fn dispatch_inner(State(state): State<Arc<DispatchState>>, tenant: String, rest: String, mut request: Request) -> Response {
    let ctx = match tenant_runtime::tenant_context(&tenant, &state.tenants, &state.blob, state.global_file_size_limit).await {
        Ok(ctx) => ctx,
        Err(e) => return S3Error::new(gateway_common::Error::TenantNotFound(e.to_string()), format!("/{tenant}")).into_response(),
    };

    let (auth_result, chunk_ctx) = match state.authenticator.authenticate(&request, Some(tenant.as_str()), Some(ctx.handle.config.jwt_secret.as_str())).await {
        Ok(result) => result,
        Err(e) => return S3Error::new(e, format!("/{tenant}")).into_response(),
    };
    request.extensions_mut().insert(auth_result);
    if let Some(chunk_ctx) = chunk_ctx {
        request.extensions_mut().insert(chunk_ctx);
    }

    let downstream_path = if rest.is_empty() { "/".to_string() } else { format!("/{rest}") };

    if let Some(suffix) = downstream_path.strip_prefix(state.tus_base_path.as_str()) {
        let tus_state = TusState {
            coordinator: ctx.tus.clone(),
            tenant: tenant.clone(),
            use_file_version_separator: ctx.handle.config.tus_use_file_version_separator,
            tenant_file_size_limit: ctx.handle.config.file_size_limit.map(|v| v.max(0) as u64),
        };
        let router = tus_router(tus_state);
        let rewritten = rewrite_path(request.uri(), if suffix.is_empty() { "/" } else { suffix });
        let request = rewrite_request(request, rewritten);
        return router.oneshot(request).await.expect("axum routers are infallible services");
    }

    if downstream_path.starts_with("/bucket") || downstream_path.starts_with("/object") {
        let router = rest_router(RestState { coordinator: ctx.storage.clone() });
        let rewritten = rewrite_path(request.uri(), downstream_path.as_str());
        let request = rewrite_request(request, rewritten);
        return router.oneshot(request).await.expect("axum routers are infallible services");
    }

    if !state.s3_protocol_enabled {
        return S3Error::new(gateway_common::Error::FeatureNotEnabled("s3 protocol".to_string()), downstream_path).into_response();
    }

    let router = s3_router(S3State { coordinator: ctx.storage.clone() });
    let rewritten = rewrite_path(request.uri(), downstream_path.as_str());
    let request = rewrite_request(request, rewritten);
    router.oneshot(request).await.expect("axum routers are infallible services")
}

fn rewrite_path(uri: &Uri, new_path: &str) -> Uri {
    let mut parts = uri.clone().into_parts();
    let path_and_query = match uri.query() {
        Some(q) => format!("{new_path}?{q}"),
        None => new_path.to_string(),
    };
    parts.path_and_query = PathAndQuery::try_from(path_and_query).ok();
    Uri::from_parts(parts).unwrap_or_else(|_| uri.clone())
}

fn rewrite_request(mut request: Request<Body>, uri: Uri) -> Request<Body> {
    *request.uri_mut() = uri;
    request
}
