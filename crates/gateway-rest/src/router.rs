//! The native route table (§6): unlike `gateway-s3`'s method+query
//! dispatch, every native sub-path names its own operation, so this is a
//! plain route list split into a `/bucket` and an `/object` router that
//! `bin/gateway` nests under the matching prefixes.

use crate::handlers::{self, RestState};
use axum::routing::{delete, get, post, put};
use axum::Router;

#[must_use]
pub fn rest_router(state: RestState) -> Router {
    Router::new().merge(bucket_router(state.clone())).merge(object_router(state))
}

fn bucket_router(state: RestState) -> Router {
    Router::new()
        .route("/bucket", post(handlers::create_bucket))
        .route("/bucket", get(handlers::list_buckets))
        .route("/bucket/{id}", get(handlers::get_bucket))
        .route("/bucket/{id}", put(handlers::update_bucket))
        .route("/bucket/{id}", delete(handlers::delete_bucket))
        .route("/bucket/{id}/empty", post(handlers::empty_bucket))
        .with_state(state)
}

fn object_router(state: RestState) -> Router {
    Router::new()
        .route("/object/public/{bucket}/{*key}", get(handlers::get_public_object))
        .route("/object/authenticated/{bucket}/{*key}", get(handlers::get_authenticated_object))
        .route("/object/sign/{bucket}/{*key}", get(handlers::sign_object))
        .route("/object/upload/sign/{bucket}/{*key}", get(handlers::sign_upload_object))
        .route("/object/info/{bucket}/{*key}", get(handlers::object_info))
        .route("/object/list/{bucket}", get(handlers::list_objects))
        .route("/object/list-v2/{bucket}", post(handlers::list_objects_v2))
        .route("/object/copy", post(handlers::copy_object))
        .route("/object/move", post(handlers::move_object))
        .route("/object/{bucket}/{*key}", put(handlers::upload_object))
        .route("/object/{bucket}/{*key}", delete(handlers::delete_object))
        .with_state(state)
}
