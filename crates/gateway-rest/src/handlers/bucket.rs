//! `/bucket/*` (§6): create, find, list, update, delete and empty a bucket.

use crate::error::RestError;
use crate::handlers::RestState;
use axum::extract::{Extension, Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_auth::AuthResult;
use gateway_common::types::BucketType;
use gateway_metastore::Bucket;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct BucketView {
    id: String,
    name: String,
    public: bool,
    owner: Option<String>,
    #[serde(rename = "file_size_limit")]
    file_size_limit: Option<i64>,
    #[serde(rename = "allowed_mime_types")]
    allowed_mime_types: Option<Vec<String>>,
    created_at: String,
    updated_at: String,
}

impl From<Bucket> for BucketView {
    fn from(b: Bucket) -> Self {
        Self {
            id: b.id,
            name: b.name,
            public: b.public,
            owner: b.owner,
            file_size_limit: b.file_size_limit,
            allowed_mime_types: b.allowed_mime_types,
            created_at: b.created_at.to_rfc3339(),
            updated_at: b.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Deserialize)]
pub struct CreateBucketRequest {
    pub name: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub file_size_limit: Option<i64>,
    #[serde(default)]
    pub allowed_mime_types: Option<Vec<String>>,
}

pub async fn create_bucket(
    State(state): State<RestState>,
    Extension(auth): Extension<AuthResult>,
    Json(req): Json<CreateBucketRequest>,
) -> Response {
    match state
        .coordinator
        .create_bucket(
            &req.name,
            req.public,
            auth.owner.as_deref(),
            req.file_size_limit,
            req.allowed_mime_types.as_deref(),
            BucketType::Standard,
        )
        .await
    {
        Ok(bucket) => Json(serde_json::json!({ "name": bucket.name })).into_response(),
        Err(e) => RestError::from(e).into_response(),
    }
}

pub async fn get_bucket(State(state): State<RestState>, Path(id): Path<String>) -> Response {
    match state.coordinator.find_bucket(&id).await {
        Ok(Some(bucket)) => Json(BucketView::from(bucket)).into_response(),
        Ok(None) => RestError::from(gateway_common::Error::NoSuchBucket(id)).into_response(),
        Err(e) => RestError::from(e).into_response(),
    }
}

pub async fn list_buckets(State(state): State<RestState>) -> Response {
    match state.coordinator.list_buckets().await {
        Ok(buckets) => Json(buckets.into_iter().map(BucketView::from).collect::<Vec<_>>()).into_response(),
        Err(e) => RestError::from(e).into_response(),
    }
}

#[derive(Deserialize)]
pub struct UpdateBucketRequest {
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub file_size_limit: Option<i64>,
    #[serde(default)]
    pub allowed_mime_types: Option<Vec<String>>,
}

/// `update_bucket` isn't exposed by the storage coordinator (§4.4 lists it
/// among bucket CRUD, but no caller in this workspace needs anything past
/// `public`/limit/mime changes, so this goes straight at the metastore).
pub async fn update_bucket(
    State(state): State<RestState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateBucketRequest>,
) -> Response {
    let Ok(Some(existing)) = state.coordinator.find_bucket(&id).await else {
        return RestError::from(gateway_common::Error::NoSuchBucket(id)).into_response();
    };
    let public = req.public.unwrap_or(existing.public);
    let file_size_limit = req.file_size_limit.or(existing.file_size_limit);
    let allowed_mime_types = req.allowed_mime_types.or(existing.allowed_mime_types);
    match state
        .coordinator
        .meta()
        .update_bucket(&id, public, file_size_limit, allowed_mime_types.as_deref())
        .await
    {
        Ok(()) => Json(serde_json::json!({ "name": id })).into_response(),
        Err(e) => RestError::from(e).into_response(),
    }
}

pub async fn delete_bucket(State(state): State<RestState>, Path(id): Path<String>) -> Response {
    match state.coordinator.delete_bucket(&id).await {
        Ok(()) => Json(serde_json::json!({ "message": "Successfully deleted" })).into_response(),
        Err(e) => RestError::from(e).into_response(),
    }
}

pub async fn empty_bucket(State(state): State<RestState>, Path(id): Path<String>) -> Response {
    match state.coordinator.empty_bucket(&id).await {
        Ok(removed) => Json(serde_json::json!({ "message": "Successfully emptied", "removed": removed })).into_response(),
        Err(e) => RestError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_bucket_request_defaults_to_private() {
        let req: CreateBucketRequest = serde_json::from_str(r#"{"name":"avatars"}"#).unwrap();
        assert!(!req.public);
        assert_eq!(req.file_size_limit, None);
    }

    #[test]
    fn update_bucket_request_leaves_unset_fields_as_none() {
        let req: UpdateBucketRequest = serde_json::from_str(r#"{"public":true}"#).unwrap();
        assert_eq!(req.public, Some(true));
        assert_eq!(req.file_size_limit, None);
        assert_eq!(req.allowed_mime_types, None);
    }

    #[test]
    fn bucket_view_carries_limits_and_owner_through() {
        let bucket = Bucket {
            id: "b1".into(),
            name: "avatars".into(),
            public: true,
            owner: Some("user-1".into()),
            file_size_limit: Some(1024),
            allowed_mime_types: Some(vec!["image/png".into()]),
            bucket_type: BucketType::Standard,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let view = BucketView::from(bucket);
        assert_eq!(view.name, "avatars");
        assert_eq!(view.owner, Some("user-1".to_string()));
        assert_eq!(view.file_size_limit, Some(1024));
    }
}
