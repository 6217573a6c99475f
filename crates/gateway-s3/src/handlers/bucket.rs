//! `CreateBucket`, `HeadBucket`, `DeleteBucket`, `ListBuckets`,
//! `GetBucketLocation`, `GetBucketVersioning`, `ListObjectsV2` (§4.5).

use crate::error::S3Error;
use crate::handlers::S3State;
use crate::xml::{
    self, Buckets, CommonPrefix, ListBucketResult, ListBucketsResult, ObjectContent, XmlOwner,
};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use gateway_common::types::BucketType;
use gateway_metastore::{ListObjectsV2Query, SortBy};
use serde::Deserialize;

fn xml_response(status: StatusCode, xml: String) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/xml")
        .body(Body::from(xml))
        .unwrap()
}

pub async fn list_buckets(State(state): State<S3State>) -> Response {
    match state.coordinator.list_buckets().await {
        Ok(buckets) => {
            let result = ListBucketsResult {
                owner: XmlOwner { id: "tenant".to_string(), display_name: "tenant".to_string() },
                buckets: Buckets {
                    bucket: buckets
                        .into_iter()
                        .map(|b| xml::BucketEntry {
                            name: b.name,
                            creation_date: b.created_at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
                        })
                        .collect(),
                },
            };
            xml_response(StatusCode::OK, xml::to_xml_document(&result))
        }
        Err(e) => S3Error::new(e, "/").into_response(),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct CreateBucketParams {
    #[serde(default)]
    pub public: bool,
}

pub async fn create_bucket(
    State(state): State<S3State>,
    Path(bucket): Path<String>,
    Query(params): Query<CreateBucketParams>,
) -> Response {
    match state
        .coordinator
        .create_bucket(&bucket, params.public, None, None, None, BucketType::Standard)
        .await
    {
        Ok(_) => Response::builder()
            .status(StatusCode::OK)
            .header("Location", format!("/{bucket}"))
            .body(Body::empty())
            .unwrap(),
        Err(e) => S3Error::new(e, format!("/{bucket}")).into_response(),
    }
}

pub async fn head_bucket(State(state): State<S3State>, Path(bucket): Path<String>) -> Response {
    match state.coordinator.find_bucket(&bucket).await {
        Ok(Some(_)) => Response::builder().status(StatusCode::OK).body(Body::empty()).unwrap(),
        Ok(None) => Response::builder().status(StatusCode::NOT_FOUND).body(Body::empty()).unwrap(),
        Err(_) => Response::builder().status(StatusCode::INTERNAL_SERVER_ERROR).body(Body::empty()).unwrap(),
    }
}

pub async fn delete_bucket(State(state): State<S3State>, Path(bucket): Path<String>) -> Response {
    match state.coordinator.delete_bucket(&bucket).await {
        Ok(()) => Response::builder().status(StatusCode::NO_CONTENT).body(Body::empty()).unwrap(),
        Err(e) => S3Error::new(e, format!("/{bucket}")).into_response(),
    }
}

/// `GetBucketLocation`/`GetBucketVersioning`: this gateway has one region
/// and no S3 bucket versioning (objects are versioned internally, §3, but
/// that's not the same as the S3 `Versioning` API), so both are static.
pub async fn get_bucket_location(Path(_bucket): Path<String>) -> Response {
    xml_response(StatusCode::OK, xml::to_xml_document(&xml::LocationConstraint { value: String::new() }))
}

pub async fn get_bucket_versioning() -> Response {
    xml_response(
        StatusCode::OK,
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<VersioningConfiguration xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\"/>"
            .to_string(),
    )
}

#[derive(Debug, Deserialize, Default)]
pub struct ListObjectsV2Params {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    #[serde(rename = "continuation-token")]
    pub continuation_token: Option<String>,
    #[serde(rename = "start-after")]
    pub start_after: Option<String>,
    #[serde(rename = "max-keys")]
    pub max_keys: Option<i64>,
}

pub async fn list_objects_v2(
    State(state): State<S3State>,
    Path(bucket): Path<String>,
    Query(params): Query<ListObjectsV2Params>,
) -> Response {
    let Ok(Some(bucket_row)) = state.coordinator.find_bucket(&bucket).await else {
        return S3Error::new(gateway_common::Error::NoSuchBucket(bucket.clone()), format!("/{bucket}"))
            .into_response();
    };

    let prefix = params.prefix.clone().unwrap_or_default();
    let query = ListObjectsV2Query {
        bucket_id: &bucket_row.id,
        prefix: &prefix,
        delimiter: params.delimiter.as_deref(),
        start_after: params.start_after.as_deref(),
        continuation_token: params.continuation_token.as_deref(),
        max_keys: params.max_keys.unwrap_or(1000).clamp(1, 1000),
        sort_by: SortBy::Name,
    };

    match state.coordinator.list_objects_v2(&query).await {
        Ok(page) => {
            let key_count = page.objects.len() as u32;
            let result = ListBucketResult {
                name: bucket,
                prefix: prefix.clone(),
                delimiter: params.delimiter.clone(),
                max_keys: query.max_keys as u32,
                key_count,
                is_truncated: page.next_continuation_token.is_some(),
                continuation_token: params.continuation_token,
                next_continuation_token: page.next_continuation_token,
                common_prefixes: page.common_prefixes.into_iter().map(|prefix| CommonPrefix { prefix }).collect(),
                contents: page.objects.iter().map(ObjectContent::from_object).collect(),
            };
            xml_response(StatusCode::OK, xml::to_xml_document(&result))
        }
        Err(e) => S3Error::new(e, format!("/{bucket}")).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_keys_clamps_to_aws_ceiling() {
        let params = ListObjectsV2Params { max_keys: Some(50_000), ..Default::default() };
        assert_eq!(params.max_keys.unwrap_or(1000).clamp(1, 1000), 1000);
    }

    #[test]
    fn max_keys_defaults_to_1000() {
        let params = ListObjectsV2Params::default();
        assert_eq!(params.max_keys.unwrap_or(1000).clamp(1, 1000), 1000);
    }
}
