//! S3 API request handlers (§4.5). Each handler is tenant-scoped: the
//! caller (the router, C6) has already resolved which tenant this request
//! belongs to and hands down that tenant's [`StorageCoordinator`].

pub mod bucket;
pub mod multipart;
pub mod object;

use axum::http::HeaderMap;
use gateway_storage::StorageCoordinator;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub use bucket::*;
pub use multipart::*;
pub use object::*;

/// Shared handler state: one [`StorageCoordinator`] per tenant.
#[derive(Clone)]
pub struct S3State {
    pub coordinator: Arc<StorageCoordinator>,
}

const MAX_USER_METADATA_ENTRIES: usize = 256;
const MAX_USER_METADATA_BYTES: usize = 8 * 1024;

/// Pulls `x-amz-meta-*` headers into a case-insensitive `{key: value}` map,
/// capped at a header count and total-size budget (§4.5 "Metadata parsing").
#[must_use]
pub fn extract_user_metadata(headers: &HeaderMap) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    let mut budget = MAX_USER_METADATA_BYTES;
    for (name, value) in headers {
        if metadata.len() >= MAX_USER_METADATA_ENTRIES {
            break;
        }
        let name = name.as_str().to_ascii_lowercase();
        let Some(key) = name.strip_prefix("x-amz-meta-") else { continue };
        let Ok(value) = value.to_str() else { continue };
        let cost = key.len() + value.len();
        if cost > budget {
            break;
        }
        budget -= cost;
        metadata.insert(key.to_string(), value.to_string());
    }
    metadata
}

#[must_use]
pub fn user_metadata_to_json(metadata: &HashMap<String, String>) -> Option<Value> {
    if metadata.is_empty() {
        return None;
    }
    Some(Value::Object(metadata.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect()))
}

pub fn add_metadata_headers(mut builder: axum::http::response::Builder, user_metadata: &Value) -> axum::http::response::Builder {
    if let Some(map) = user_metadata.as_object() {
        for (key, value) in map {
            if let Some(value) = value.as_str() {
                builder = builder.header(format!("x-amz-meta-{key}"), value);
            }
        }
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_and_lowercases_meta_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Amz-Meta-Author", HeaderValue::from_static("alice"));
        headers.insert("Content-Type", HeaderValue::from_static("text/plain"));
        let metadata = extract_user_metadata(&headers);
        assert_eq!(metadata.get("author"), Some(&"alice".to_string()));
        assert_eq!(metadata.len(), 1);
    }

    #[test]
    fn stops_at_entry_count_cap() {
        let mut headers = HeaderMap::new();
        for i in 0..MAX_USER_METADATA_ENTRIES + 10 {
            headers.insert(
                axum::http::HeaderName::from_bytes(format!("x-amz-meta-k{i}").as_bytes()).unwrap(),
                HeaderValue::from_static("v"),
            );
        }
        assert_eq!(extract_user_metadata(&headers).len(), MAX_USER_METADATA_ENTRIES);
    }
}
