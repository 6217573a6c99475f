//! AWS SigV4 presigned URL generation
//!
//! Generates pre-signed URLs for S3-compatible object storage, used for
//! both download (`GET`) and direct-upload (`PUT`) flows per
//! `SIGNED_URL_UPLOAD_EXPIRATION_SEC` / `UPLOAD_SIGNED_URL_EXPIRATION_SEC`
//! (§6). The generated URLs are verified by the same [`crate::sigv4`]
//! canonical-request machinery used for header-signed requests.
//!
//! Reference: <https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-query-string-auth.html>

use crate::sigv4::derive_signing_key;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Percent-encode a string for use in a URL query string value or path segment.
/// Leaves unreserved characters (A-Z, a-z, 0-9, `-`, `_`, `.`, `~`) unchanged.
fn uri_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            _ => {
                out.push('%');
                out.push(
                    char::from_digit(u32::from(b >> 4), 16)
                        .unwrap()
                        .to_ascii_uppercase(),
                );
                out.push(
                    char::from_digit(u32::from(b & 0xf), 16)
                        .unwrap()
                        .to_ascii_uppercase(),
                );
            }
        }
    }
    out
}

/// Generate a presigned S3 URL for `method` (`"GET"` or `"PUT"`).
///
/// # Arguments
/// - `method` — HTTP method the signature authorizes
/// - `endpoint` — base URL of the gateway (e.g. `http://localhost:9000`)
/// - `region` — AWS region string used in the credential scope (e.g. `"us-east-1"`)
/// - `access_key_id` — access key ID credential
/// - `secret_access_key` — secret access key used to sign
/// - `bucket` — bucket name
/// - `key` — object key (path inside bucket)
/// - `expires_in` — how long the URL should be valid
///
/// The returned URL can be fetched/uploaded to with a plain HTTP request
/// of the authorized method, no additional headers required.
#[must_use]
pub fn presign_url(
    method: &str,
    endpoint: &str,
    region: &str,
    access_key_id: &str,
    secret_access_key: &str,
    bucket: &str,
    key: &str,
    expires_in: Duration,
) -> String {
    let now = Utc::now();
    let date_str = now.format("%Y%m%d").to_string();
    let datetime_str = now.format("%Y%m%dT%H%M%SZ").to_string();
    let expires_secs = expires_in.as_secs();

    let service = "s3";
    let credential_scope = format!("{date_str}/{region}/{service}/aws4_request");
    let credential = format!("{access_key_id}/{credential_scope}");

    let host = endpoint
        .trim_start_matches("https://")
        .trim_start_matches("http://");

    let canonical_qs = format!(
        "X-Amz-Algorithm=AWS4-HMAC-SHA256\
         &X-Amz-Credential={cred}\
         &X-Amz-Date={dt}\
         &X-Amz-Expires={exp}\
         &X-Amz-SignedHeaders=host",
        cred = uri_encode(&credential),
        dt = datetime_str,
        exp = expires_secs,
    );

    let canonical_uri = format!(
        "/{}/{}",
        uri_encode(bucket),
        key.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
    );

    let canonical_headers = format!("host:{host}\n");
    let signed_headers = "host";

    let canonical_request = format!(
        "{method}\n{canonical_uri}\n{canonical_qs}\n{canonical_headers}\n{signed_headers}\nUNSIGNED-PAYLOAD"
    );

    let cr_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    let string_to_sign =
        format!("AWS4-HMAC-SHA256\n{datetime_str}\n{credential_scope}\n{cr_hash}");

    let signing_key = derive_signing_key(secret_access_key, &date_str, region, service);

    let mut mac = HmacSha256::new_from_slice(&signing_key).expect("HMAC accepts any key length");
    mac.update(string_to_sign.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    format!(
        "{}{canonical_uri}?{canonical_qs}&X-Amz-Signature={signature}",
        endpoint.trim_end_matches('/'),
    )
}

/// Presigned download URL, thin wrapper over [`presign_url`] for the
/// common `GET` case.
#[must_use]
pub fn presign_get(
    endpoint: &str,
    region: &str,
    access_key_id: &str,
    secret_access_key: &str,
    bucket: &str,
    key: &str,
    expires_in: Duration,
) -> String {
    presign_url(
        "GET",
        endpoint,
        region,
        access_key_id,
        secret_access_key,
        bucket,
        key,
        expires_in,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presign_get_produces_valid_url() {
        let url = presign_get(
            "http://localhost:9000",
            "us-east-1",
            "AKID",
            "secret",
            "my-bucket",
            "path/to/file.parquet",
            Duration::from_secs(3600),
        );
        assert!(url.starts_with("http://localhost:9000/my-bucket/path/to/file.parquet"));
        assert!(url.contains("X-Amz-Algorithm=AWS4-HMAC-SHA256"));
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains("X-Amz-Expires=3600"));
    }

    #[test]
    fn presign_put_uses_put_method_in_signature() {
        let get_url = presign_url(
            "GET", "http://localhost:9000", "us-east-1", "AKID", "secret", "my-bucket", "key",
            Duration::from_secs(60),
        );
        let put_url = presign_url(
            "PUT", "http://localhost:9000", "us-east-1", "AKID", "secret", "my-bucket", "key",
            Duration::from_secs(60),
        );
        assert_ne!(get_url, put_url);
    }
}
