//! AWS Signature V4 verification
//!
//! Implements AWS Signature Version 4 for authenticating S3 API requests,
//! both the header-signed form and the `STREAMING-AWS4-HMAC-SHA256-PAYLOAD`
//! chunked form used by the AWS SDKs for large PUT bodies.
//! Reference: <https://docs.aws.amazon.com/AmazonS3/latest/API/sig-v4-authenticating-requests.html>

use crate::error::AuthError;
use crate::store::AccessKeyStore;
use crate::user::AuthResult;
use chrono::{DateTime, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use http::Request;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

pub const STREAMING_PAYLOAD_SENTINEL: &str = "STREAMING-AWS4-HMAC-SHA256-PAYLOAD";

/// AWS Signature V4 verifier
pub struct SigV4Verifier {
    key_store: Arc<dyn AccessKeyStore>,
    /// Service name (usually "s3")
    service: String,
    /// AWS region (e.g., "us-east-1")
    region: String,
}

impl SigV4Verifier {
    /// Create a new SigV4 verifier
    pub fn new(key_store: Arc<dyn AccessKeyStore>, region: impl Into<String>) -> Self {
        Self {
            key_store,
            service: "s3".to_string(),
            region: region.into(),
        }
    }

    /// Verify a header-signed request whose payload hash is already known
    /// (either `UNSIGNED-PAYLOAD` or a precomputed SHA256 of the body).
    pub async fn verify<B>(&self, request: &Request<B>) -> Result<AuthResult, AuthError> {
        let (auth_result, _) = self.verify_up_to_body(request).await?;
        Ok(auth_result)
    }

    /// Verify the header portion of a request and, when the content-sha256
    /// header carries the streaming sentinel, return a [`ChunkSigningContext`]
    /// seeded from this request's signature so the caller can verify the
    /// body's chunk framing as it streams in.
    pub async fn verify_streaming<B>(
        &self,
        request: &Request<B>,
    ) -> Result<(AuthResult, Option<ChunkSigningContext>), AuthError> {
        self.verify_up_to_body(request).await
    }

    async fn verify_up_to_body<B>(
        &self,
        request: &Request<B>,
    ) -> Result<(AuthResult, Option<ChunkSigningContext>), AuthError> {
        let auth_header = request
            .headers()
            .get("authorization")
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let parsed = self.parse_authorization_header(auth_header)?;

        let date_str = self.get_request_date(request)?;
        let date = self.parse_date(&date_str)?;

        let now = Utc::now();
        let diff = now.signed_duration_since(date);
        if diff.num_minutes().abs() > 15 {
            return Err(AuthError::RequestExpired);
        }

        let access_key = self.key_store.lookup(&parsed.access_key_id).await?;

        let canonical_request = self.build_canonical_request(request, &parsed.signed_headers)?;

        let date_stamp = date.format("%Y%m%d").to_string();
        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let string_to_sign =
            self.build_string_to_sign(&canonical_request, &date_str, &credential_scope);

        let signing_key =
            derive_signing_key(&access_key.secret_access_key, &date_stamp, &self.region, &self.service);
        let calculated_signature = calculate_signature(&signing_key, &string_to_sign);

        if !constant_time_eq(&calculated_signature, &parsed.signature) {
            tracing::debug!(
                canonical_request = %canonical_request,
                string_to_sign = %string_to_sign,
                "sigv4 signature mismatch"
            );
            return Err(AuthError::SignatureMismatch);
        }

        let is_streaming = request
            .headers()
            .get("x-amz-content-sha256")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == STREAMING_PAYLOAD_SENTINEL);

        let chunk_ctx = is_streaming.then(|| {
            ChunkSigningContext::new(signing_key, date_str, credential_scope, calculated_signature.clone())
        });

        Ok((
            AuthResult {
                tenant_id: access_key.tenant_id,
                access_key_id: Some(access_key.access_key_id),
                owner: None,
            },
            chunk_ctx,
        ))
    }

    /// Parse the Authorization header
    fn parse_authorization_header(&self, header: &str) -> Result<ParsedAuth, AuthError> {
        // Format: AWS4-HMAC-SHA256 Credential=AKID/date/region/service/aws4_request,
        //         SignedHeaders=host;x-amz-date, Signature=xxx
        if !header.starts_with("AWS4-HMAC-SHA256") {
            return Err(AuthError::InvalidSignatureVersion);
        }

        let re = Regex::new(
            r"AWS4-HMAC-SHA256\s+Credential=([^/]+)/[^,]+,\s*SignedHeaders=([^,]+),\s*Signature=(\w+)"
        ).unwrap();

        let captures = re.captures(header).ok_or(AuthError::InvalidAuthHeader)?;

        Ok(ParsedAuth {
            access_key_id: captures.get(1).unwrap().as_str().to_string(),
            signed_headers: captures
                .get(2)
                .unwrap()
                .as_str()
                .split(';')
                .map(str::to_lowercase)
                .collect(),
            signature: captures.get(3).unwrap().as_str().to_string(),
        })
    }

    /// Get the request date from headers
    fn get_request_date<B>(&self, request: &Request<B>) -> Result<String, AuthError> {
        if let Some(date) = request.headers().get("x-amz-date") {
            return date
                .to_str()
                .map(str::to_string)
                .map_err(|_| AuthError::InvalidDateFormat);
        }
        if let Some(date) = request.headers().get("date") {
            return date
                .to_str()
                .map(str::to_string)
                .map_err(|_| AuthError::InvalidDateFormat);
        }
        Err(AuthError::MissingDateHeader)
    }

    /// Parse ISO8601 date format
    fn parse_date(&self, date_str: &str) -> Result<DateTime<Utc>, AuthError> {
        NaiveDateTime::parse_from_str(date_str, "%Y%m%dT%H%M%SZ")
            .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
            .map_err(|_| AuthError::InvalidDateFormat)
    }

    /// Build the canonical request string
    fn build_canonical_request<B>(
        &self,
        request: &Request<B>,
        signed_headers: &[String],
    ) -> Result<String, AuthError> {
        let method = request.method().as_str();
        let uri = request.uri();
        let path = uri.path();

        let canonical_uri = if path.is_empty() { "/" } else { path };
        let canonical_query = build_canonical_query_string(uri.query().unwrap_or(""));

        let mut headers_map: BTreeMap<String, String> = BTreeMap::new();
        for header_name in signed_headers {
            let value = request
                .headers()
                .get(header_name.as_str())
                .ok_or_else(|| AuthError::MissingSignedHeader(header_name.clone()))?
                .to_str()
                .map_err(|_| AuthError::InvalidAuthHeader)?
                .trim()
                .to_string();
            headers_map.insert(header_name.clone(), value);
        }

        let canonical_headers: String = headers_map
            .iter()
            .map(|(k, v)| format!("{k}:{v}\n"))
            .collect();

        let signed_headers_str = signed_headers.join(";");

        let payload_hash = request
            .headers()
            .get("x-amz-content-sha256")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("UNSIGNED-PAYLOAD")
            .to_string();

        Ok(format!(
            "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n{signed_headers_str}\n{payload_hash}"
        ))
    }

    /// Build the string to sign
    fn build_string_to_sign(
        &self,
        canonical_request: &str,
        date_str: &str,
        credential_scope: &str,
    ) -> String {
        let canonical_request_hash = hex_sha256(canonical_request.as_bytes());
        format!("AWS4-HMAC-SHA256\n{date_str}\n{credential_scope}\n{canonical_request_hash}")
    }
}

/// Parsed authorization header
struct ParsedAuth {
    access_key_id: String,
    signed_headers: Vec<String>,
    signature: String,
}

/// Rolling verification state for a `STREAMING-AWS4-HMAC-SHA256-PAYLOAD`
/// body: each chunk is signed against the previous chunk's (or the seed
/// request's) signature, so chunks must be verified in order.
#[derive(Clone)]
pub struct ChunkSigningContext {
    signing_key: Vec<u8>,
    date_time: String,
    credential_scope: String,
    previous_signature: String,
}

impl ChunkSigningContext {
    #[must_use]
    pub fn new(
        signing_key: Vec<u8>,
        date_time: String,
        credential_scope: String,
        seed_signature: String,
    ) -> Self {
        Self {
            signing_key,
            date_time,
            credential_scope,
            previous_signature: seed_signature,
        }
    }

    fn verify_and_advance(&mut self, chunk_data: &[u8], provided_signature: &str) -> Result<(), AuthError> {
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256-PAYLOAD\n{}\n{}\n{}\n{}\n{}",
            self.date_time,
            self.credential_scope,
            self.previous_signature,
            hex_sha256(b""),
            hex_sha256(chunk_data),
        );
        let expected = calculate_signature(&self.signing_key, &string_to_sign);
        if !constant_time_eq(&expected, provided_signature) {
            return Err(AuthError::ChunkSignatureMismatch);
        }
        self.previous_signature = expected;
        Ok(())
    }
}

/// Decode and verify a complete `STREAMING-AWS4-HMAC-SHA256-PAYLOAD` body.
///
/// Each frame is `<hex-size>;chunk-signature=<hex-sig>\r\n<data>\r\n`,
/// terminated by a zero-size frame. Returns the concatenated decoded
/// payload, or an error at the first chunk whose signature doesn't chain
/// correctly from the previous one.
pub fn decode_streaming_body(
    body: &[u8],
    ctx: &mut ChunkSigningContext,
) -> Result<Vec<u8>, AuthError> {
    let mut out = Vec::with_capacity(body.len());
    let mut rest = body;

    loop {
        let header_end = find_crlf(rest).ok_or(AuthError::MalformedChunk)?;
        let header =
            std::str::from_utf8(&rest[..header_end]).map_err(|_| AuthError::MalformedChunk)?;
        let (size_str, signature) = parse_chunk_header(header)?;
        let size = usize::from_str_radix(size_str, 16).map_err(|_| AuthError::MalformedChunk)?;

        rest = rest.get(header_end + 2..).ok_or(AuthError::MalformedChunk)?;
        if rest.len() < size + 2 {
            return Err(AuthError::ChunkLengthMismatch);
        }

        let data = &rest[..size];
        ctx.verify_and_advance(data, &signature)?;

        if size == 0 {
            break;
        }
        out.extend_from_slice(data);
        rest = &rest[size + 2..];
    }

    Ok(out)
}

fn parse_chunk_header(header: &str) -> Result<(&str, String), AuthError> {
    let mut parts = header.splitn(2, ';');
    let size_str = parts.next().ok_or(AuthError::MalformedChunk)?;
    let sig_part = parts.next().ok_or(AuthError::MalformedChunk)?;
    let sig = sig_part
        .strip_prefix("chunk-signature=")
        .ok_or(AuthError::MalformedChunk)?;
    Ok((size_str, sig.to_string()))
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Calculate HMAC-SHA256
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Calculate SHA256 and return hex string
fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Derive the SigV4 signing key
pub(crate) fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_secret = format!("AWS4{secret_key}");
    let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn calculate_signature(signing_key: &[u8], string_to_sign: &str) -> String {
    hex::encode(hmac_sha256(signing_key, string_to_sign.as_bytes()))
}

/// Build canonical query string (sorted parameters).
///
/// The incoming query string is already URL-encoded from the HTTP request.
/// We need to decode it first, then re-encode using AWS's URI encoding rules.
fn build_canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut params: Vec<(String, String)> = query
        .split('&')
        .filter_map(|param| {
            let mut parts = param.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            let decoded_key = url_decode(key);
            let decoded_value = url_decode(value);
            Some((url_encode(&decoded_key), url_encode(&decoded_value)))
        })
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// URL encode a string (AWS style)
fn url_encode(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => result.push(c),
            _ => {
                for byte in c.to_string().as_bytes() {
                    result.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    result
}

/// URL decode a string
fn url_decode(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '%' {
            let hex: String = chars.by_ref().take(2).collect();
            if hex.len() == 2 {
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    result.push(byte as char);
                    continue;
                }
            }
            result.push('%');
            result.push_str(&hex);
        } else if c == '+' {
            result.push(' ');
        } else {
            result.push(c);
        }
    }
    result
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryAccessKeyStore;

    #[test]
    fn url_encode_reserved_chars() {
        assert_eq!(url_encode("hello"), "hello");
        assert_eq!(url_encode("hello world"), "hello%20world");
        assert_eq!(url_encode("a/b"), "a%2Fb");
    }

    #[test]
    fn hex_sha256_known_vector() {
        let hash = hex_sha256(b"hello");
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn constant_time_eq_rejects_mismatched_lengths_and_values() {
        assert!(constant_time_eq("hello", "hello"));
        assert!(!constant_time_eq("hello", "world"));
        assert!(!constant_time_eq("hello", "hello!"));
    }

    #[test]
    fn derive_signing_key_is_32_bytes() {
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY",
            "20130524",
            "us-east-1",
            "s3",
        );
        assert_eq!(key.len(), 32);
    }

    #[tokio::test]
    async fn missing_auth_header_is_rejected() {
        let store = Arc::new(InMemoryAccessKeyStore::new());
        let verifier = SigV4Verifier::new(store, "us-east-1");
        let request = Request::builder().uri("/bucket/key").body(()).unwrap();
        let result = verifier.verify(&request).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[test]
    fn streaming_chunk_chain_detects_tampering() {
        let signing_key = derive_signing_key("secret", "20130524", "us-east-1", "s3");
        let mut ctx = ChunkSigningContext::new(
            signing_key.clone(),
            "20130524T000000Z".to_string(),
            "20130524/us-east-1/s3/aws4_request".to_string(),
            "seed-signature".to_string(),
        );

        let data = b"hello chunk";
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256-PAYLOAD\n{}\n{}\n{}\n{}\n{}",
            ctx.date_time,
            ctx.credential_scope,
            ctx.previous_signature,
            hex_sha256(b""),
            hex_sha256(data),
        );
        let good_sig = calculate_signature(&signing_key, &string_to_sign);

        assert!(ctx.verify_and_advance(data, &good_sig).is_ok());
        assert!(ctx.verify_and_advance(data, &good_sig).is_err());
    }

    #[test]
    fn decode_streaming_body_round_trips_and_rejects_tampered_chunk() {
        let signing_key = derive_signing_key("secret", "20130524", "us-east-1", "s3");
        let mut ctx = ChunkSigningContext::new(
            signing_key.clone(),
            "20130524T000000Z".to_string(),
            "20130524/us-east-1/s3/aws4_request".to_string(),
            "seed-signature".to_string(),
        );

        let chunk1 = b"hello, ";
        let sig1 = sign_chunk(&ctx, chunk1);
        ctx.previous_signature = sig1.clone();
        let chunk2 = b"world!";
        let sig2 = sign_chunk(&ctx, chunk2);
        ctx.previous_signature = sig2.clone();
        let final_sig = sign_chunk(&ctx, b"");

        let mut ctx = ChunkSigningContext::new(
            signing_key,
            "20130524T000000Z".to_string(),
            "20130524/us-east-1/s3/aws4_request".to_string(),
            "seed-signature".to_string(),
        );

        let body = format!(
            "{:x};chunk-signature={}\r\n{}\r\n{:x};chunk-signature={}\r\n{}\r\n0;chunk-signature={}\r\n\r\n",
            chunk1.len(),
            sig1,
            std::str::from_utf8(chunk1).unwrap(),
            chunk2.len(),
            sig2,
            std::str::from_utf8(chunk2).unwrap(),
            final_sig,
        );

        let decoded = decode_streaming_body(body.as_bytes(), &mut ctx).unwrap();
        assert_eq!(decoded, b"hello, world!");

        let mut tampered_ctx = ChunkSigningContext::new(
            derive_signing_key("secret", "20130524", "us-east-1", "s3"),
            "20130524T000000Z".to_string(),
            "20130524/us-east-1/s3/aws4_request".to_string(),
            "seed-signature".to_string(),
        );
        let tampered_body = body.replace("hello, ", "pwned, ");
        assert!(decode_streaming_body(tampered_body.as_bytes(), &mut tampered_ctx).is_err());
    }

    fn sign_chunk(ctx: &ChunkSigningContext, data: &[u8]) -> String {
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256-PAYLOAD\n{}\n{}\n{}\n{}\n{}",
            ctx.date_time,
            ctx.credential_scope,
            ctx.previous_signature,
            hex_sha256(b""),
            hex_sha256(data),
        );
        calculate_signature(&ctx.signing_key, &string_to_sign)
    }
}
