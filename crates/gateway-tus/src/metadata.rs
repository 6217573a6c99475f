//! `Upload-Metadata` parsing (§6 "HTTP surface (TUS)"): a comma-separated
//! list of `key base64(value)` pairs, per the TUS 1.0 creation extension.
//! This gateway only cares about two well-known keys — `bucketName` and
//! `objectName` — everything else round-trips unused.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::collections::HashMap;

#[must_use]
pub fn parse_upload_metadata(header: &str) -> HashMap<String, String> {
    header
        .split(',')
        .filter_map(|pair| {
            let pair = pair.trim();
            if pair.is_empty() {
                return None;
            }
            let mut parts = pair.splitn(2, ' ');
            let key = parts.next()?.to_string();
            let value = parts.next().and_then(|v| BASE64.decode(v).ok()).and_then(|v| String::from_utf8(v).ok());
            value.map(|value| (key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_and_object_name_pairs() {
        let metadata = parse_upload_metadata("bucketName YnVja2V0,objectName Zm9v");
        assert_eq!(metadata.get("bucketName"), Some(&"bucket".to_string()));
        assert_eq!(metadata.get("objectName"), Some(&"foo".to_string()));
    }

    #[test]
    fn skips_entries_with_invalid_base64() {
        let metadata = parse_upload_metadata("bucketName not-valid-base64!!!");
        assert!(metadata.is_empty());
    }

    #[test]
    fn empty_header_yields_empty_map() {
        assert!(parse_upload_metadata("").is_empty());
    }
}
