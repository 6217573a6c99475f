//! Checksum and hashing utilities shared by the metastore and blob layer.

/// Compute an S3-compatible ETag: a quoted lowercase-hex MD5 digest.
#[must_use]
pub fn compute_etag(data: &[u8]) -> String {
    format!("\"{:x}\"", md5::compute(data))
}

/// Streaming ETag calculator for bodies that arrive in chunks (multipart
/// parts, chunked PUT bodies).
pub struct EtagCalculator {
    ctx: md5::Context,
}

impl Default for EtagCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl EtagCalculator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ctx: md5::Context::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.ctx.consume(data);
    }

    #[must_use]
    pub fn finalize(self) -> String {
        format!("\"{:x}\"", self.ctx.compute())
    }
}

/// Multipart ETags are `<md5-of-concatenated-part-md5s>-<part-count>`,
/// per the S3 convention AWS SDKs rely on.
#[must_use]
pub fn compute_multipart_etag(part_etags: &[String]) -> String {
    let mut concatenated = Vec::new();
    for etag in part_etags {
        let trimmed = etag.trim_matches('"');
        if let Ok(bytes) = hex_decode(trimmed) {
            concatenated.extend_from_slice(&bytes);
        }
    }
    format!(
        "\"{:x}-{}\"",
        md5::compute(&concatenated),
        part_etags.len()
    )
}

fn hex_decode(s: &str) -> Result<Vec<u8>, std::num::ParseIntError> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2.min(s.len() - i)], 16))
        .collect()
}

/// 32-bit hash used to key Postgres advisory locks on
/// `"<bucket>/<object>[/<version>]"` (§4.3).
#[must_use]
pub fn advisory_lock_key(parts: &str) -> i32 {
    crc32c::crc32c(parts.as_bytes()) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etag_is_quoted_hex_md5() {
        let etag = compute_etag(b"hello, world!");
        assert!(etag.starts_with('"') && etag.ends_with('"'));
        assert_eq!(etag.len(), 34); // 32 hex chars + 2 quotes
    }

    #[test]
    fn streaming_etag_matches_one_shot() {
        let expected = compute_etag(b"hello, world!");
        let mut calc = EtagCalculator::new();
        calc.update(b"hello, ");
        calc.update(b"world!");
        assert_eq!(calc.finalize(), expected);
    }

    #[test]
    fn multipart_etag_has_part_count_suffix() {
        let etags = vec![compute_etag(b"part1"), compute_etag(b"part2")];
        let combined = compute_multipart_etag(&etags);
        assert!(combined.ends_with("-2\""));
    }

    #[test]
    fn advisory_lock_key_is_deterministic() {
        let a = advisory_lock_key("bucket/object/v1");
        let b = advisory_lock_key("bucket/object/v1");
        let c = advisory_lock_key("bucket/object/v2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
