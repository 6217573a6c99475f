//! UploadId codec (§3, §6): a reversible string handle
//! `{ tenant, bucket, object, version }` in one of two textual forms,
//! selected per tenant by `tus_use_file_version_separator`.

use gateway_common::types::{BucketName, ObjectKey};
use gateway_common::Error;

/// The separator between `object` and `version` when the file-version
/// form is in use. Chosen to be something an object key legally can't
/// contain on its own (object keys may embed `/`, so a plain path split
/// would be ambiguous about where the object name ends).
const FILE_VERSION_SEPARATOR: char = '\u{1}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadId {
    pub tenant: String,
    pub bucket: String,
    pub object: String,
    pub version: String,
}

impl UploadId {
    /// Encodes as `tenant/bucket/object/version` or
    /// `tenant/bucket/object<sep>version`, per `use_file_version_separator`.
    #[must_use]
    pub fn encode(&self, use_file_version_separator: bool) -> String {
        if use_file_version_separator {
            format!("{}/{}/{}{}{}", self.tenant, self.bucket, self.object, FILE_VERSION_SEPARATOR, self.version)
        } else {
            format!("{}/{}/{}/{}", self.tenant, self.bucket, self.object, self.version)
        }
    }

    /// Decodes and validates every segment (§6): bucket/object must pass
    /// the same rules enforced at the REST/S3 boundary, and tenant/version
    /// must be non-empty. `version_not_found` (`Error::VersionNotFound`)
    /// covers an id with no version segment at all.
    pub fn decode(raw: &str, use_file_version_separator: bool) -> Result<Self, Error> {
        if use_file_version_separator {
            Self::decode_file_version_separator(raw)
        } else {
            Self::decode_path_separator(raw)
        }
    }

    fn decode_path_separator(raw: &str) -> Result<Self, Error> {
        let mut parts = raw.splitn(4, '/');
        let tenant = parts.next().unwrap_or_default();
        let bucket = parts.next().ok_or_else(Self::malformed)?;
        let object = parts.next().ok_or_else(Self::malformed)?;
        let version = parts.next().ok_or(Error::VersionNotFound)?;
        Self::assemble(tenant, bucket, object, version)
    }

    fn decode_file_version_separator(raw: &str) -> Result<Self, Error> {
        let mut parts = raw.splitn(3, '/');
        let tenant = parts.next().unwrap_or_default();
        let bucket = parts.next().ok_or_else(Self::malformed)?;
        let rest = parts.next().ok_or_else(Self::malformed)?;
        let (object, version) = rest.split_once(FILE_VERSION_SEPARATOR).ok_or(Error::VersionNotFound)?;
        Self::assemble(tenant, bucket, object, version)
    }

    fn assemble(tenant: &str, bucket: &str, object: &str, version: &str) -> Result<Self, Error> {
        if tenant.is_empty() {
            return Err(Self::malformed());
        }
        if version.is_empty() {
            return Err(Error::VersionNotFound);
        }
        BucketName::new(bucket)?;
        ObjectKey::new(object)?;
        Ok(Self { tenant: tenant.to_string(), bucket: bucket.to_string(), object: object.to_string(), version: version.to_string() })
    }

    fn malformed() -> Error {
        Error::invalid_parameter("malformed upload id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UploadId {
        UploadId { tenant: "t1".into(), bucket: "photos".into(), object: "cat.png".into(), version: "v1".into() }
    }

    #[test]
    fn path_separator_round_trips() {
        let id = sample();
        let encoded = id.encode(false);
        assert_eq!(encoded, "t1/photos/cat.png/v1");
        assert_eq!(UploadId::decode(&encoded, false).unwrap(), id);
    }

    #[test]
    fn file_version_separator_round_trips() {
        let id = sample();
        let encoded = id.encode(true);
        assert_eq!(UploadId::decode(&encoded, true).unwrap(), id);
    }

    #[test]
    fn object_key_with_embedded_slash_round_trips_under_file_version_separator() {
        let id = UploadId { tenant: "t1".into(), bucket: "photos".into(), object: "2024/cat.png".into(), version: "v1".into() };
        let encoded = id.encode(true);
        assert_eq!(UploadId::decode(&encoded, true).unwrap(), id);
    }

    #[test]
    fn missing_version_segment_is_version_not_found() {
        assert!(matches!(UploadId::decode("t1/photos/cat.png", false), Err(Error::VersionNotFound)));
        assert!(matches!(UploadId::decode("t1/photos/cat.png", true), Err(Error::VersionNotFound)));
    }

    #[test]
    fn empty_tenant_is_rejected() {
        assert!(UploadId::decode("/photos/cat.png/v1", false).is_err());
    }

    #[test]
    fn invalid_bucket_name_is_rejected() {
        assert!(UploadId::decode("t1/AB/cat.png/v1", false).is_err());
    }
}
