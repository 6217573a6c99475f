//! Core type definitions shared across the gateway
//!
//! This module defines the fundamental value types used throughout the
//! system: validated bucket names and object keys, the opaque object
//! `Version` token, and the tenant/owner identifiers that appear on every
//! metadata row.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a tenant.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an object row (primary key surrogate).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bucket name, validated against the S3-compatible naming rules (§6).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketName(String);

impl BucketName {
    /// Create a new bucket name, validating it against the naming rules.
    pub fn new(name: impl Into<String>) -> Result<Self, BucketNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Create without validation, for rows already persisted.
    #[must_use]
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> Result<(), BucketNameError> {
        if name.len() < 3 {
            return Err(BucketNameError::TooShort);
        }
        if name.len() > 63 {
            return Err(BucketNameError::TooLong);
        }

        let first = name.chars().next().unwrap();
        if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
            return Err(BucketNameError::InvalidStartChar);
        }

        let last = name.chars().last().unwrap();
        if !last.is_ascii_lowercase() && !last.is_ascii_digit() {
            return Err(BucketNameError::InvalidEndChar);
        }

        for c in name.chars() {
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '.' {
                return Err(BucketNameError::InvalidChar(c));
            }
        }

        if name.contains("..") {
            return Err(BucketNameError::ConsecutivePeriods);
        }

        if name.parse::<std::net::Ipv4Addr>().is_ok() {
            return Err(BucketNameError::LooksLikeIpAddress);
        }

        Ok(())
    }
}

impl fmt::Debug for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BucketName({:?})", self.0)
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BucketNameError {
    #[error("bucket name must be at least 3 characters")]
    TooShort,
    #[error("bucket name must be at most 63 characters")]
    TooLong,
    #[error("bucket name must start with a lowercase letter or number")]
    InvalidStartChar,
    #[error("bucket name must end with a lowercase letter or number")]
    InvalidEndChar,
    #[error("bucket name contains invalid character: {0}")]
    InvalidChar(char),
    #[error("bucket name cannot contain consecutive periods")]
    ConsecutivePeriods,
    #[error("bucket name cannot be formatted as an IP address")]
    LooksLikeIpAddress,
}

/// Object key (path within a bucket). May contain embedded `/` but never
/// a NUL byte; length is capped at 1024 bytes of UTF-8 (§6).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(key: impl Into<String>) -> Result<Self, ObjectKeyError> {
        let key = key.into();
        Self::validate(&key)?;
        Ok(Self(key))
    }

    #[must_use]
    pub fn new_unchecked(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(key: &str) -> Result<(), ObjectKeyError> {
        if key.is_empty() {
            return Err(ObjectKeyError::Empty);
        }
        if key.len() > 1024 {
            return Err(ObjectKeyError::TooLong);
        }
        if key.contains('\0') {
            return Err(ObjectKeyError::ContainsNul);
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({:?})", self.0)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ObjectKeyError {
    #[error("object key cannot be empty")]
    Empty,
    #[error("object key cannot exceed 1024 bytes")]
    TooLong,
    #[error("object key cannot contain a NUL byte")]
    ContainsNul,
}

/// Opaque per-write version token. Appended to the blob key as
/// `<tenant>/<bucket>/<object>/<version>` (§3, §6).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version(String);

impl Version {
    /// Generate a fresh, unique version token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(s: impl Into<String>) -> Result<Self, VersionError> {
        let s = s.into();
        if s.is_empty() {
            return Err(VersionError::Empty);
        }
        Ok(Self(s))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum VersionError {
    #[error("version cannot be empty")]
    Empty,
}

/// Owner of a bucket or object. The source system conflated a UUID
/// `owner` with an arbitrary-string `owner_id`; this unifies both as a
/// nullable string (§9 Open Question). [[design-owner-unification]]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner(pub Option<String>);

impl Owner {
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(Some(value.into()))
    }

    /// True when the owner value round-trips as a UUID; the metastore
    /// uses this to decide whether to populate the `owner` (uuid) column
    /// versus leaving it null and relying on `owner_id` text only.
    #[must_use]
    pub fn is_uuid_shaped(&self) -> bool {
        self.0.as_deref().is_some_and(|v| Uuid::parse_str(v).is_ok())
    }

    #[must_use]
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Bucket storage type (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BucketType {
    #[default]
    Standard,
    Analytics,
}

/// Validate a vector index name against the `^[a-z0-9](?:[a-z0-9.-]{1,61})?[a-z0-9]$`
/// rule from §6. The vector companion API itself is out of scope (§1 Non-goals);
/// this validator exists because the naming rule is still part of the boundary
/// contract enumerated in §6.
pub fn validate_vector_index_name(name: &str) -> bool {
    if name.len() < 3 || name.len() > 63 {
        return false;
    }
    let bytes = name.as_bytes();
    let is_alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !is_alnum(bytes[0]) || !is_alnum(bytes[bytes.len() - 1]) {
        return false;
    }
    bytes
        .iter()
        .all(|&b| is_alnum(b) || b == b'.' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_name_valid() {
        assert!(BucketName::new("my-bucket").is_ok());
        assert!(BucketName::new("bucket123").is_ok());
        assert!(BucketName::new("a.b.c").is_ok());
    }

    #[test]
    fn bucket_name_invalid() {
        assert!(BucketName::new("ab").is_err());
        assert!(BucketName::new("-bucket").is_err());
        assert!(BucketName::new("bucket-").is_err());
        assert!(BucketName::new("Bucket").is_err());
        assert!(BucketName::new("bucket..name").is_err());
        assert!(BucketName::new("192.168.1.1").is_err());
    }

    #[test]
    fn object_key_rules() {
        assert!(ObjectKey::new("a/b/c.png").is_ok());
        assert!(ObjectKey::new("").is_err());
        assert!(ObjectKey::new("a\0b").is_err());
        assert!(ObjectKey::new("a".repeat(1025)).is_err());
    }

    #[test]
    fn version_round_trips() {
        let v = Version::generate();
        let parsed = Version::parse(v.as_str().to_string()).unwrap();
        assert_eq!(v, parsed);
    }

    #[test]
    fn owner_uuid_detection() {
        let owner = Owner::new(Uuid::new_v4().to_string());
        assert!(owner.is_uuid_shaped());
        let owner = Owner::new("service-role");
        assert!(!owner.is_uuid_shaped());
        assert!(!Owner::none().is_uuid_shaped());
    }

    #[test]
    fn vector_index_name_rule() {
        assert!(validate_vector_index_name("my-index"));
        assert!(validate_vector_index_name("a.b-1"));
        assert!(!validate_vector_index_name("ab"));
        assert!(!validate_vector_index_name("-bad"));
        assert!(!validate_vector_index_name("BAD"));
    }
}
