//! MIME and size validation (§4.4 step 1).

use gateway_common::Error;

/// Smallest of whichever limits are actually set; a bucket or tenant with
/// no override falls back to the global ceiling.
#[must_use]
pub fn effective_size_limit(bucket_limit: Option<u64>, tenant_limit: Option<u64>, global_limit: u64) -> u64 {
    [bucket_limit, tenant_limit, Some(global_limit)]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(global_limit)
}

/// Checks `len` against `limit`, returning `PayloadTooLarge` on overflow.
pub fn check_size(len: u64, limit: u64) -> Result<(), Error> {
    if len > limit {
        return Err(Error::PayloadTooLarge { max_size: limit });
    }
    Ok(())
}

/// Matches a content type against a bucket's MIME allow-list. An absent or
/// empty allow-list permits anything. Entries ending in `/*` match any
/// subtype (`image/*` matches `image/png`).
#[must_use]
pub fn mime_allowed(content_type: Option<&str>, allowed: Option<&[String]>) -> bool {
    let Some(allowed) = allowed else { return true };
    if allowed.is_empty() {
        return true;
    }
    let Some(content_type) = content_type else {
        return false;
    };
    let content_type = content_type.split(';').next().unwrap_or(content_type).trim();
    allowed.iter().any(|pattern| {
        if let Some(prefix) = pattern.strip_suffix("/*") {
            content_type
                .split('/')
                .next()
                .is_some_and(|ty| ty.eq_ignore_ascii_case(prefix))
        } else {
            pattern.eq_ignore_ascii_case(content_type)
        }
    })
}

pub fn validate_mime(content_type: Option<&str>, allowed: Option<&[String]>) -> Result<(), Error> {
    if mime_allowed(content_type, allowed) {
        Ok(())
    } else {
        Err(Error::invalid_parameter(format!(
            "mime type {:?} not permitted for this bucket",
            content_type.unwrap_or("")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_limit_picks_smallest_set_value() {
        assert_eq!(effective_size_limit(Some(100), Some(500), 1_000), 100);
        assert_eq!(effective_size_limit(None, Some(500), 1_000), 500);
        assert_eq!(effective_size_limit(None, None, 1_000), 1_000);
    }

    #[test]
    fn size_check_rejects_overflow() {
        assert!(check_size(10, 20).is_ok());
        assert!(check_size(21, 20).is_err());
    }

    #[test]
    fn mime_wildcard_matches_subtype() {
        let allowed = vec!["image/*".to_string()];
        assert!(mime_allowed(Some("image/png"), Some(&allowed)));
        assert!(!mime_allowed(Some("text/plain"), Some(&allowed)));
    }

    #[test]
    fn mime_absent_allow_list_permits_anything() {
        assert!(mime_allowed(Some("whatever/thing"), None));
    }

    #[test]
    fn mime_missing_content_type_rejected_when_restricted() {
        let allowed = vec!["image/png".to_string()];
        assert!(!mime_allowed(None, Some(&allowed)));
    }
}
