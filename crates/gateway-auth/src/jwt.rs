//! Bearer JWT verification against a tenant's `jwt_secret` (§3, §4.6).
//!
//! A request may alternatively present a JWT bearer token instead of a
//! SigV4 signature; when both are present SigV4 wins (§4.6). Verification
//! is HS256 against the tenant's own secret — each tenant's JWKS/secret is
//! resolved by the caller (the tenant runtime) before this is invoked, so
//! this module has no notion of which tenant a token belongs to.

use crate::error::AuthError;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Minimal claim set this gateway relies on. Unknown claims are ignored
/// (`serde` drops them since `Claims` isn't `deny_unknown_fields`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — typically the authenticated end-user id within the tenant.
    pub sub: String,
    pub exp: u64,
    #[serde(default)]
    pub role: Option<String>,
}

/// Verify a bearer token against a tenant's decrypted `jwt_secret`.
pub fn verify_bearer_token(token: &str, jwt_secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| AuthError::InvalidJwt(e.to_string()))?;

    Ok(data.claims)
}

/// Extract the bearer token from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer_token(header_value: &str) -> Result<&str, AuthError> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::MissingBearerToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn sign(claims: &Claims, secret: &str) -> String {
        encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn valid_token_round_trips() {
        let claims = Claims {
            sub: "user-1".into(),
            exp: (chrono::Utc::now().timestamp() + 3600) as u64,
            role: Some("authenticated".into()),
        };
        let token = sign(&claims, "tenant-secret");
        let decoded = verify_bearer_token(&token, "tenant-secret").unwrap();
        assert_eq!(decoded.sub, "user-1");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = Claims {
            sub: "user-1".into(),
            exp: (chrono::Utc::now().timestamp() + 3600) as u64,
            role: None,
        };
        let token = sign(&claims, "tenant-secret");
        assert!(verify_bearer_token(&token, "wrong-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            sub: "user-1".into(),
            exp: (chrono::Utc::now().timestamp() - 3600) as u64,
            role: None,
        };
        let token = sign(&claims, "tenant-secret");
        assert!(verify_bearer_token(&token, "tenant-secret").is_err());
    }

    #[test]
    fn extract_bearer_token_strips_prefix() {
        assert_eq!(extract_bearer_token("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
        assert!(extract_bearer_token("Basic abc").is_err());
        assert!(extract_bearer_token("Bearer ").is_err());
    }
}
