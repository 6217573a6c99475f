//! Tenant records as persisted by the admin plane, and the decrypted,
//! in-memory form C1 actually hands out to callers.

use crate::error::TenantError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Row shape as read from the admin database: secrets are ciphertext,
/// base64-encoded `nonce || ciphertext`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TenantRecord {
    pub id: String,
    pub database_url_encrypted: String,
    pub database_pool_url_encrypted: Option<String>,
    pub max_connections: Option<u32>,
    pub jwt_secret_encrypted: String,
    pub jwks: Option<String>,
    pub service_key_encrypted: String,
    pub file_size_limit: Option<i64>,
    pub feature_flags: HashMap<String, bool>,
    pub migrations_version: i64,
    pub migrations_status: MigrationStatus,
    pub tracing_mode: Option<String>,
    pub disable_events: bool,
    pub tus_use_file_version_separator: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// The decrypted config C1 caches per tenant. Never serialized back out;
/// secrets live in memory only for the cache entry's lifetime.
#[derive(Debug, Clone)]
pub struct TenantConfig {
    pub id: String,
    pub database_url: String,
    pub database_pool_url: Option<String>,
    pub max_connections: u32,
    pub jwt_secret: String,
    pub jwks: Option<String>,
    pub service_key: String,
    pub file_size_limit: Option<i64>,
    pub feature_flags: HashMap<String, bool>,
    pub migrations_version: i64,
    pub migrations_status: MigrationStatus,
    pub tracing_mode: Option<String>,
    pub disable_events: bool,
    pub tus_use_file_version_separator: bool,
}

impl TenantConfig {
    #[must_use]
    pub fn feature(&self, name: &str) -> bool {
        self.feature_flags.get(name).copied().unwrap_or(false)
    }
}

/// AES-256-GCM decryption for tenant secrets at rest. `master_key` is 32
/// bytes, sourced from `TENANT_SECRET_ENCRYPTION_KEY` (base64) at process
/// start.
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl SecretCipher {
    pub fn new(master_key: &[u8]) -> Result<Self, TenantError> {
        if master_key.len() != 32 {
            return Err(TenantError::Decryption(
                "master key must be 32 bytes for AES-256-GCM".to_string(),
            ));
        }
        let key = Key::<Aes256Gcm>::from_slice(master_key);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Decrypts a base64(nonce(12) || ciphertext) blob.
    pub fn decrypt(&self, encoded: &str) -> Result<String, TenantError> {
        let raw = BASE64
            .decode(encoded)
            .map_err(|e| TenantError::Decryption(e.to_string()))?;
        if raw.len() < 12 {
            return Err(TenantError::Decryption("ciphertext too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = raw.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| TenantError::Decryption("decryption failed".to_string()))?;
        String::from_utf8(plaintext).map_err(|e| TenantError::Decryption(e.to_string()))
    }

    pub fn decrypt_record(&self, record: &TenantRecord) -> Result<TenantConfig, TenantError> {
        Ok(TenantConfig {
            id: record.id.clone(),
            database_url: self.decrypt(&record.database_url_encrypted)?,
            database_pool_url: record
                .database_pool_url_encrypted
                .as_deref()
                .map(|c| self.decrypt(c))
                .transpose()?,
            max_connections: record.max_connections.unwrap_or(10),
            jwt_secret: self.decrypt(&record.jwt_secret_encrypted)?,
            jwks: record.jwks.clone(),
            service_key: self.decrypt(&record.service_key_encrypted)?,
            file_size_limit: record.file_size_limit,
            feature_flags: record.feature_flags.clone(),
            migrations_version: record.migrations_version,
            migrations_status: record.migrations_status,
            tracing_mode: record.tracing_mode.clone(),
            disable_events: record.disable_events,
            tus_use_file_version_separator: record.tus_use_file_version_separator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm::aead::OsRng;
    use aes_gcm::AeadCore;

    fn encrypt(cipher: &Aes256Gcm, plaintext: &str) -> String {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher.encrypt(&nonce, plaintext.as_bytes()).unwrap();
        let mut blob = nonce.to_vec();
        blob.extend_from_slice(&ciphertext);
        BASE64.encode(blob)
    }

    #[test]
    fn decrypt_round_trips() {
        let key = [7u8; 32];
        let raw_cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let encoded = encrypt(&raw_cipher, "postgres://tenant-db/app");

        let secret_cipher = SecretCipher::new(&key).unwrap();
        let decrypted = secret_cipher.decrypt(&encoded).unwrap();
        assert_eq!(decrypted, "postgres://tenant-db/app");
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let key = [7u8; 32];
        let raw_cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let encoded = encrypt(&raw_cipher, "secret");

        let wrong = SecretCipher::new(&[9u8; 32]).unwrap();
        assert!(wrong.decrypt(&encoded).is_err());
    }

    #[test]
    fn rejects_non_32_byte_key() {
        assert!(SecretCipher::new(&[0u8; 16]).is_err());
    }
}
