//! Access key storage
//!
//! SigV4 credentials resolve to a tenant, not a user: every tenant's
//! requests are signed with keys minted against that tenant's own
//! `service_key` (§3 Tenant). Lookup is async because a production
//! implementation resolves against the tenant runtime's cached config
//! rather than an in-process map.

use crate::error::AuthError;
use crate::user::{AccessKey, KeyStatus};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Resolves SigV4 access key IDs to their tenant-scoped credential.
#[async_trait]
pub trait AccessKeyStore: Send + Sync {
    async fn lookup(&self, access_key_id: &str) -> Result<AccessKey, AuthError>;
}

/// In-memory access key store, used in tests and for single-tenant
/// deployments where `IS_MULTITENANT=false` and keys are loaded once at
/// startup from configuration rather than a database.
#[derive(Default)]
pub struct InMemoryAccessKeyStore {
    keys: RwLock<HashMap<String, AccessKey>>,
}

impl InMemoryAccessKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint and register a new key for a tenant.
    pub fn issue(&self, tenant_id: &str) -> AccessKey {
        let key = AccessKey::generate(tenant_id);
        self.keys
            .write()
            .insert(key.access_key_id.clone(), key.clone());
        key
    }

    /// Register a caller-provided key, e.g. loaded from configuration.
    pub fn insert(&self, key: AccessKey) {
        self.keys.write().insert(key.access_key_id.clone(), key);
    }

    pub fn set_status(&self, access_key_id: &str, status: KeyStatus) -> Result<(), AuthError> {
        let mut keys = self.keys.write();
        let key = keys
            .get_mut(access_key_id)
            .ok_or_else(|| AuthError::AccessKeyNotFound(access_key_id.to_string()))?;
        key.status = status;
        Ok(())
    }
}

#[async_trait]
impl AccessKeyStore for InMemoryAccessKeyStore {
    async fn lookup(&self, access_key_id: &str) -> Result<AccessKey, AuthError> {
        let key = self
            .keys
            .read()
            .get(access_key_id)
            .cloned()
            .ok_or_else(|| AuthError::AccessKeyNotFound(access_key_id.to_string()))?;
        if !key.is_active() {
            return Err(AuthError::AccessKeyInactive);
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issue_then_lookup() {
        let store = InMemoryAccessKeyStore::new();
        let key = store.issue("tenant-a");
        let found = store.lookup(&key.access_key_id).await.unwrap();
        assert_eq!(found.tenant_id, "tenant-a");
    }

    #[tokio::test]
    async fn inactive_key_is_rejected() {
        let store = InMemoryAccessKeyStore::new();
        let key = store.issue("tenant-a");
        store
            .set_status(&key.access_key_id, KeyStatus::Inactive)
            .unwrap();
        let result = store.lookup(&key.access_key_id).await;
        assert!(matches!(result, Err(AuthError::AccessKeyInactive)));
    }

    #[tokio::test]
    async fn unknown_key_not_found() {
        let store = InMemoryAccessKeyStore::new();
        let result = store.lookup("nope").await;
        assert!(matches!(result, Err(AuthError::AccessKeyNotFound(_))));
    }
}
