//! Multi-tenant wiring that sits on top of `gateway-tenant`'s pool cache
//! without changing any of C4-C7's fixed, single-tenant `State` shapes: a
//! fresh [`StorageCoordinator`]/[`TusCoordinator`] pair is built per
//! request from whatever [`TenantHandle`] the cache currently holds.

use async_trait::async_trait;
use gateway_auth::{AccessKey, AccessKeyStore, AuthError, KeyStatus};
use gateway_blob::{BlobBackend, FileBackend, S3Backend};
use gateway_common::config::{BlobBackendKind, Config};
use gateway_metastore::MetaStore;
use gateway_storage::StorageCoordinator;
use gateway_tenant::{TenantHandle, TenantPoolCache};
use gateway_tus::TusCoordinator;
use std::sync::Arc;

/// Resolves a tenant's SigV4 credential by treating the access key id as
/// the tenant id itself, and the secret as that tenant's own
/// `service_key` — every tenant's requests are signed with keys minted
/// against its own service key, so no separate access-key table is
/// needed for multi-tenant SigV4.
pub struct TenantServiceKeyStore {
    tenants: Arc<TenantPoolCache>,
}

impl TenantServiceKeyStore {
    #[must_use]
    pub fn new(tenants: Arc<TenantPoolCache>) -> Self {
        Self { tenants }
    }
}

#[async_trait]
impl AccessKeyStore for TenantServiceKeyStore {
    async fn lookup(&self, access_key_id: &str) -> Result<AccessKey, AuthError> {
        let handle = self
            .tenants
            .get(access_key_id)
            .await
            .map_err(|_| AuthError::AccessKeyNotFound(access_key_id.to_string()))?;
        Ok(AccessKey {
            access_key_id: access_key_id.to_string(),
            secret_access_key: handle.config.service_key.clone(),
            tenant_id: access_key_id.to_string(),
            created_at: 0,
            status: KeyStatus::Active,
        })
    }
}

/// Everything one in-flight request needs to reach a tenant's storage: a
/// blob backend, metastore handle and the two protocol coordinators built
/// over them. Built fresh per request rather than cached — building an
/// axum route table and cloning a `PgPool` handle are both cheap, and a
/// second cache here would need its own invalidation story layered on top
/// of [`TenantPoolCache`]'s.
pub struct TenantContext {
    pub storage: Arc<StorageCoordinator>,
    pub tus: Arc<TusCoordinator>,
    pub handle: Arc<TenantHandle>,
}

/// Builds the blob backend a tenant's storage sits on. Multi-tenant mode
/// shares one backend configuration (and, for the S3 backend, one
/// client) across all tenants — only the metadata plane is per-tenant.
pub async fn build_blob_backend(config: &Config) -> anyhow::Result<Arc<dyn BlobBackend>> {
    Ok(match config.storage_backend.backend {
        BlobBackendKind::File => Arc::new(FileBackend::new(config.storage_backend.file.root.clone()).await?),
        BlobBackendKind::S3 => {
            let access_key = std::env::var("STORAGE_S3_ACCESS_KEY_ID").unwrap_or_default();
            let secret_key = std::env::var("STORAGE_S3_SECRET_ACCESS_KEY").unwrap_or_default();
            Arc::new(S3Backend::new(&config.storage_backend.s3, &access_key, &secret_key).await)
        }
    })
}

pub async fn tenant_context(
    tenant_id: &str,
    tenants: &Arc<TenantPoolCache>,
    blob: &Arc<dyn BlobBackend>,
    global_file_size_limit: u64,
) -> Result<TenantContext, gateway_tenant::TenantError> {
    let handle = tenants.get(tenant_id).await?;
    let meta = Arc::new(MetaStore::new(handle.pool.clone()));
    let storage = Arc::new(
        StorageCoordinator::new(tenant_id.to_string(), meta, blob.clone())
            .with_global_file_size_limit(global_file_size_limit),
    );
    let tus = Arc::new(TusCoordinator::new(storage.clone()));
    Ok(TenantContext { storage, tus, handle })
}
