//! Process-wide tenant → (config, DB pool) cache with single-initializer
//! coalescing and TTL/admin-mutation invalidation.

use crate::config::{SecretCipher, TenantConfig, TenantRecord};
use crate::error::TenantError;
use dashmap::DashMap;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

/// Fetches the current [`TenantRecord`] from the admin plane. Implemented
/// against `gateway-metastore`'s admin-tenant table by the binary; a fake
/// in-memory version backs tests here.
#[async_trait::async_trait]
pub trait TenantLookup: Send + Sync {
    async fn lookup(&self, tenant_id: &str) -> Result<TenantRecord, TenantError>;
}

pub struct TenantHandle {
    pub config: TenantConfig,
    pub pool: PgPool,
    loaded_at: Instant,
}

impl TenantHandle {
    #[must_use]
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.loaded_at.elapsed() >= ttl
    }
}

type CacheEntry = Arc<OnceCell<Result<Arc<TenantHandle>, TenantErrorClone>>>;

/// `sqlx::Error` and `TenantError` aren't `Clone`; `OnceCell` needs a
/// cloneable value to hand the same outcome to every coalesced waiter, so
/// failures are flattened to a message before being cached.
#[derive(Debug, Clone)]
struct TenantErrorClone(String);

impl From<TenantErrorClone> for TenantError {
    fn from(e: TenantErrorClone) -> Self {
        TenantError::NotFound(e.0)
    }
}

pub struct TenantPoolCache {
    entries: DashMap<String, CacheEntry>,
    lookup: Arc<dyn TenantLookup>,
    cipher: Arc<SecretCipher>,
    ttl: Duration,
    global_max_connections: u32,
}

impl TenantPoolCache {
    #[must_use]
    pub fn new(
        lookup: Arc<dyn TenantLookup>,
        cipher: Arc<SecretCipher>,
        ttl: Duration,
        global_max_connections: u32,
    ) -> Self {
        Self {
            entries: DashMap::new(),
            lookup,
            cipher,
            ttl,
            global_max_connections,
        }
    }

    /// Returns the cached handle, initializing it exactly once even under
    /// concurrent lookups for the same tenant: late arrivals await the same
    /// in-flight future instead of racing to open a second pool.
    pub async fn get(&self, tenant_id: &str) -> Result<Arc<TenantHandle>, TenantError> {
        if let Some(entry) = self.entries.get(tenant_id) {
            if let Some(Ok(handle)) = entry.get() {
                if !handle.is_stale(self.ttl) {
                    return Ok(handle.clone());
                }
            }
        }

        let cell: CacheEntry = self
            .entries
            .entry(tenant_id.to_string())
            .and_modify(|existing| {
                if matches!(existing.get(), Some(Ok(h)) if h.is_stale(self.ttl)) {
                    *existing = Arc::new(OnceCell::new());
                } else if existing.get().is_some_and(|r| r.is_err()) {
                    *existing = Arc::new(OnceCell::new());
                }
            })
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_init(|| self.init(tenant_id))
            .await
            .clone();

        result.map_err(Into::into)
    }

    async fn init(&self, tenant_id: &str) -> Result<Arc<TenantHandle>, TenantErrorClone> {
        let record = self
            .lookup
            .lookup(tenant_id)
            .await
            .map_err(|e| TenantErrorClone(e.to_string()))?;
        let config = self
            .cipher
            .decrypt_record(&record)
            .map_err(|e| TenantErrorClone(e.to_string()))?;

        let max_connections = config.max_connections.min(self.global_max_connections);
        let connect_url = config.database_pool_url.as_deref().unwrap_or(&config.database_url);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connect_url)
            .await
            .map_err(|e| TenantErrorClone(e.to_string()))?;

        tracing::debug!(tenant_id, max_connections, "tenant pool initialized");

        Ok(Arc::new(TenantHandle {
            config,
            pool,
            loaded_at: Instant::now(),
        }))
    }

    /// Drops the cached entry so the next `get` re-initializes from the
    /// admin plane. Called on tenant delete/patch.
    pub fn invalidate(&self, tenant_id: &str) {
        self.entries.remove(tenant_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MigrationStatus;
    use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
    use aes_gcm::{Aes256Gcm, Key, Nonce};
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLookup {
        calls: AtomicUsize,
        cipher_key: [u8; 32],
    }

    fn encrypt(key: &[u8; 32], plaintext: &str) -> String {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher.encrypt(&nonce, plaintext.as_bytes()).unwrap();
        let mut blob = nonce.to_vec();
        blob.extend_from_slice(&ciphertext);
        BASE64.encode(blob)
    }

    #[async_trait::async_trait]
    impl TenantLookup for CountingLookup {
        async fn lookup(&self, tenant_id: &str) -> Result<TenantRecord, TenantError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TenantRecord {
                id: tenant_id.to_string(),
                database_url_encrypted: encrypt(&self.cipher_key, "postgres://invalid-host/db"),
                database_pool_url_encrypted: None,
                max_connections: Some(5),
                jwt_secret_encrypted: encrypt(&self.cipher_key, "jwt-secret"),
                jwks: None,
                service_key_encrypted: encrypt(&self.cipher_key, "service-key"),
                file_size_limit: None,
                feature_flags: HashMap::new(),
                migrations_version: 1,
                migrations_status: MigrationStatus::Completed,
                tracing_mode: None,
                disable_events: false,
                tus_use_file_version_separator: false,
            })
        }
    }

    #[tokio::test]
    async fn concurrent_lookups_coalesce_to_one_lookup_call() {
        let key = [3u8; 32];
        let lookup = Arc::new(CountingLookup {
            calls: AtomicUsize::new(0),
            cipher_key: key,
        });
        let cache = Arc::new(TenantPoolCache::new(
            lookup.clone(),
            Arc::new(SecretCipher::new(&key).unwrap()),
            Duration::from_secs(60),
            20,
        ));

        // Pool connect will fail (no real DB); what we're verifying is that
        // the lookup is only invoked once despite concurrent callers.
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move { cache.get("tenant-a").await }));
        }
        for t in tasks {
            let _ = t.await;
        }

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalidate_removes_entry() {
        let key = [1u8; 32];
        let lookup = Arc::new(CountingLookup {
            calls: AtomicUsize::new(0),
            cipher_key: key,
        });
        let cache = TenantPoolCache::new(
            lookup,
            Arc::new(SecretCipher::new(&key).unwrap()),
            Duration::from_secs(60),
            20,
        );
        cache.entries.insert(
            "tenant-a".to_string(),
            Arc::new(OnceCell::new()),
        );
        cache.invalidate("tenant-a");
        assert!(cache.entries.get("tenant-a").is_none());
    }
}
