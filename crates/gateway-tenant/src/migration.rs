//! Progressive migration runner: advances tenants whose schema lags the
//! latest migration, in the background, without blocking request traffic.

use crate::config::{MigrationStatus, SecretCipher};
use crate::error::TenantError;
use crate::pool::TenantLookup;
use sqlx::postgres::PgPoolOptions;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

/// One forward-only migration step. `up_sql` bodies here are illustrative
/// stubs; the runner only needs the ordering and version-tracking contract.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub up_sql: &'static str,
}

/// Tenants whose current `migrations_version` is behind this table's
/// highest version are migrated forward by [`MigrationRunner`].
pub fn pending_migrations(current_version: i64, catalog: &[Migration]) -> Vec<Migration> {
    catalog
        .iter()
        .filter(|m| m.version > current_version)
        .cloned()
        .collect()
}

/// Advances a single tenant's admin connection by one call to the admin
/// plane to persist the tenant's migration bookkeeping; implemented by the
/// binary against `gateway-metastore`.
#[async_trait::async_trait]
pub trait MigrationLedger: Send + Sync {
    async fn mark_in_progress(&self, tenant_id: &str) -> Result<(), TenantError>;
    async fn mark_migrated(&self, tenant_id: &str, version: i64) -> Result<(), TenantError>;
    async fn mark_failed(&self, tenant_id: &str) -> Result<(), TenantError>;
}

struct QueueEntry {
    tenant_id: String,
    attempt: u32,
    not_before: std::time::Instant,
}

pub struct MigrationRunner {
    lookup: Arc<dyn TenantLookup>,
    ledger: Arc<dyn MigrationLedger>,
    cipher: Arc<SecretCipher>,
    catalog: Vec<Migration>,
    queue: Mutex<VecDeque<QueueEntry>>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl MigrationRunner {
    #[must_use]
    pub fn new(
        lookup: Arc<dyn TenantLookup>,
        ledger: Arc<dyn MigrationLedger>,
        cipher: Arc<SecretCipher>,
        catalog: Vec<Migration>,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            lookup,
            ledger,
            cipher,
            catalog,
            queue: Mutex::new(VecDeque::new()),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            cancel,
        }
    }

    pub async fn enqueue(&self, tenant_id: impl Into<String>) {
        self.queue.lock().await.push_back(QueueEntry {
            tenant_id: tenant_id.into(),
            attempt: 0,
            not_before: std::time::Instant::now(),
        });
    }

    /// Drains the queue until cancellation, running one tenant's pending
    /// migrations per permit. Call as a spawned background task.
    pub async fn run(self: Arc<Self>) {
        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("migration runner shutting down");
                return;
            }

            let next = {
                let mut queue = self.queue.lock().await;
                let now = std::time::Instant::now();
                let idx = queue.iter().position(|e| e.not_before <= now);
                idx.and_then(|i| queue.remove(i))
            };

            let Some(entry) = next else {
                tokio::select! {
                    () = self.cancel.cancelled() => return,
                    () = tokio::time::sleep(Duration::from_millis(200)) => {}
                }
                continue;
            };

            let Ok(permit) = self.semaphore.clone().acquire_owned().await else {
                return;
            };
            let runner = self.clone();
            tokio::spawn(async move {
                let _permit = permit;
                runner.migrate_one(entry).await;
            });
        }
    }

    async fn migrate_one(&self, mut entry: QueueEntry) {
        if let Err(e) = self.try_migrate(&entry.tenant_id).await {
            entry.attempt += 1;
            let backoff = Duration::from_secs(2u64.saturating_pow(entry.attempt.min(8)));
            tracing::warn!(
                tenant_id = %entry.tenant_id,
                attempt = entry.attempt,
                error = %e,
                "migration attempt failed, re-enqueuing with backoff"
            );
            let _ = self.ledger.mark_failed(&entry.tenant_id).await;
            entry.not_before = std::time::Instant::now() + backoff;
            self.queue.lock().await.push_back(entry);
        }
    }

    async fn try_migrate(&self, tenant_id: &str) -> Result<(), TenantError> {
        let record = self.lookup.lookup(tenant_id).await?;
        if record.migrations_status == MigrationStatus::Completed {
            return Ok(());
        }

        self.ledger.mark_in_progress(tenant_id).await?;

        let pending = pending_migrations(record.migrations_version, &self.catalog);
        if pending.is_empty() {
            self.ledger
                .mark_migrated(tenant_id, record.migrations_version)
                .await?;
            return Ok(());
        }

        let database_url = self.cipher.decrypt(&record.database_url_encrypted)?;

        // A short-lived admin connection, opened for this run only; the
        // runner never holds a long-lived pool per tenant.
        let admin_pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&database_url)
            .await
            .map_err(|e| TenantError::PoolInit {
                tenant: tenant_id.to_string(),
                source: e,
            })?;

        let mut latest = record.migrations_version;
        for migration in pending {
            sqlx::query(migration.up_sql)
                .execute(&admin_pool)
                .await
                .map_err(|e| TenantError::MigrationFailed {
                    tenant: tenant_id.to_string(),
                    version: migration.version,
                    source: e,
                })?;
            latest = migration.version;
        }

        self.ledger.mark_migrated(tenant_id, latest).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &[Migration] = &[
        Migration {
            version: 1,
            name: "init",
            up_sql: "select 1",
        },
        Migration {
            version: 2,
            name: "custom-metadata",
            up_sql: "select 1",
        },
    ];

    #[test]
    fn pending_migrations_filters_by_version() {
        let pending = pending_migrations(1, CATALOG);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].version, 2);
    }

    #[test]
    fn pending_migrations_empty_when_current() {
        assert!(pending_migrations(2, CATALOG).is_empty());
    }
}
