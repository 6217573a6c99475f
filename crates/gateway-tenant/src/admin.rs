//! The admin plane: a single Postgres database, separate from every
//! tenant's own pool, holding the `tenants` table this process reads at
//! [`TenantPoolCache`](crate::pool::TenantPoolCache) miss time.

use crate::config::{MigrationStatus, TenantRecord};
use crate::error::TenantError;
use crate::migration::MigrationLedger;
use crate::pool::TenantLookup;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

pub struct PgTenantLookup {
    pool: PgPool,
}

impl PgTenantLookup {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TenantLookup for PgTenantLookup {
    async fn lookup(&self, tenant_id: &str) -> Result<TenantRecord, TenantError> {
        let row = sqlx::query(
            r"
            SELECT id, database_url_encrypted, database_pool_url_encrypted, max_connections,
                   jwt_secret_encrypted, jwks, service_key_encrypted, file_size_limit,
                   feature_flags, migrations_version, migrations_status, tracing_mode,
                   disable_events, tus_use_file_version_separator
            FROM tenants WHERE id = $1
            ",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TenantError::PoolInit { tenant: tenant_id.to_string(), source: e })?
        .ok_or_else(|| TenantError::NotFound(tenant_id.to_string()))?;

        let migrations_status = match row.try_get::<String, _>("migrations_status").unwrap_or_default().as_str() {
            "in_progress" => MigrationStatus::InProgress,
            "failed" => MigrationStatus::Failed,
            "completed" => MigrationStatus::Completed,
            _ => MigrationStatus::Pending,
        };
        let feature_flags: sqlx::types::Json<HashMap<String, bool>> =
            row.try_get("feature_flags").unwrap_or(sqlx::types::Json(HashMap::new()));

        Ok(TenantRecord {
            id: row.try_get("id").map_err(|e| TenantError::PoolInit { tenant: tenant_id.to_string(), source: e })?,
            database_url_encrypted: row
                .try_get("database_url_encrypted")
                .map_err(|e| TenantError::PoolInit { tenant: tenant_id.to_string(), source: e })?,
            database_pool_url_encrypted: row.try_get("database_pool_url_encrypted").ok(),
            max_connections: row.try_get::<i32, _>("max_connections").ok().map(|v| v.max(1) as u32),
            jwt_secret_encrypted: row
                .try_get("jwt_secret_encrypted")
                .map_err(|e| TenantError::PoolInit { tenant: tenant_id.to_string(), source: e })?,
            jwks: row.try_get("jwks").ok(),
            service_key_encrypted: row
                .try_get("service_key_encrypted")
                .map_err(|e| TenantError::PoolInit { tenant: tenant_id.to_string(), source: e })?,
            file_size_limit: row.try_get("file_size_limit").ok(),
            feature_flags: feature_flags.0,
            migrations_version: row.try_get("migrations_version").unwrap_or(0),
            migrations_status,
            tracing_mode: row.try_get("tracing_mode").ok(),
            disable_events: row.try_get("disable_events").unwrap_or(false),
            tus_use_file_version_separator: row.try_get("tus_use_file_version_separator").unwrap_or(false),
        })
    }
}

/// Persists [`MigrationRunner`](crate::migration::MigrationRunner) progress
/// back to the same `tenants` table `PgTenantLookup` reads.
pub struct PgMigrationLedger {
    pool: PgPool,
}

impl PgMigrationLedger {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MigrationLedger for PgMigrationLedger {
    async fn mark_in_progress(&self, tenant_id: &str) -> Result<(), TenantError> {
        sqlx::query("UPDATE tenants SET migrations_status = 'in_progress' WHERE id = $1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(|e| TenantError::PoolInit { tenant: tenant_id.to_string(), source: e })?;
        Ok(())
    }

    async fn mark_migrated(&self, tenant_id: &str, version: i64) -> Result<(), TenantError> {
        sqlx::query("UPDATE tenants SET migrations_status = 'completed', migrations_version = $2 WHERE id = $1")
            .bind(tenant_id)
            .bind(version)
            .execute(&self.pool)
            .await
            .map_err(|e| TenantError::MigrationFailed { tenant: tenant_id.to_string(), version, source: e })?;
        Ok(())
    }

    async fn mark_failed(&self, tenant_id: &str) -> Result<(), TenantError> {
        sqlx::query("UPDATE tenants SET migrations_status = 'failed' WHERE id = $1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(|e| TenantError::PoolInit { tenant: tenant_id.to_string(), source: e })?;
        Ok(())
    }
}
