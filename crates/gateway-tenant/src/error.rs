//! Tenant-runtime error taxonomy (C1).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("unknown tenant: {0}")]
    NotFound(String),

    #[error("failed to decrypt tenant secret: {0}")]
    Decryption(String),

    #[error("failed to open database pool for tenant {tenant}: {source}")]
    PoolInit {
        tenant: String,
        source: sqlx::Error,
    },

    #[error("migration {version} failed for tenant {tenant}: {source}")]
    MigrationFailed {
        tenant: String,
        version: i64,
        source: sqlx::Error,
    },

    #[error("role switch failed: {0}")]
    RoleSwitch(sqlx::Error),
}

impl From<TenantError> for gateway_common::Error {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::NotFound(id) => Self::TenantNotFound(id),
            TenantError::Decryption(msg) => Self::internal(msg),
            TenantError::PoolInit { tenant, .. } => Self::DatabaseUnavailable(tenant),
            TenantError::MigrationFailed { tenant, .. } => Self::DatabaseUnavailable(tenant),
            TenantError::RoleSwitch(e) => Self::internal(e.to_string()),
        }
    }
}
