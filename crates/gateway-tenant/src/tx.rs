//! Scoped-role transactions: every query inside a request runs under
//! either the service role or a role derived from the caller's JWT, set
//! with `SET LOCAL ROLE` before the first statement and released
//! automatically on commit/rollback.

use crate::error::TenantError;
use sqlx::{PgPool, Postgres, Transaction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Bypasses row-level security; used for internal bookkeeping (quota
    /// accounting, migration runner, admin operations).
    Service,
    /// Row-level security scoped to the request's JWT subject.
    User(String),
}

impl Role {
    fn sql_role_name(&self) -> &str {
        match self {
            Self::Service => "service_role",
            Self::User(_) => "authenticated",
        }
    }
}

/// A transaction scoped to a [`Role`]. Dropping without `commit`/`rollback`
/// rolls back, same as a bare `sqlx::Transaction`.
pub struct ScopedTransaction<'a> {
    tx: Transaction<'a, Postgres>,
    role: Role,
}

impl<'a> ScopedTransaction<'a> {
    pub async fn begin(pool: &'a PgPool, role: Role) -> Result<ScopedTransaction<'a>, TenantError> {
        let mut tx = pool.begin().await.map_err(TenantError::RoleSwitch)?;
        apply_role(&mut tx, &role).await?;
        Ok(ScopedTransaction { tx, role })
    }

    /// Re-scopes to the service role while keeping the same underlying
    /// transaction — mirrors `asSuperUser()`: the caller keeps its
    /// uncommitted work but temporarily gains privileged access.
    pub async fn as_super_user(&mut self) -> Result<(), TenantError> {
        if self.role != Role::Service {
            apply_role(&mut self.tx, &Role::Service).await?;
            self.role = Role::Service;
        }
        Ok(())
    }

    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn as_mut(&mut self) -> &mut Transaction<'a, Postgres> {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<(), TenantError> {
        self.tx.commit().await.map_err(TenantError::RoleSwitch)
    }

    pub async fn rollback(self) -> Result<(), TenantError> {
        self.tx.rollback().await.map_err(TenantError::RoleSwitch)
    }
}

async fn apply_role(tx: &mut Transaction<'_, Postgres>, role: &Role) -> Result<(), TenantError> {
    let role_name = role.sql_role_name();
    sqlx::query(&format!("SET LOCAL ROLE {role_name}"))
        .execute(&mut **tx)
        .await
        .map_err(TenantError::RoleSwitch)?;

    if let Role::User(subject) = role {
        sqlx::query("SET LOCAL request.jwt.claim.sub = $1")
            .bind(subject)
            .execute(&mut **tx)
            .await
            .map_err(TenantError::RoleSwitch)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_role_maps_to_service_role_sql_name() {
        assert_eq!(Role::Service.sql_role_name(), "service_role");
    }

    #[test]
    fn user_role_maps_to_authenticated_sql_name() {
        assert_eq!(Role::User("user-1".to_string()).sql_role_name(), "authenticated");
    }
}
