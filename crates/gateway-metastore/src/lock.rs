//! Advisory locking (§4.3): transaction-scoped locks keyed by a 32-bit
//! hash of `"<bucket>/<object>[/<version>]"`. Locks auto-release on
//! commit or rollback of the owning transaction, so callers only need to
//! hold the transaction open for the duration of the critical section.

use crate::error::map_sqlx_error;
use gateway_common::{advisory_lock_key, Error};
use sqlx::{Postgres, Transaction};

fn lock_key(bucket: &str, object: &str, version: Option<&str>) -> i32 {
    let composite = match version {
        Some(v) => format!("{bucket}/{object}/{v}"),
        None => format!("{bucket}/{object}"),
    };
    advisory_lock_key(&composite)
}

/// Non-blocking try-lock. Fails fast with `ResourceLocked` if another
/// transaction already holds the lock.
pub async fn must_lock_object(
    tx: &mut Transaction<'_, Postgres>,
    bucket: &str,
    object: &str,
    version: Option<&str>,
) -> Result<(), Error> {
    let key = lock_key(bucket, object, version);
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_xact_lock($1)")
        .bind(key)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

    if acquired.0 {
        Ok(())
    } else {
        Err(Error::ResourceLocked(format!("{bucket}/{object}")))
    }
}

/// Blocking lock with a statement timeout; the timeout is enforced by
/// `SET LOCAL statement_timeout` so Postgres itself cancels the wait
/// rather than the caller racing a client-side timer.
pub async fn wait_object_lock(
    tx: &mut Transaction<'_, Postgres>,
    bucket: &str,
    object: &str,
    version: Option<&str>,
    timeout_ms: u64,
) -> Result<(), Error> {
    let key = lock_key(bucket, object, version);

    sqlx::query(&format!("SET LOCAL statement_timeout = {timeout_ms}"))
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(key)
        .execute(&mut **tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("57014") => {
                Error::LockTimeout(format!("{bucket}/{object}"))
            }
            _ => map_sqlx_error(e),
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_is_stable_for_same_input() {
        assert_eq!(
            lock_key("bucket", "object", Some("v1")),
            lock_key("bucket", "object", Some("v1"))
        );
    }

    #[test]
    fn lock_key_differs_with_version() {
        assert_ne!(
            lock_key("bucket", "object", Some("v1")),
            lock_key("bucket", "object", Some("v2"))
        );
    }

    #[test]
    fn lock_key_differs_without_version() {
        assert_ne!(
            lock_key("bucket", "object", None),
            lock_key("bucket", "object", Some("v1"))
        );
    }
}
