//! Per-upload coordination (§4.7 "Locking"). Two layers, matching the
//! two races the spec calls out:
//!
//! - a local, in-process `tokio::sync::Mutex` per upload id, scoped to
//!   this process's lifetime, serialising concurrent PATCHes against the
//!   *same* upload landing on the same node ("a local per-upload mutex
//!   ... prevents intra-process races");
//! - the object's database advisory lock (via `gateway-metastore`,
//!   already the mechanism every other writer uses, §5 "writes ... are
//!   serialised by the advisory lock") for the single chunk write itself,
//!   plus a best-effort `NOTIFY` so a node waiting on a lock another node
//!   holds doesn't have to poll.

use dashmap::DashMap;
use gateway_common::Error;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Process-wide registry of per-upload local mutexes. Entries are never
/// removed proactively — an upload id that never completes leaks one
/// `Arc<Mutex<()>>`, which is cheap enough not to warrant a sweep given
/// uploads are already bounded by `TUS_MAX_CONCURRENT_UPLOADS` and a
/// lock-wait timeout upstream.
#[derive(Default)]
pub struct UploadLockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl UploadLockRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mutex for `upload_id`, creating it on first use.
    pub fn mutex_for(&self, upload_id: &str) -> Arc<Mutex<()>> {
        self.locks.entry(upload_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    pub fn forget(&self, upload_id: &str) {
        self.locks.remove(upload_id);
    }
}

const RELEASE_REQUEST_CHANNEL: &str = "tus_release_requested";

/// Publishes a "please release this upload's lock" notice. Called by a
/// node that failed to take the advisory lock non-blocking and is about
/// to fall back to a blocking wait, so a peer actually holding a
/// longer-lived session lock across chunks gets a chance to let go
/// between chunks rather than racing the waiter's statement timeout.
pub async fn notify_release_requested(pool: &PgPool, upload_id: &str) -> Result<(), Error> {
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(RELEASE_REQUEST_CHANNEL)
        .bind(upload_id)
        .execute(pool)
        .await
        .map_err(|e| Error::internal(e.to_string()))?;
    Ok(())
}

/// Subscribes to release-request notices for one upload id. Returns a
/// listener a long-lived lock holder can poll (or race against its own
/// next-chunk wait) to decide whether to yield the lock early.
pub async fn listen_for_release_request(pool: &PgPool) -> Result<PgListener, Error> {
    let mut listener = PgListener::connect_with(pool).await.map_err(|e| Error::internal(e.to_string()))?;
    listener.listen(RELEASE_REQUEST_CHANNEL).await.map_err(|e| Error::internal(e.to_string()))?;
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mutex_for_same_id_is_the_same_instance() {
        let registry = UploadLockRegistry::new();
        let a = registry.mutex_for("upload-1");
        let b = registry.mutex_for("upload-1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn mutex_for_different_ids_is_distinct() {
        let registry = UploadLockRegistry::new();
        let a = registry.mutex_for("upload-1");
        let b = registry.mutex_for("upload-2");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn forget_drops_the_entry() {
        let registry = UploadLockRegistry::new();
        let a = registry.mutex_for("upload-1");
        registry.forget("upload-1");
        let b = registry.mutex_for("upload-1");
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
