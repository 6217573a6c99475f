//! Native REST handlers (§6): one handler per `/bucket/*`/`/object/*`
//! sub-path, all sharing one [`StorageCoordinator`] per tenant — the same
//! shape as `gateway-s3`'s [`S3State`]. The caller's identity comes from
//! the `AuthResult` the authentication layer already inserted into request
//! extensions, fetched per-handler via `axum::extract::Extension` rather
//! than carried in `RestState`, since `State` is fixed at router-build
//! time and the caller varies per request.

pub mod bucket;
pub mod object;

pub use bucket::*;
pub use object::*;

use gateway_storage::StorageCoordinator;
use std::sync::Arc;

#[derive(Clone)]
pub struct RestState {
    pub coordinator: Arc<StorageCoordinator>,
}
