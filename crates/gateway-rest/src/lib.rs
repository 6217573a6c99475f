//! The native REST API (§6 "HTTP surface (native)"): JSON routes under
//! `/bucket/*` and `/object/*` over the same `StorageCoordinator` (C4) the
//! S3 and TUS surfaces share. Unlike `gateway-s3`'s method+query+header
//! dispatch table, each native sub-path names its own operation directly,
//! so the router is a plain `axum` route list.

pub mod error;
pub mod handlers;
pub mod router;

pub use error::RestError;
pub use router::rest_router;
