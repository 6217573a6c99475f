//! The metadata store (C3): Postgres-backed buckets, objects, multipart
//! uploads and parts, advisory locking, and delimiter-aware listing.

pub mod bucket;
pub mod error;
pub mod lock;
pub mod multipart;
pub mod object;
pub mod store;
pub mod types;

pub use error::map_sqlx_error;
pub use store::MetaStore;
pub use types::{
    Bucket, FeatureFlags, ListObjectsV2Page, ListObjectsV2Query, LockMode, MultipartUploadRow,
    Object, PartRow, SortBy,
};
