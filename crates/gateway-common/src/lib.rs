//! Shared types, configuration, and error definitions used across the
//! storage gateway's crates.

pub mod checksum;
pub mod config;
pub mod error;
pub mod types;

pub use checksum::{advisory_lock_key, compute_etag, compute_multipart_etag, EtagCalculator};
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
