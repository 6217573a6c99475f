//! Request authentication for the storage gateway
//!
//! This crate provides:
//! - SigV4 header and streaming-chunk request verification
//! - Presigned URL generation
//! - JWT bearer verification against a tenant's `jwt_secret`
//! - An access-key store trait tenants use to resolve SigV4 credentials
//!
//! Permission itself (§4.1) is enforced at the Postgres role/RLS layer by
//! `gateway-tenant`, not here — this crate only answers "who is this
//! request from".

pub mod error;
pub mod jwt;
pub mod presign;
pub mod sigv4;
pub mod store;
pub mod user;

pub use error::AuthError;
pub use jwt::{verify_bearer_token, Claims};
pub use presign::{presign_get, presign_url};
pub use sigv4::{decode_streaming_body, ChunkSigningContext, SigV4Verifier};
pub use store::{AccessKeyStore, InMemoryAccessKeyStore};
pub use user::{AccessKey, AuthResult, KeyStatus};
