//! S3 protocol handler and router (C5+C6): translates S3 REST semantics
//! onto the storage coordinator (C4) and renders results/errors as S3 XML.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod multipart_form;
pub mod router;
pub mod xml;

pub use auth::RequestAuthenticator;
pub use error::S3Error;
pub use router::s3_router;
