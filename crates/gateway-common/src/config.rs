//! Gateway configuration (§6 "Environment / configuration").
//!
//! Loaded by `bin/gateway` via the `config` crate, layering a TOML file
//! under the environment variables named below (env wins), matching the
//! teacher's nested-struct-with-`Default` config shape.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Root configuration for the gateway process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub storage_backend: BlobBackendConfig,
    pub tus: TusConfig,
    pub upload: UploadConfig,
    pub database: DatabaseConfig,
    pub features: FeatureFlags,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            storage_backend: BlobBackendConfig::default(),
            tus: TusConfig::default(),
            upload: UploadConfig::default(),
            database: DatabaseConfig::default(),
            features: FeatureFlags::default(),
        }
    }
}

/// Listen addresses for the three external surfaces (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub listen: SocketAddr,
    pub metrics_listen: SocketAddr,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:9000".parse().unwrap(),
            metrics_listen: "0.0.0.0:9090".parse().unwrap(),
        }
    }
}

/// `STORAGE_BACKEND` and its per-backend settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlobBackendConfig {
    pub backend: BlobBackendKind,
    pub s3: S3BackendConfig,
    pub file: FileBackendConfig,
}

impl Default for BlobBackendConfig {
    fn default() -> Self {
        Self {
            backend: BlobBackendKind::File,
            s3: S3BackendConfig::default(),
            file: FileBackendConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackendKind {
    S3,
    File,
}

/// `STORAGE_S3_*`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct S3BackendConfig {
    pub endpoint: Option<String>,
    pub bucket: String,
    pub region: String,
    pub force_path_style: bool,
    pub max_sockets: usize,
    pub client_timeout_ms: u64,
}

impl Default for S3BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: "gateway-objects".to_string(),
            region: "us-east-1".to_string(),
            force_path_style: true,
            max_sockets: 256,
            client_timeout_ms: 30_000,
        }
    }
}

/// Local-filesystem blob backend root.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileBackendConfig {
    pub root: PathBuf,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/lib/gateway/objects"),
        }
    }
}

/// `TUS_*`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TusConfig {
    pub part_size: u64,
    pub url_expiry_ms: u64,
    pub max_concurrent_uploads: usize,
    pub use_file_version_separator: bool,
    pub base_path: String,
}

impl Default for TusConfig {
    fn default() -> Self {
        Self {
            part_size: 6 * 1024 * 1024,
            url_expiry_ms: 3_600_000,
            max_concurrent_uploads: 200,
            use_file_version_separator: false,
            base_path: "/upload/resumable".to_string(),
        }
    }
}

/// `UPLOAD_FILE_SIZE_LIMIT`, `*_SIGNED_URL_EXPIRATION_SEC`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    pub file_size_limit: u64,
    pub signed_url_upload_expiration_sec: u64,
    pub upload_signed_url_expiration_sec: u64,
    pub max_meta_headers: usize,
    pub max_meta_total_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            file_size_limit: 5 * 1024 * 1024 * 1024,
            signed_url_upload_expiration_sec: 3600,
            upload_signed_url_expiration_sec: 3600,
            max_meta_headers: 32,
            max_meta_total_bytes: 8 * 1024,
        }
    }
}

/// `DATABASE_URL`, `MULTITENANT_DATABASE_URL`, `TENANT_ID`, `PG_QUEUE_ENABLE`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub is_multitenant: bool,
    pub multitenant_database_url: Option<String>,
    pub database_url: Option<String>,
    pub tenant_id: Option<String>,
    pub pg_queue_enable: bool,
    pub statement_timeout_ms: u64,
    pub max_connections_global_limit: u32,
    /// Base64-encoded 32-byte AES-256-GCM key used to decrypt
    /// `tenants.database_url_encrypted`/`jwt_secret_encrypted`/etc. Read
    /// from `TENANT_SECRET_ENCRYPTION_KEY`; unused when `is_multitenant`
    /// is false.
    pub tenant_secret_encryption_key: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            is_multitenant: false,
            multitenant_database_url: None,
            database_url: None,
            tenant_id: None,
            pg_queue_enable: false,
            statement_timeout_ms: 30_000,
            max_connections_global_limit: 20,
            tenant_secret_encryption_key: None,
        }
    }
}

/// `S3_PROTOCOL_ENABLED`, `ICEBERG_ENABLED`, `VECTOR_ENABLED`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub s3_protocol_enabled: bool,
    pub iceberg_enabled: bool,
    pub vector_enabled: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            s3_protocol_enabled: true,
            iceberg_enabled: false,
            vector_enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_file_backend_on_port_9000() {
        let config = Config::default();
        assert_eq!(config.network.listen.port(), 9000);
        assert_eq!(config.storage_backend.backend, BlobBackendKind::File);
        assert!(!config.database.is_multitenant);
    }
}
