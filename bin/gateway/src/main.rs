//! Gateway binary: wires the tenant runtime (C1), blob backend (C2),
//! metastore (C3), storage coordinator (C4) and the S3 (C5/C6)/TUS (C7)
//! protocol surfaces into one process.
//!
//! Two deployment shapes, selected by `database.is_multitenant`:
//!  - single-tenant: one pool, one tenant, `gateway-s3`/`gateway-tus`
//!    mounted directly at root so plain S3 clients need no path prefix.
//!  - multi-tenant: tenants resolved per-request from a `/{tenant}/...`
//!    URL prefix (see `dispatch.rs`), with the migration runner advancing
//!    tenants whose schema lags in the background.

mod auth_middleware;
mod dispatch;
mod metrics_middleware;
mod tenant_runtime;

use anyhow::{Context, Result};
use auth_middleware::{auth_layer, AuthState};
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::{middleware, Router};
use clap::Parser;
use dispatch::DispatchState;
use gateway_auth::{AccessKey, InMemoryAccessKeyStore, RequestAuthenticator};
use gateway_common::config::Config;
use gateway_metastore::MetaStore;
use gateway_rest::rest_router;
use gateway_rest::handlers::RestState;
use gateway_s3::s3_router;
use gateway_s3::handlers::S3State;
use gateway_storage::StorageCoordinator;
use gateway_tenant::{
    Migration, MigrationRunner, PgMigrationLedger, PgTenantLookup, SecretCipher, TenantPoolCache,
};
use gateway_tus::tus_router;
use gateway_tus::handlers::TusState;
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gateway")]
#[command(about = "Multi-tenant S3-compatible object storage gateway")]
#[command(version)]
struct Args {
    /// Configuration file path, layered under the environment variables
    /// documented on `gateway_common::config::Config`'s fields.
    #[arg(short, long, default_value = "/etc/gateway/gateway.toml")]
    config: String,
}

/// Illustrative forward-only schema migrations for a tenant database.
/// `MigrationRunner` only needs ordering and version tracking — the
/// bodies here mirror the tables `gateway-metastore` already queries.
fn migration_catalog() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "buckets_and_objects",
            up_sql: r"
                CREATE TABLE IF NOT EXISTS buckets (
                    id UUID PRIMARY KEY,
                    name TEXT UNIQUE NOT NULL,
                    public BOOLEAN NOT NULL DEFAULT FALSE,
                    owner TEXT,
                    file_size_limit BIGINT,
                    allowed_mime_types JSONB,
                    bucket_type TEXT NOT NULL DEFAULT 'standard',
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                CREATE TABLE IF NOT EXISTS objects (
                    id UUID PRIMARY KEY,
                    bucket_id UUID NOT NULL REFERENCES buckets(id),
                    name TEXT NOT NULL,
                    owner TEXT,
                    version TEXT NOT NULL,
                    metadata JSONB,
                    user_metadata JSONB,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    last_accessed_at TIMESTAMPTZ,
                    UNIQUE (bucket_id, name)
                );
            ",
        },
        Migration {
            version: 2,
            name: "multipart_uploads_and_parts",
            up_sql: r"
                CREATE TABLE IF NOT EXISTS s3_multipart_uploads (
                    id TEXT PRIMARY KEY,
                    bucket_id UUID NOT NULL REFERENCES buckets(id),
                    key TEXT NOT NULL,
                    version TEXT NOT NULL,
                    backend_upload_id TEXT NOT NULL,
                    upload_signature TEXT NOT NULL,
                    in_progress_size BIGINT NOT NULL DEFAULT 0,
                    owner TEXT,
                    user_metadata JSONB,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                CREATE TABLE IF NOT EXISTS s3_parts (
                    upload_id TEXT NOT NULL REFERENCES s3_multipart_uploads(id),
                    part_number INTEGER NOT NULL,
                    etag TEXT NOT NULL,
                    size BIGINT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    PRIMARY KEY (upload_id, part_number)
                );
            ",
        },
    ]
}

/// Loads defaults + an optional TOML file through the `config` crate's
/// builder, then layers the flat env var names documented on `Config`'s
/// own fields — those names don't nest the way the `config` crate's
/// automatic env mapping expects, so the override pass is manual.
fn load_config(path: &str) -> Result<Config> {
    let base = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(config::File::with_name(path).required(false))
        .build()?;
    let mut cfg: Config = base.try_deserialize()?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

fn apply_env_overrides(cfg: &mut Config) {
    use std::env::var;

    if let Ok(v) = var("LISTEN_ADDR") {
        if let Ok(addr) = v.parse() {
            cfg.network.listen = addr;
        }
    }
    if let Ok(v) = var("METRICS_LISTEN_ADDR") {
        if let Ok(addr) = v.parse() {
            cfg.network.metrics_listen = addr;
        }
    }
    if let Ok(v) = var("DATABASE_URL") {
        cfg.database.database_url = Some(v);
    }
    if let Ok(v) = var("MULTITENANT_DATABASE_URL") {
        cfg.database.multitenant_database_url = Some(v);
    }
    if let Ok(v) = var("TENANT_ID") {
        cfg.database.tenant_id = Some(v);
    }
    if let Ok(v) = var("TENANT_SECRET_ENCRYPTION_KEY") {
        cfg.database.tenant_secret_encryption_key = Some(v);
    }
    if let Ok(v) = var("IS_MULTITENANT") {
        cfg.database.is_multitenant = v == "true" || v == "1";
    }
    if let Ok(v) = var("PG_QUEUE_ENABLE") {
        cfg.database.pg_queue_enable = v == "true" || v == "1";
    }
    if let Ok(v) = var("UPLOAD_FILE_SIZE_LIMIT") {
        if let Ok(n) = v.parse() {
            cfg.upload.file_size_limit = n;
        }
    }
    if let Ok(v) = var("TUS_BASE_PATH") {
        cfg.tus.base_path = v;
    }
    if let Ok(v) = var("TUS_USE_FILE_VERSION_SEPARATOR") {
        cfg.tus.use_file_version_separator = v == "true" || v == "1";
    }
    if let Ok(v) = var("STORAGE_BACKEND") {
        cfg.storage_backend.backend = match v.to_lowercase().as_str() {
            "s3" => gateway_common::config::BlobBackendKind::S3,
            _ => gateway_common::config::BlobBackendKind::File,
        };
    }
    if let Ok(v) = var("STORAGE_S3_BUCKET") {
        cfg.storage_backend.s3.bucket = v;
    }
    if let Ok(v) = var("STORAGE_S3_ENDPOINT") {
        cfg.storage_backend.s3.endpoint = Some(v);
    }
    if let Ok(v) = var("STORAGE_S3_REGION") {
        cfg.storage_backend.s3.region = v;
    }
    if let Ok(v) = var("S3_PROTOCOL_ENABLED") {
        cfg.features.s3_protocol_enabled = v == "true" || v == "1";
    }
    if let Ok(v) = var("ICEBERG_ENABLED") {
        cfg.features.iceberg_enabled = v == "true" || v == "1";
    }
    if let Ok(v) = var("VECTOR_ENABLED") {
        cfg.features.vector_enabled = v == "true" || v == "1";
    }
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

async fn metrics_placeholder() -> impl IntoResponse {
    // `PrometheusBuilder::with_http_listener` serves `/metrics` on its own
    // listener (`network.metrics_listen`); this route exists only so a
    // request on the main listener gets a clean 404 instead of falling
    // through to the S3/TUS routers and being misclassified as an object
    // operation.
    StatusCode::NOT_FOUND
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config(&args.config).context("loading configuration")?;

    PrometheusBuilder::new()
        .with_http_listener(config.network.metrics_listen)
        .install()
        .context("installing prometheus exporter")?;

    let blob = tenant_runtime::build_blob_backend(&config).await.context("building blob backend")?;
    let body_limit = DefaultBodyLimit::max(config.upload.file_size_limit as usize);

    let app = if config.database.is_multitenant {
        build_multitenant_app(&config, blob, body_limit).await?
    } else {
        build_single_tenant_app(&config, blob, body_limit).await?
    };

    let addr: SocketAddr = config.network.listen;
    info!(%addr, "starting gateway");
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutting down");
        })
        .await?;

    Ok(())
}

async fn build_single_tenant_app(
    config: &Config,
    blob: Arc<dyn gateway_blob::BlobBackend>,
    body_limit: DefaultBodyLimit,
) -> Result<Router> {
    let database_url = config.database.database_url.as_deref().context("DATABASE_URL is required in single-tenant mode")?;
    let tenant_id = config.database.tenant_id.clone().unwrap_or_else(|| "default".to_string());

    let pool = PgPoolOptions::new().max_connections(config.database.max_connections_global_limit).connect(database_url).await?;
    let meta = Arc::new(MetaStore::new(pool));
    let storage = Arc::new(
        StorageCoordinator::new(tenant_id.clone(), meta, blob).with_global_file_size_limit(config.upload.file_size_limit),
    );
    let tus = Arc::new(gateway_tus::TusCoordinator::new(storage.clone()));

    let key_store = Arc::new(InMemoryAccessKeyStore::new());
    if let (Ok(access_key_id), Ok(secret_access_key)) = (std::env::var("GATEWAY_ACCESS_KEY_ID"), std::env::var("GATEWAY_SECRET_ACCESS_KEY")) {
        key_store.insert(AccessKey { access_key_id, secret_access_key, tenant_id: tenant_id.clone(), created_at: 0, status: gateway_auth::KeyStatus::Active });
    } else {
        tracing::warn!("GATEWAY_ACCESS_KEY_ID/GATEWAY_SECRET_ACCESS_KEY not set; SigV4 requests will fail until credentials are configured");
    }
    let jwt_secret = std::env::var("GATEWAY_JWT_SECRET").ok();
    let authenticator = RequestAuthenticator::new(key_store, config.storage_backend.s3.region.clone());
    let auth_state = Arc::new(AuthState::new(authenticator, tenant_id, jwt_secret));

    let rest_state = RestState { coordinator: storage.clone() };
    let s3_state = S3State { coordinator: storage };
    let tus_state = TusState {
        coordinator: tus,
        tenant: auth_state.tenant_id.clone(),
        use_file_version_separator: config.tus.use_file_version_separator,
        tenant_file_size_limit: None,
    };

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_placeholder))
        .nest(&config.tus.base_path, tus_router(tus_state))
        .merge(rest_router(rest_state));
    if config.features.s3_protocol_enabled {
        router = router.merge(s3_router(s3_state));
    }

    Ok(router
        .layer(body_limit)
        .layer(middleware::from_fn_with_state(auth_state, auth_layer))
        .layer(middleware::from_fn(metrics_middleware::metrics_layer))
        .layer(TraceLayer::new_for_http()))
}

async fn build_multitenant_app(
    config: &Config,
    blob: Arc<dyn gateway_blob::BlobBackend>,
    body_limit: DefaultBodyLimit,
) -> Result<Router> {
    let admin_url = config.database.multitenant_database_url.as_deref().context("MULTITENANT_DATABASE_URL is required in multi-tenant mode")?;
    let master_key_b64 = config.database.tenant_secret_encryption_key.as_deref().context("TENANT_SECRET_ENCRYPTION_KEY is required in multi-tenant mode")?;
    let master_key = {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        STANDARD.decode(master_key_b64).context("TENANT_SECRET_ENCRYPTION_KEY is not valid base64")?
    };
    let cipher = Arc::new(SecretCipher::new(&master_key)?);

    let admin_pool = PgPoolOptions::new().max_connections(10).connect(admin_url).await?;
    let lookup = Arc::new(PgTenantLookup::new(admin_pool.clone()));
    let ledger = Arc::new(PgMigrationLedger::new(admin_pool.clone()));

    let tenants = Arc::new(TenantPoolCache::new(lookup.clone(), cipher.clone(), Duration::from_secs(300), config.database.max_connections_global_limit));

    let cancel = CancellationToken::new();
    let runner = Arc::new(MigrationRunner::new(lookup, ledger, cipher, migration_catalog(), 4, cancel.clone()));
    tokio::spawn(runner.clone().run());
    tokio::spawn(poll_pending_tenants(admin_pool, runner, cancel.clone()));

    let key_store = Arc::new(tenant_runtime::TenantServiceKeyStore::new(tenants.clone()));
    let authenticator = RequestAuthenticator::new(key_store, config.storage_backend.s3.region.clone());
    let dispatch_state = Arc::new(DispatchState {
        tenants,
        blob,
        authenticator,
        global_file_size_limit: config.upload.file_size_limit,
        tus_base_path: config.tus.base_path.clone(),
        s3_protocol_enabled: config.features.s3_protocol_enabled,
    });

    Ok(Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_placeholder))
        .route("/{tenant}", any(dispatch::dispatch_root))
        .route("/{tenant}/{*rest}", any(dispatch::dispatch))
        .with_state(dispatch_state)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http()))
}

/// Scans the admin plane for tenants whose migrations haven't completed
/// and enqueues them with the runner. Runs on a fixed interval rather
/// than a push notification since no event channel exists between the
/// admin plane and this process.
async fn poll_pending_tenants(admin_pool: sqlx::PgPool, runner: Arc<MigrationRunner>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            _ = interval.tick() => {}
        }

        let rows = sqlx::query_scalar::<_, String>("SELECT id FROM tenants WHERE migrations_status <> 'completed'")
            .fetch_all(&admin_pool)
            .await;
        match rows {
            Ok(ids) => {
                for id in ids {
                    runner.enqueue(id).await;
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to list tenants pending migration"),
        }
    }
}
