//! Wiring of stores, backends and services into `AppState`.

use crate::auth::AuthState;
use crate::state::AppState;
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use stowage_core::{Config, EncryptionService};
use stowage_db::{ConfigStore, MemoryConfigStore, PgConfigStore};
use stowage_services::{Auditor, ConfigRegistry, StorageManager, TracingAuditSink, TransferEngine};
use stowage_storage::{ClientFactory, Provisioner};

/// Build the application state. Without a pool the registry lives in memory.
pub fn initialize_services(config: &Config, pool: Option<PgPool>) -> Result<Arc<AppState>> {
    let store: Arc<dyn ConfigStore> = match &pool {
        Some(pool) => {
            let key = config
                .encryption_key
                .as_deref()
                .context("ENCRYPTION_KEY must be set when DATABASE_URL is configured")?;
            let encryption = EncryptionService::from_base64_key(key)
                .map_err(|e| anyhow::anyhow!("Invalid ENCRYPTION_KEY: {}", e))?;
            Arc::new(PgConfigStore::new(pool.clone(), encryption))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, storage configurations are kept in memory");
            Arc::new(MemoryConfigStore::new())
        }
    };

    let manager = build_manager(
        config,
        store,
        client_factory(),
        provisioner(config),
        Auditor::new(Arc::new(TracingAuditSink)),
    );

    Ok(Arc::new(AppState {
        manager,
        auth: Arc::new(AuthState::new(
            &config.jwt_secret,
            config.admin_user_ids.clone(),
        )),
        pool,
        max_upload_size_bytes: config.max_upload_size_bytes,
        cors_origins: config.cors_origins.clone(),
    }))
}

/// Assemble the service graph from its replaceable parts.
pub fn build_manager(
    config: &Config,
    store: Arc<dyn ConfigStore>,
    factory: Arc<dyn ClientFactory>,
    provisioner: Option<Arc<dyn Provisioner>>,
    auditor: Auditor,
) -> StorageManager {
    let registry = ConfigRegistry::new(store, auditor.clone());
    let transfer = TransferEngine::new(
        registry.clone(),
        factory,
        config.client_cache_capacity,
        auditor.clone(),
    );
    StorageManager::new(registry, transfer, provisioner, auditor)
}

#[cfg(feature = "storage-s3")]
fn client_factory() -> Arc<dyn ClientFactory> {
    Arc::new(stowage_storage::S3ClientFactory)
}

#[cfg(not(feature = "storage-s3"))]
fn client_factory() -> Arc<dyn ClientFactory> {
    tracing::warn!("Built without S3 support, objects are kept in memory");
    Arc::new(stowage_storage::MemoryClientFactory::default())
}

#[cfg(feature = "storage-s3")]
fn provisioner(config: &Config) -> Option<Arc<dyn Provisioner>> {
    config.admin_backend.clone().map(|admin| {
        tracing::info!(endpoint = %admin.endpoint, "Backend provisioning enabled");
        Arc::new(stowage_storage::BackendProvisioner::new(admin)) as Arc<dyn Provisioner>
    })
}

#[cfg(not(feature = "storage-s3"))]
fn provisioner(_config: &Config) -> Option<Arc<dyn Provisioner>> {
    None
}
