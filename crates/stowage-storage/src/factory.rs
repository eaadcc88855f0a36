//! Backend client factory.
//!
//! A storage configuration is resolved once into a `BackendTarget` (addressing mode,
//! endpoint, region) and then handed to a concrete client builder. No connectivity check
//! happens here.

use crate::{ObjectBackend, StorageError, StorageResult};
use async_trait::async_trait;
use std::sync::Arc;
use stowage_core::constants::FALLBACK_REGION;
use stowage_core::models::{BackendKind, StorageConfig};
use url::Url;

/// How the bucket is encoded in request URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// `{endpoint}/{bucket}/{key}`
    PathStyle,
    /// `{bucket}.s3.{region}.amazonaws.com/{key}`
    VirtualHosted,
}

/// Fully resolved connection parameters for one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    pub kind: BackendKind,
    pub addressing: Addressing,
    /// Custom endpoint; `None` means the cloud provider's default endpoints.
    pub endpoint: Option<Url>,
    pub region: String,
    pub bucket: String,
}

/// Validate a configuration and derive its addressing policy.
pub fn resolve_target(config: &StorageConfig) -> StorageResult<BackendTarget> {
    if config.access_key_id.trim().is_empty() || config.secret_access_key.is_empty() {
        return Err(StorageError::ClientCreation(
            "access key and secret key are required".to_string(),
        ));
    }
    let bucket = config.bucket_name.trim();
    if bucket.is_empty() {
        return Err(StorageError::ClientCreation(
            "bucket name is required".to_string(),
        ));
    }

    match config.backend_kind {
        BackendKind::SelfHosted => {
            let raw = config
                .endpoint_url
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .ok_or_else(|| {
                    StorageError::ClientCreation(
                        "endpoint URL is required for self-hosted backends".to_string(),
                    )
                })?;
            let endpoint = parse_endpoint(raw, config.use_tls)?;
            let region = if config.region.trim().is_empty() {
                FALLBACK_REGION.to_string()
            } else {
                config.region.trim().to_string()
            };
            Ok(BackendTarget {
                kind: BackendKind::SelfHosted,
                addressing: Addressing::PathStyle,
                endpoint: Some(endpoint),
                region,
                bucket: bucket.to_string(),
            })
        }
        BackendKind::Cloud => {
            let region = config.region.trim();
            if region.is_empty() {
                return Err(StorageError::ClientCreation(
                    "region is required for cloud backends".to_string(),
                ));
            }
            Ok(BackendTarget {
                kind: BackendKind::Cloud,
                addressing: Addressing::VirtualHosted,
                endpoint: None,
                region: region.to_string(),
                bucket: bucket.to_string(),
            })
        }
    }
}

/// Parse a base URL, accepting bare `host:port` and forcing the scheme to match the TLS flag.
fn parse_endpoint(raw: &str, use_tls: bool) -> StorageResult<Url> {
    let scheme = if use_tls { "https" } else { "http" };
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("{}://{}", scheme, raw)
    };

    let mut url = Url::parse(&with_scheme)
        .map_err(|e| StorageError::ClientCreation(format!("invalid endpoint URL '{}': {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(StorageError::ClientCreation(format!(
            "unsupported endpoint scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(StorageError::ClientCreation(format!(
            "endpoint URL '{}' has no host",
            raw
        )));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(StorageError::ClientCreation(format!(
            "endpoint URL '{}' must be a base URL",
            raw
        )));
    }
    if url.scheme() != scheme {
        url.set_scheme(scheme).map_err(|_| {
            StorageError::ClientCreation(format!("cannot switch endpoint scheme to {}", scheme))
        })?;
    }
    Ok(url)
}

/// Produces ready-to-call clients from configurations.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn create(&self, config: &StorageConfig) -> StorageResult<Arc<dyn ObjectBackend>>;

    /// Drop anything cached for `config_id`. Called after update and delete.
    async fn invalidate(&self, _config_id: &str) {}
}

/// Factory building aws-sdk-s3 clients.
#[cfg(feature = "storage-s3")]
#[derive(Debug, Clone, Default)]
pub struct S3ClientFactory;

#[cfg(feature = "storage-s3")]
#[async_trait]
impl ClientFactory for S3ClientFactory {
    async fn create(&self, config: &StorageConfig) -> StorageResult<Arc<dyn ObjectBackend>> {
        let target = resolve_target(config)?;
        let backend = crate::s3::S3Backend::new(
            &target,
            &config.access_key_id,
            &config.secret_access_key,
        );
        tracing::debug!(
            config_id = %config.id,
            bucket = %target.bucket,
            region = %target.region,
            addressing = ?target.addressing,
            "Created S3 client"
        );
        Ok(Arc::new(backend))
    }
}
