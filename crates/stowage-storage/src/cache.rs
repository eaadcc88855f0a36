//! LRU cache of backend clients keyed by configuration id and credential fingerprint.

use crate::factory::ClientFactory;
use crate::{ObjectBackend, StorageResult};
use async_trait::async_trait;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;
use stowage_core::models::StorageConfig;
use tokio::sync::Mutex;

/// SHA-256 over every field that influences how a client is built.
pub fn credential_fingerprint(config: &StorageConfig) -> String {
    let mut hasher = Sha256::new();
    for field in [
        config.backend_kind.to_string().as_str(),
        config.endpoint_url.as_deref().unwrap_or(""),
        config.region.as_str(),
        config.bucket_name.as_str(),
        if config.use_tls { "tls" } else { "plain" },
        config.access_key_id.as_str(),
        config.secret_access_key.as_str(),
    ] {
        hasher.update(field.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

struct CachedClient {
    fingerprint: String,
    client: Arc<dyn ObjectBackend>,
}

pub struct CachedClientFactory {
    inner: Arc<dyn ClientFactory>,
    cache: Option<Mutex<LruCache<String, CachedClient>>>,
}

impl CachedClientFactory {
    /// A capacity of zero disables caching entirely.
    pub fn new(inner: Arc<dyn ClientFactory>, capacity: usize) -> Self {
        Self {
            inner,
            cache: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub async fn len(&self) -> usize {
        match &self.cache {
            Some(cache) => cache.lock().await.len(),
            None => 0,
        }
    }
}

#[async_trait]
impl ClientFactory for CachedClientFactory {
    async fn create(&self, config: &StorageConfig) -> StorageResult<Arc<dyn ObjectBackend>> {
        let Some(cache) = &self.cache else {
            return self.inner.create(config).await;
        };

        let fingerprint = credential_fingerprint(config);
        {
            let mut guard = cache.lock().await;
            if let Some(entry) = guard.get(&config.id) {
                if entry.fingerprint == fingerprint {
                    return Ok(entry.client.clone());
                }
            }
        }

        let client = self.inner.create(config).await?;
        cache.lock().await.put(
            config.id.clone(),
            CachedClient {
                fingerprint,
                client: client.clone(),
            },
        );
        Ok(client)
    }

    async fn invalidate(&self, config_id: &str) {
        if let Some(cache) = &self.cache {
            if cache.lock().await.pop(config_id).is_some() {
                tracing::debug!(config_id = %config_id, "Evicted cached storage client");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryClientFactory;
    use chrono::Utc;
    use stowage_core::models::BackendKind;

    fn config(id: &str, secret: &str) -> StorageConfig {
        StorageConfig {
            id: id.to_string(),
            owner_id: "alice".to_string(),
            name: "n".to_string(),
            backend_kind: BackendKind::SelfHosted,
            access_key_id: "AK".to_string(),
            secret_access_key: secret.to_string(),
            region: String::new(),
            bucket_name: "bucket".to_string(),
            endpoint_url: Some("http://localhost:9000".to_string()),
            use_tls: false,
            is_default: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_fingerprint_changes_with_credentials() {
        let a = credential_fingerprint(&config("1", "s1"));
        let b = credential_fingerprint(&config("1", "s2"));
        assert_ne!(a, b);
        assert_eq!(a, credential_fingerprint(&config("other-id", "s1")));
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_reuses_client_until_credentials_change() {
        let factory = CachedClientFactory::new(Arc::new(MemoryClientFactory::default()), 4);
        let first = factory.create(&config("1", "s1")).await.unwrap();
        let second = factory.create(&config("1", "s1")).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let rotated = factory.create(&config("1", "s2")).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &rotated));
        assert_eq!(factory.len().await, 1);

        factory.invalidate("1").await;
        assert_eq!(factory.len().await, 0);
    }

    #[tokio::test]
    async fn test_zero_capacity_disables_cache() {
        let factory = CachedClientFactory::new(Arc::new(MemoryClientFactory::default()), 0);
        let first = factory.create(&config("1", "s1")).await.unwrap();
        let second = factory.create(&config("1", "s1")).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(factory.len().await, 0);
    }
}
