use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stowage_core::models::{StorageConfig, StorageConfigPatch};
use stowage_core::AppError;

/// Durable home of storage configurations.
///
/// Every mutation runs as one owner-scoped critical section, so concurrent readers never
/// observe an owner with zero or two defaults.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Persist a new record. It becomes the default only if it is the owner's first.
    async fn create(&self, record: StorageConfig) -> Result<StorageConfig, AppError>;

    async fn get(&self, id: &str) -> Result<Option<StorageConfig>, AppError>;

    /// The owner's records in creation order.
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<StorageConfig>, AppError>;

    /// Merge `patch` into the owner's record `id`.
    async fn update(
        &self,
        owner_id: &str,
        id: &str,
        patch: StorageConfigPatch,
        now: DateTime<Utc>,
    ) -> Result<StorageConfig, AppError>;

    /// Make `id` the owner's only default and return it.
    async fn set_default(&self, owner_id: &str, id: &str) -> Result<StorageConfig, AppError>;

    /// Delete the owner's record `id`. Returns the id promoted to default, if any.
    async fn delete(&self, owner_id: &str, id: &str) -> Result<Option<String>, AppError>;

    /// Every record of every owner.
    async fn list_all(&self) -> Result<Vec<StorageConfig>, AppError>;

    /// Upsert records by id, then restore the single-default rule for each touched owner.
    async fn import(&self, records: Vec<StorageConfig>) -> Result<usize, AppError>;
}
