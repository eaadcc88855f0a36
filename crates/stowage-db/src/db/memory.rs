//! In-memory configuration store, used when no database is configured and in tests.

use super::owner_set::OwnerRecordSet;
use super::store::ConfigStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use stowage_core::models::{StorageConfig, StorageConfigPatch};
use stowage_core::AppError;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Arena {
    owners: HashMap<String, OwnerRecordSet>,
    /// config id -> owner id
    index: HashMap<String, String>,
    /// Owners in the order they first appeared, for stable `list_all` output.
    owner_order: Vec<String>,
}

impl Arena {
    fn owner_mut(&mut self, owner_id: &str) -> &mut OwnerRecordSet {
        if !self.owners.contains_key(owner_id) {
            self.owner_order.push(owner_id.to_string());
        }
        self.owners.entry(owner_id.to_string()).or_default()
    }

    /// Owner-scoped lookup; a record belonging to someone else reads as missing.
    fn owned_set_mut(&mut self, owner_id: &str, id: &str) -> Result<&mut OwnerRecordSet, AppError> {
        match self.owners.get_mut(owner_id) {
            Some(set) if set.find(id).is_some() => Ok(set),
            _ => Err(AppError::ConfigNotFound(id.to_string())),
        }
    }
}

/// Arena of owner record sets behind one `RwLock`; every transition happens under the write lock.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    arena: RwLock<Arena>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn create(&self, record: StorageConfig) -> Result<StorageConfig, AppError> {
        let mut arena = self.arena.write().await;
        if arena.index.contains_key(&record.id) {
            return Err(AppError::InvalidInput(format!(
                "Configuration id {} already exists",
                record.id
            )));
        }
        let owner_id = record.owner_id.clone();
        let id = record.id.clone();
        let stored = arena.owner_mut(&owner_id).insert(record).clone();
        arena.index.insert(id, owner_id);
        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<Option<StorageConfig>, AppError> {
        let arena = self.arena.read().await;
        Ok(arena
            .index
            .get(id)
            .and_then(|owner| arena.owners.get(owner))
            .and_then(|set| set.find(id))
            .cloned())
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<StorageConfig>, AppError> {
        let arena = self.arena.read().await;
        Ok(arena
            .owners
            .get(owner_id)
            .map(|set| set.records().to_vec())
            .unwrap_or_default())
    }

    async fn update(
        &self,
        owner_id: &str,
        id: &str,
        patch: StorageConfigPatch,
        now: DateTime<Utc>,
    ) -> Result<StorageConfig, AppError> {
        let mut arena = self.arena.write().await;
        let set = arena.owned_set_mut(owner_id, id)?;
        let existing = set
            .find(id)
            .ok_or_else(|| AppError::ConfigNotFound(id.to_string()))?;
        let merged = existing.merged_with(patch, now)?;
        Ok(set.replace(merged)?.clone())
    }

    async fn set_default(&self, owner_id: &str, id: &str) -> Result<StorageConfig, AppError> {
        let mut arena = self.arena.write().await;
        let set = arena.owned_set_mut(owner_id, id)?;
        set.set_default(id)?;
        set.find(id)
            .cloned()
            .ok_or_else(|| AppError::ConfigNotFound(id.to_string()))
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<Option<String>, AppError> {
        let mut arena = self.arena.write().await;
        let set = arena.owned_set_mut(owner_id, id)?;
        let removal = set.remove(id)?;
        arena.index.remove(id);
        Ok(removal.promoted)
    }

    async fn list_all(&self) -> Result<Vec<StorageConfig>, AppError> {
        let arena = self.arena.read().await;
        Ok(arena
            .owner_order
            .iter()
            .filter_map(|owner| arena.owners.get(owner))
            .flat_map(|set| set.records().iter().cloned())
            .collect())
    }

    async fn import(&self, records: Vec<StorageConfig>) -> Result<usize, AppError> {
        let mut arena = self.arena.write().await;
        let mut touched = BTreeSet::new();
        let count = records.len();

        for record in records {
            let previous_owner = arena.index.get(&record.id).cloned();
            if let Some(previous) = previous_owner.filter(|o| *o != record.owner_id) {
                if let Some(set) = arena.owners.get_mut(&previous) {
                    set.detach(&record.id);
                }
                touched.insert(previous);
            }
            let owner_id = record.owner_id.clone();
            arena.index.insert(record.id.clone(), owner_id.clone());
            arena.owner_mut(&owner_id).upsert_imported(record);
            touched.insert(owner_id);
        }

        for owner_id in touched {
            if let Some(set) = arena.owners.get_mut(&owner_id) {
                let changed = set.repair();
                if !changed.is_empty() {
                    tracing::debug!(owner_id = %owner_id, changed = ?changed, "Repaired default after import");
                }
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::models::BackendKind;

    fn record(id: &str, owner: &str) -> StorageConfig {
        let now = Utc::now();
        StorageConfig {
            id: id.to_string(),
            owner_id: owner.to_string(),
            name: id.to_string(),
            backend_kind: BackendKind::SelfHosted,
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin-secret".to_string(),
            region: String::new(),
            bucket_name: "files".to_string(),
            endpoint_url: Some("http://localhost:9000".to_string()),
            use_tls: false,
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_records_are_owner_scoped() {
        let store = MemoryConfigStore::new();
        store.create(record("a1", "alice")).await.unwrap();
        store.create(record("b1", "bob")).await.unwrap();

        assert_eq!(store.list_for_owner("alice").await.unwrap().len(), 1);
        assert!(matches!(
            store.set_default("alice", "b1").await,
            Err(AppError::ConfigNotFound(_))
        ));
        assert!(matches!(
            store.delete("alice", "b1").await,
            Err(AppError::ConfigNotFound(_))
        ));
        assert!(store.get("b1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = MemoryConfigStore::new();
        store.create(record("a1", "alice")).await.unwrap();
        assert!(store.create(record("a1", "alice")).await.is_err());
    }

    #[tokio::test]
    async fn test_update_keeps_identity_and_secret() {
        let store = MemoryConfigStore::new();
        let created = store.create(record("a1", "alice")).await.unwrap();
        let patch = StorageConfigPatch {
            name: Some("renamed".to_string()),
            secret_access_key: Some(String::new()),
            ..Default::default()
        };
        let updated = store.update("alice", "a1", patch, Utc::now()).await.unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.secret_access_key, created.secret_access_key);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.is_default);
    }

    #[tokio::test]
    async fn test_delete_promotes_and_unindexes() {
        let store = MemoryConfigStore::new();
        store.create(record("a1", "alice")).await.unwrap();
        store.create(record("a2", "alice")).await.unwrap();
        store.create(record("a3", "alice")).await.unwrap();

        assert_eq!(store.delete("alice", "a1").await.unwrap().as_deref(), Some("a2"));
        assert!(store.get("a1").await.unwrap().is_none());
        let remaining = store.list_for_owner("alice").await.unwrap();
        assert_eq!(remaining.iter().filter(|r| r.is_default).count(), 1);
        assert!(remaining[0].is_default);
    }

    #[tokio::test]
    async fn test_import_upserts_and_repairs() {
        let store = MemoryConfigStore::new();
        store.create(record("a1", "alice")).await.unwrap();

        let mut replacement = record("a1", "alice");
        replacement.name = "imported".to_string();
        replacement.is_default = false;
        let count = store
            .import(vec![replacement, record("c1", "carol"), record("c2", "carol")])
            .await
            .unwrap();
        assert_eq!(count, 3);

        let alice = store.list_for_owner("alice").await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].name, "imported");
        assert!(alice[0].is_default);

        let carol = store.list_for_owner("carol").await.unwrap();
        assert_eq!(carol.iter().filter(|r| r.is_default).count(), 1);
        assert_eq!(store.list_all().await.unwrap().len(), 3);
    }
}
