//! Postgres configuration store: storage_configs table, secrets encrypted at rest.

use super::owner_set::OwnerRecordSet;
use super::store::ConfigStore;
use super::transaction::begin_owner_scoped;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::BTreeSet;
use stowage_core::models::{BackendKind, StorageConfig, StorageConfigPatch};
use stowage_core::{AppError, EncryptionService};

const COLUMNS: &str = "id, owner_id, name, backend_kind, access_key_id, secret_access_key, \
                       region, bucket_name, endpoint_url, use_tls, is_default, created_at, updated_at";

/// Row type for storage_configs table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
struct StorageConfigRow {
    id: String,
    owner_id: String,
    name: String,
    backend_kind: String,
    access_key_id: String,
    secret_access_key: String,
    region: String,
    bucket_name: String,
    endpoint_url: Option<String>,
    use_tls: bool,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StorageConfigRow {
    fn into_config(self, encryption: &EncryptionService) -> Result<StorageConfig, AppError> {
        let backend_kind: BackendKind = self.backend_kind.parse()?;
        Ok(StorageConfig {
            secret_access_key: encryption.decrypt(&self.secret_access_key)?,
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            backend_kind,
            access_key_id: self.access_key_id,
            region: self.region,
            bucket_name: self.bucket_name,
            endpoint_url: self.endpoint_url,
            use_tls: self.use_tls,
            is_default: self.is_default,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for the storage_configs table.
#[derive(Clone)]
pub struct PgConfigStore {
    pool: PgPool,
    encryption: EncryptionService,
}

impl PgConfigStore {
    pub fn new(pool: PgPool, encryption: EncryptionService) -> Self {
        Self { pool, encryption }
    }

    fn decode_all(&self, rows: Vec<StorageConfigRow>) -> Result<Vec<StorageConfig>, AppError> {
        rows.into_iter()
            .map(|row| row.into_config(&self.encryption))
            .collect()
    }

    /// Lock and load the owner's rows in creation order. Must run inside an owner-scoped
    /// transaction.
    async fn load_owner_set(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        owner_id: &str,
    ) -> Result<OwnerRecordSet, AppError> {
        let rows: Vec<StorageConfigRow> = sqlx::query_as::<Postgres, StorageConfigRow>(&format!(
            "SELECT {} FROM storage_configs WHERE owner_id = $1 ORDER BY seq FOR UPDATE",
            COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(OwnerRecordSet::new(self.decode_all(rows)?))
    }

    /// Persist the flags of `changed` ids. Clears run before sets so the partial unique
    /// index on defaults never sees two at once.
    async fn write_default_flags(
        tx: &mut Transaction<'static, Postgres>,
        set: &OwnerRecordSet,
        changed: &[String],
    ) -> Result<(), AppError> {
        let (sets, clears): (Vec<&StorageConfig>, Vec<&StorageConfig>) = set
            .records()
            .iter()
            .filter(|r| changed.contains(&r.id))
            .partition(|r| r.is_default);

        for record in clears.into_iter().chain(sets) {
            sqlx::query("UPDATE storage_configs SET is_default = $2 WHERE id = $1")
                .bind(&record.id)
                .bind(record.is_default)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    async fn upsert(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        record: &StorageConfig,
    ) -> Result<(), AppError> {
        let secret = self.encryption.encrypt(&record.secret_access_key)?;
        sqlx::query(
            r#"
            INSERT INTO storage_configs
                (id, owner_id, name, backend_kind, access_key_id, secret_access_key,
                 region, bucket_name, endpoint_url, use_tls, is_default, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                owner_id = EXCLUDED.owner_id,
                name = EXCLUDED.name,
                backend_kind = EXCLUDED.backend_kind,
                access_key_id = EXCLUDED.access_key_id,
                secret_access_key = EXCLUDED.secret_access_key,
                region = EXCLUDED.region,
                bucket_name = EXCLUDED.bucket_name,
                endpoint_url = EXCLUDED.endpoint_url,
                use_tls = EXCLUDED.use_tls,
                is_default = EXCLUDED.is_default,
                created_at = EXCLUDED.created_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(&record.name)
        .bind(record.backend_kind.to_string())
        .bind(&record.access_key_id)
        .bind(&secret)
        .bind(&record.region)
        .bind(&record.bucket_name)
        .bind(&record.endpoint_url)
        .bind(record.use_tls)
        .bind(record.is_default)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    #[tracing::instrument(skip(self, record), fields(db.table = "storage_configs", db.record_id = %record.id))]
    async fn create(&self, mut record: StorageConfig) -> Result<StorageConfig, AppError> {
        let mut tx = begin_owner_scoped(&self.pool, [record.owner_id.as_str()]).await?;

        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM storage_configs WHERE owner_id = $1",
        )
        .bind(&record.owner_id)
        .fetch_one(&mut *tx)
        .await?;
        record.is_default = existing == 0;

        let secret = self.encryption.encrypt(&record.secret_access_key)?;
        sqlx::query(
            r#"
            INSERT INTO storage_configs
                (id, owner_id, name, backend_kind, access_key_id, secret_access_key,
                 region, bucket_name, endpoint_url, use_tls, is_default, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(&record.name)
        .bind(record.backend_kind.to_string())
        .bind(&record.access_key_id)
        .bind(&secret)
        .bind(&record.region)
        .bind(&record.bucket_name)
        .bind(&record.endpoint_url)
        .bind(record.use_tls)
        .bind(record.is_default)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "storage_configs", db.record_id = %id))]
    async fn get(&self, id: &str) -> Result<Option<StorageConfig>, AppError> {
        let row: Option<StorageConfigRow> = sqlx::query_as::<Postgres, StorageConfigRow>(&format!(
            "SELECT {} FROM storage_configs WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| r.into_config(&self.encryption)).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "storage_configs"))]
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<StorageConfig>, AppError> {
        let rows: Vec<StorageConfigRow> = sqlx::query_as::<Postgres, StorageConfigRow>(&format!(
            "SELECT {} FROM storage_configs WHERE owner_id = $1 ORDER BY seq",
            COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        self.decode_all(rows)
    }

    #[tracing::instrument(skip(self, patch), fields(db.table = "storage_configs", db.record_id = %id))]
    async fn update(
        &self,
        owner_id: &str,
        id: &str,
        patch: StorageConfigPatch,
        now: DateTime<Utc>,
    ) -> Result<StorageConfig, AppError> {
        let mut tx = begin_owner_scoped(&self.pool, [owner_id]).await?;
        let set = self.load_owner_set(&mut tx, owner_id).await?;
        let existing = set
            .find(id)
            .ok_or_else(|| AppError::ConfigNotFound(id.to_string()))?;
        let merged = existing.merged_with(patch, now)?;

        let secret = self.encryption.encrypt(&merged.secret_access_key)?;
        sqlx::query(
            r#"
            UPDATE storage_configs
            SET name = $2, backend_kind = $3, access_key_id = $4, secret_access_key = $5,
                region = $6, bucket_name = $7, endpoint_url = $8, use_tls = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(&merged.id)
        .bind(&merged.name)
        .bind(merged.backend_kind.to_string())
        .bind(&merged.access_key_id)
        .bind(&secret)
        .bind(&merged.region)
        .bind(&merged.bucket_name)
        .bind(&merged.endpoint_url)
        .bind(merged.use_tls)
        .bind(merged.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(merged)
    }

    #[tracing::instrument(skip(self), fields(db.table = "storage_configs", db.record_id = %id))]
    async fn set_default(&self, owner_id: &str, id: &str) -> Result<StorageConfig, AppError> {
        let mut tx = begin_owner_scoped(&self.pool, [owner_id]).await?;
        let mut set = self.load_owner_set(&mut tx, owner_id).await?;
        let changed = set.set_default(id)?;
        Self::write_default_flags(&mut tx, &set, &changed).await?;
        tx.commit().await?;

        set.find(id)
            .cloned()
            .ok_or_else(|| AppError::ConfigNotFound(id.to_string()))
    }

    #[tracing::instrument(skip(self), fields(db.table = "storage_configs", db.record_id = %id))]
    async fn delete(&self, owner_id: &str, id: &str) -> Result<Option<String>, AppError> {
        let mut tx = begin_owner_scoped(&self.pool, [owner_id]).await?;
        let mut set = self.load_owner_set(&mut tx, owner_id).await?;
        let removal = set.remove(id)?;

        sqlx::query("DELETE FROM storage_configs WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if let Some(promoted) = &removal.promoted {
            sqlx::query("UPDATE storage_configs SET is_default = TRUE WHERE id = $1")
                .bind(promoted)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(removal.promoted)
    }

    #[tracing::instrument(skip(self), fields(db.table = "storage_configs"))]
    async fn list_all(&self) -> Result<Vec<StorageConfig>, AppError> {
        let rows: Vec<StorageConfigRow> = sqlx::query_as::<Postgres, StorageConfigRow>(&format!(
            "SELECT {} FROM storage_configs ORDER BY seq",
            COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        self.decode_all(rows)
    }

    #[tracing::instrument(skip(self, records), fields(db.table = "storage_configs", count = records.len()))]
    async fn import(&self, records: Vec<StorageConfig>) -> Result<usize, AppError> {
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let mut touched: BTreeSet<String> = records.iter().map(|r| r.owner_id.clone()).collect();

        // Current owners of overwritten ids are only known once their rows are read under
        // lock. If one falls outside the lock set, start over with it included.
        let mut tx = loop {
            let mut tx =
                begin_owner_scoped(&self.pool, touched.iter().map(String::as_str)).await?;
            let current_owners: Vec<String> = sqlx::query_scalar(
                "SELECT DISTINCT owner_id FROM storage_configs WHERE id = ANY($1)",
            )
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await?;

            let unlocked: Vec<String> = current_owners
                .into_iter()
                .filter(|owner| !touched.contains(owner))
                .collect();
            if unlocked.is_empty() {
                break tx;
            }
            tx.rollback().await?;
            tracing::debug!(owners = ?unlocked, "Import widens its owner lock set");
            touched.extend(unlocked);
        };
        for record in &records {
            if record.is_default {
                sqlx::query(
                    "UPDATE storage_configs SET is_default = FALSE WHERE owner_id = $1 AND id <> $2 AND is_default",
                )
                .bind(&record.owner_id)
                .bind(&record.id)
                .execute(&mut *tx)
                .await?;
            }
            self.upsert(&mut tx, record).await?;
        }

        for owner_id in &touched {
            let mut set = self.load_owner_set(&mut tx, owner_id).await?;
            let changed = set.repair();
            if !changed.is_empty() {
                tracing::debug!(owner_id = %owner_id, changed = ?changed, "Repaired default after import");
                Self::write_default_flags(&mut tx, &set, &changed).await?;
            }
        }

        tx.commit().await?;
        Ok(records.len())
    }
}
