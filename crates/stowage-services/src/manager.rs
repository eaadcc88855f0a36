//! `StorageManager`: the facade the HTTP layer talks to.
//!
//! Creation and updates are only persisted once the backend answers a connectivity probe.
//! Every change to a configuration evicts its cached client.

use crate::audit::Auditor;
use crate::bulk::{self, BulkFormat};
use crate::registry::ConfigRegistry;
use crate::transfer::TransferEngine;
use chrono::Utc;
use std::sync::Arc;
use stowage_core::models::{CallContext, StorageConfig, StorageConfigDraft, StorageConfigPatch};
use stowage_core::{AppError, AuditAction, AuditEvent};
use stowage_storage::Provisioner;

/// Placeholder id for a configuration that only exists for a connectivity probe.
const PROBE_ID: &str = "pending";

/// Encoded bulk export.
pub struct ExportPayload {
    pub format: BulkFormat,
    pub body: Vec<u8>,
    pub count: usize,
}

#[derive(Clone)]
pub struct StorageManager {
    registry: ConfigRegistry,
    transfer: TransferEngine,
    provisioner: Option<Arc<dyn Provisioner>>,
    auditor: Auditor,
}

impl StorageManager {
    pub fn new(
        registry: ConfigRegistry,
        transfer: TransferEngine,
        provisioner: Option<Arc<dyn Provisioner>>,
        auditor: Auditor,
    ) -> Self {
        Self {
            registry,
            transfer,
            provisioner,
            auditor,
        }
    }

    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    pub fn transfer(&self) -> &TransferEngine {
        &self.transfer
    }

    pub fn provisioning_enabled(&self) -> bool {
        self.provisioner.is_some()
    }

    /// Verify the draft against its backend, then persist it.
    pub async fn create_config(
        &self,
        ctx: &CallContext,
        draft: StorageConfigDraft,
    ) -> Result<StorageConfig, AppError> {
        draft.check()?;
        let candidate = StorageConfig::from_draft(
            PROBE_ID.to_string(),
            ctx.owner_id(),
            draft.clone(),
            Utc::now(),
        );
        self.transfer.verify_connectivity(&candidate).await?;
        self.registry.create(ctx, draft).await
    }

    /// Verify the merged configuration, then persist the patch.
    pub async fn update_config(
        &self,
        ctx: &CallContext,
        id: &str,
        patch: StorageConfigPatch,
    ) -> Result<StorageConfig, AppError> {
        let current = self.registry.resolve(ctx.owner_id(), Some(id)).await?;
        let candidate = current.merged_with(patch.clone(), Utc::now())?;
        self.transfer.verify_connectivity(&candidate).await?;

        let updated = self.registry.update(ctx, id, patch).await?;
        self.transfer.invalidate(id).await;
        Ok(updated)
    }

    pub async fn set_default(&self, ctx: &CallContext, id: &str) -> Result<StorageConfig, AppError> {
        self.registry.set_default(ctx, id).await
    }

    pub async fn delete_config(
        &self,
        ctx: &CallContext,
        id: &str,
    ) -> Result<Option<String>, AppError> {
        let promoted = self.registry.delete(ctx, id).await?;
        self.transfer.invalidate(id).await;
        Ok(promoted)
    }

    /// Create a bucket for the caller on the managed backend, register it and make it the
    /// caller's default.
    #[tracing::instrument(skip(self, ctx), fields(owner_id = %ctx.owner_id()))]
    pub async fn provision(&self, ctx: &CallContext) -> Result<StorageConfig, AppError> {
        let result = self.provision_inner(ctx).await;

        let mut event = AuditEvent::for_context(ctx, AuditAction::ProvisionBackend, "config")
            .outcome(&result);
        match &result {
            Ok(config) => {
                event = event
                    .resource_id(config.id.clone())
                    .detail("bucket_name", config.bucket_name.clone());
            }
            Err(e) => {
                if let Some(stage) = e.stage() {
                    event = event.stage(stage);
                }
            }
        }
        self.auditor.record(event).await;
        result
    }

    async fn provision_inner(&self, ctx: &CallContext) -> Result<StorageConfig, AppError> {
        let provisioner = self.provisioner.as_ref().ok_or_else(|| {
            AppError::InvalidInput("Backend provisioning is not configured".to_string())
        })?;

        let draft = provisioner.provision(ctx.owner_id()).await?;
        let created = self.create_config(ctx, draft).await?;
        if created.is_default {
            return Ok(created);
        }
        self.registry.set_default(ctx, &created.id).await
    }

    pub async fn export(
        &self,
        ctx: &CallContext,
        format: BulkFormat,
    ) -> Result<ExportPayload, AppError> {
        let records = self.registry.export_all(ctx).await?;
        let body = bulk::encode(&records, format)?;
        tracing::info!(
            format = format.as_str(),
            count = records.len(),
            "Exported storage configurations"
        );
        Ok(ExportPayload {
            format,
            body,
            count: records.len(),
        })
    }

    pub async fn import(
        &self,
        ctx: &CallContext,
        format: BulkFormat,
        payload: &[u8],
    ) -> Result<usize, AppError> {
        if !ctx.caller.is_admin {
            // Let the registry reject and audit it.
            return self.registry.import(ctx, Vec::new()).await;
        }
        let records = bulk::decode(payload, format, Utc::now())?;
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let count = self.registry.import(ctx, records).await?;
        for id in ids.iter().filter(|id| !id.is_empty()) {
            self.transfer.invalidate(id).await;
        }
        Ok(count)
    }
}
