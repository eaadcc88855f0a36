//! Audit hooks
//!
//! The registry and the transfer engine report every mutating or security-sensitive
//! operation through `AuditSink`. Where events end up (log pipeline, database, SIEM)
//! is up to the implementation; a failing sink never fails the operation it describes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::{CallContext, Caller, TransferStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CreateConfig,
    ViewConfig,
    UpdateConfig,
    SetDefaultConfig,
    DeleteConfig,
    ExportConfigs,
    ImportConfigs,
    ProvisionBackend,
    ListFiles,
    UploadFile,
    DownloadFile,
    DeleteFile,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateConfig => "create_config",
            AuditAction::ViewConfig => "view_config",
            AuditAction::UpdateConfig => "update_config",
            AuditAction::SetDefaultConfig => "set_default_config",
            AuditAction::DeleteConfig => "delete_config",
            AuditAction::ExportConfigs => "export_configs",
            AuditAction::ImportConfigs => "import_configs",
            AuditAction::ProvisionBackend => "provision_backend",
            AuditAction::ListFiles => "list_files",
            AuditAction::UploadFile => "upload_file",
            AuditAction::DownloadFile => "download_file",
            AuditAction::DeleteFile => "delete_file",
        }
    }
}

/// Request metadata attached to audit events when the operation came in over HTTP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub username: Option<String>,
    pub action: AuditAction,
    pub resource: String,
    pub resource_id: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub details: Map<String, Value>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditEvent {
    pub fn new(caller: &Caller, action: AuditAction, resource: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id: caller.user_id.clone(),
            username: caller.username.clone(),
            action,
            resource: resource.to_string(),
            resource_id: None,
            success: true,
            error: None,
            details: Map::new(),
            client_ip: None,
            user_agent: None,
        }
    }

    /// Event attributed to the context's caller, carrying its request metadata.
    pub fn for_context(ctx: &CallContext, action: AuditAction, resource: &str) -> Self {
        Self::new(&ctx.caller, action, resource).meta(&ctx.meta)
    }

    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn stage(self, stage: TransferStage) -> Self {
        self.detail("stage", stage.as_str())
    }

    pub fn meta(mut self, meta: &RequestMeta) -> Self {
        self.client_ip = meta.client_ip.clone();
        self.user_agent = meta.user_agent.clone();
        self
    }

    /// Mark the event as failed with the given error text.
    pub fn failed(mut self, error: impl ToString) -> Self {
        self.success = false;
        self.error = Some(error.to_string());
        self
    }

    /// Record the outcome of `result` on the event.
    pub fn outcome<T, E: std::fmt::Display>(self, result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => self,
            Err(e) => self.failed(e),
        }
    }
}

/// Destination for audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), String>;
}

/// Sink that discards everything.
pub struct NoOpAuditSink;

#[async_trait]
impl AuditSink for NoOpAuditSink {
    async fn record(&self, _event: AuditEvent) -> Result<(), String> {
        Ok(())
    }
}
