use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use stowage_core::models::TransferStage;
use stowage_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create storage client: {0}")]
    ClientCreation(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Backend operation failed during {stage}: {message}")]
    Backend {
        stage: TransferStage,
        message: String,
    },

    #[error("Invalid multipart session state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StorageError {
    pub fn backend(stage: TransferStage, message: impl Into<String>) -> Self {
        StorageError::Backend {
            stage,
            message: message.into(),
        }
    }

    pub fn stage(&self) -> Option<TransferStage> {
        match self {
            StorageError::Backend { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ClientCreation(msg) => AppError::ClientCreation(msg),
            StorageError::NotFound(key) => AppError::ObjectNotFound(key),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::Backend { stage, message } => AppError::BackendOperation { stage, message },
            StorageError::InvalidState(msg) => AppError::Internal(msg),
            StorageError::IoError(err) => AppError::backend(TransferStage::ReadPart, err.to_string()),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Streamed object body.
pub type ObjectBody = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Object as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A downloaded object: body stream plus whatever metadata the backend supplied.
pub struct ObjectDownload {
    pub body: ObjectBody,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

/// A part acknowledged by the backend during a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    pub part_number: i32,
    pub e_tag: String,
}

/// Client bound to exactly one bucket and credential pair.
///
/// All keys are absolute backend keys; tenant namespacing happens above this layer.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    fn bucket(&self) -> &str;

    /// All objects under `prefix`, following continuation tokens.
    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectSummary>>;

    /// Cheap connectivity/permission check (lists at most one object).
    async fn probe(&self) -> StorageResult<()>;

    async fn put_object(&self, key: &str, body: Bytes, content_type: Option<&str>) -> StorageResult<()>;

    async fn get_object(&self, key: &str) -> StorageResult<ObjectDownload>;

    async fn delete_object(&self, key: &str) -> StorageResult<()>;

    /// Start a multipart upload and return the backend-issued upload id.
    async fn create_multipart_upload(&self, key: &str, content_type: Option<&str>) -> StorageResult<String>;

    /// Upload one part and return its entity tag.
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<String>;

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> StorageResult<()>;

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StorageResult<()>;
}
