//! Transfer engine: list, upload, download and delete inside a tenant's key namespace.
//!
//! Uploads below `MULTIPART_THRESHOLD_BYTES` are a single put. Larger uploads stream through
//! a `MultipartSession`, reading and uploading one part at a time.

use crate::audit::Auditor;
use crate::registry::ConfigRegistry;
use std::sync::Arc;
use std::time::Instant;
use stowage_core::constants::{MULTIPART_PART_SIZE_BYTES, MULTIPART_THRESHOLD_BYTES};
use stowage_core::models::{
    CallContext, FileEntry, FileListing, PageRequest, StorageConfig, TransferStage, UploadOutcome,
    UploadStrategy,
};
use stowage_core::{AppError, AuditAction, AuditEvent};
use stowage_storage::keys::{strip_tenant_prefix, tenant_key, tenant_prefix};
use stowage_storage::{
    read_chunk, CachedClientFactory, ClientFactory, MultipartSession, ObjectBackend,
    ObjectDownload, StorageError,
};
use tokio::io::AsyncRead;

const RESOURCE: &str = "file";

/// A download ready to stream back to the tenant.
pub struct FileDownload {
    /// Logical key as the tenant knows it.
    pub key: String,
    pub object: ObjectDownload,
}

impl FileDownload {
    /// Last path segment, for `Content-Disposition`.
    pub fn filename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// A failed transfer plus the part it was on, for the audit trail.
struct TransferFailure {
    error: StorageError,
    part_number: Option<i32>,
}

impl From<StorageError> for TransferFailure {
    fn from(error: StorageError) -> Self {
        Self {
            error,
            part_number: None,
        }
    }
}

#[derive(Clone)]
pub struct TransferEngine {
    registry: ConfigRegistry,
    factory: Arc<dyn ClientFactory>,
    clients: Arc<CachedClientFactory>,
    auditor: Auditor,
}

impl TransferEngine {
    /// `factory` builds backend clients; built clients are cached up to `cache_capacity`
    /// (0 disables). Connectivity checks always use a fresh client.
    pub fn new(
        registry: ConfigRegistry,
        factory: Arc<dyn ClientFactory>,
        cache_capacity: usize,
        auditor: Auditor,
    ) -> Self {
        let clients = Arc::new(CachedClientFactory::new(factory.clone(), cache_capacity));
        Self {
            registry,
            factory,
            clients,
            auditor,
        }
    }

    /// Drop any cached client for `config_id`. Called when a configuration changes or goes away.
    pub async fn invalidate(&self, config_id: &str) {
        self.clients.invalidate(config_id).await;
    }

    async fn client_for(
        &self,
        ctx: &CallContext,
        config_id: Option<&str>,
    ) -> Result<(StorageConfig, Arc<dyn ObjectBackend>), AppError> {
        let config = self.registry.resolve(ctx.owner_id(), config_id).await?;
        let client = self.clients.create(&config).await?;
        Ok((config, client))
    }

    /// Build an uncached client and list at most one object.
    pub async fn verify_connectivity(&self, config: &StorageConfig) -> Result<(), AppError> {
        let client = self.factory.create(config).await?;
        client.probe().await.map_err(|e| {
            tracing::warn!(
                error = %e,
                bucket = %config.bucket_name,
                backend_kind = %config.backend_kind,
                "Storage connectivity check failed"
            );
            let message = match e {
                StorageError::Backend { message, .. } => message,
                other => other.to_string(),
            };
            AppError::backend(TransferStage::List, message)
        })
    }

    /// Page through the tenant's objects.
    #[tracing::instrument(skip(self, ctx), fields(owner_id = %ctx.owner_id()))]
    pub async fn list_files(
        &self,
        ctx: &CallContext,
        config_id: Option<&str>,
        page: PageRequest,
    ) -> Result<FileListing, AppError> {
        let mut event = AuditEvent::for_context(ctx, AuditAction::ListFiles, RESOURCE)
            .detail("page", page.page)
            .detail("page_size", page.page_size);

        let result = self.list_inner(ctx, config_id, page).await;
        event = match &result {
            Ok(listing) => event
                .resource_id(listing.config_id.clone())
                .detail("total", listing.total),
            Err(e) => match e.stage() {
                Some(stage) => event.stage(stage).failed(e),
                None => event.failed(e),
            },
        };
        self.auditor.record(event).await;
        result
    }

    async fn list_inner(
        &self,
        ctx: &CallContext,
        config_id: Option<&str>,
        page: PageRequest,
    ) -> Result<FileListing, AppError> {
        let owner_id = ctx.owner_id();
        let prefix = tenant_prefix(owner_id)?;
        let (config, client) = self.client_for(ctx, config_id).await?;
        let objects = client.list_objects(&prefix).await?;

        let entries: Vec<FileEntry> = objects
            .into_iter()
            .filter_map(|object| {
                let key = strip_tenant_prefix(owner_id, &object.key)?.to_string();
                Some(FileEntry {
                    key,
                    full_key: object.key,
                    size: object.size,
                    last_modified: object.last_modified,
                })
            })
            .collect();

        let total = entries.len();
        let (start, end) = page.bounds(total);
        Ok(FileListing {
            files: entries[start..end].to_vec(),
            total,
            page: page.page,
            page_size: page.page_size,
            config_id: config.id,
            config_name: config.name,
        })
    }

    /// Upload `reader` to `filename`. `total_size` selects the strategy: below the multipart
    /// threshold the whole body is sent in one put.
    #[tracing::instrument(skip(self, ctx, reader, content_type), fields(owner_id = %ctx.owner_id()))]
    pub async fn upload<R>(
        &self,
        ctx: &CallContext,
        config_id: Option<&str>,
        filename: &str,
        reader: &mut R,
        total_size: u64,
        content_type: Option<String>,
    ) -> Result<UploadOutcome, AppError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let start = Instant::now();
        let strategy = if total_size < MULTIPART_THRESHOLD_BYTES {
            UploadStrategy::SinglePut
        } else {
            UploadStrategy::Multipart
        };
        let event = AuditEvent::for_context(ctx, AuditAction::UploadFile, RESOURCE)
            .resource_id(filename)
            .detail("filename", filename)
            .detail("size", total_size)
            .detail("strategy", strategy.to_string());

        let prepared = match tenant_key(ctx.owner_id(), filename) {
            Ok(key) => self.client_for(ctx, config_id).await.map(|c| (key, c)),
            Err(e) => Err(AppError::from(e)),
        };
        let (key, (config, client)) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                self.auditor.record(event.failed(&e)).await;
                return Err(e);
            }
        };

        let result = match strategy {
            UploadStrategy::SinglePut => {
                Self::single_put(client.as_ref(), &key, reader, content_type.as_deref())
                    .await
                    .map(|size| (size, 1))
            }
            UploadStrategy::Multipart => {
                Self::multipart_upload(client, &key, reader, content_type).await
            }
        };

        match result {
            Ok((size, parts)) => {
                tracing::info!(
                    key = %key,
                    config_id = %config.id,
                    size_bytes = size,
                    parts = parts,
                    strategy = %strategy,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Upload completed"
                );
                self.auditor
                    .record(event.detail("parts", parts).detail("bytes_written", size))
                    .await;
                Ok(UploadOutcome {
                    key: filename.to_string(),
                    size,
                    parts,
                    strategy,
                    config_id: config.id,
                })
            }
            Err(failure) => {
                let error = AppError::from(failure.error);
                tracing::error!(
                    error = %error,
                    key = %key,
                    config_id = %config.id,
                    part_number = ?failure.part_number,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Upload failed"
                );
                let mut event = event.failed(&error);
                if let Some(stage) = error.stage() {
                    event = event.stage(stage);
                }
                if let Some(part_number) = failure.part_number {
                    event = event.detail("part_number", part_number);
                }
                self.auditor.record(event).await;
                Err(error)
            }
        }
    }

    async fn single_put<R>(
        client: &dyn ObjectBackend,
        key: &str,
        reader: &mut R,
        content_type: Option<&str>,
    ) -> Result<u64, TransferFailure>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let body = read_chunk(reader, MULTIPART_THRESHOLD_BYTES as usize).await?;
        if !read_chunk(reader, 1).await?.is_empty() {
            return Err(StorageError::InvalidKey(
                "Upload body is larger than its declared size".to_string(),
            )
            .into());
        }
        let size = body.len() as u64;
        client.put_object(key, body, content_type).await?;
        Ok(size)
    }

    async fn multipart_upload<R>(
        client: Arc<dyn ObjectBackend>,
        key: &str,
        reader: &mut R,
        content_type: Option<String>,
    ) -> Result<(u64, u32), TransferFailure>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let mut session = MultipartSession::new(client, key, content_type);
        session.initiate().await?;

        let mut size: u64 = 0;
        loop {
            let part_number = session.next_part_number();
            let chunk = match read_chunk(reader, MULTIPART_PART_SIZE_BYTES).await {
                Ok(chunk) => chunk,
                Err(error) => {
                    if let Err(e) = session.abort().await {
                        tracing::warn!(error = %e, key = %key, "Abort after read failure also failed");
                    }
                    return Err(TransferFailure {
                        error,
                        part_number: Some(part_number),
                    });
                }
            };
            if chunk.is_empty() {
                break;
            }
            size += chunk.len() as u64;
            session
                .upload_part(chunk)
                .await
                .map_err(|error| TransferFailure {
                    error,
                    part_number: Some(part_number),
                })?;
            tracing::debug!(key = %key, part_number = part_number, "Uploaded part");
        }

        if session.parts().is_empty() {
            if let Err(e) = session.abort().await {
                tracing::warn!(error = %e, key = %key, "Abort of empty multipart upload failed");
            }
            return Err(StorageError::InvalidKey("Upload body is empty".to_string()).into());
        }

        session.complete().await?;
        Ok((size, session.parts().len() as u32))
    }

    /// Stream an object back to its owner.
    #[tracing::instrument(skip(self, ctx), fields(owner_id = %ctx.owner_id()))]
    pub async fn download(
        &self,
        ctx: &CallContext,
        config_id: Option<&str>,
        key: &str,
    ) -> Result<FileDownload, AppError> {
        let result = self.download_inner(ctx, config_id, key).await;

        let mut event = AuditEvent::for_context(ctx, AuditAction::DownloadFile, RESOURCE)
            .resource_id(key)
            .outcome(&result);
        if let Err(e) = &result {
            if let Some(stage) = e.stage() {
                event = event.stage(stage);
            }
        } else if let Ok(download) = &result {
            if let Some(length) = download.object.content_length {
                event = event.detail("size", length);
            }
        }
        self.auditor.record(event).await;
        result
    }

    async fn download_inner(
        &self,
        ctx: &CallContext,
        config_id: Option<&str>,
        key: &str,
    ) -> Result<FileDownload, AppError> {
        let full_key = tenant_key(ctx.owner_id(), key)?;
        let (_, client) = self.client_for(ctx, config_id).await?;
        let object = client.get_object(&full_key).await?;
        Ok(FileDownload {
            key: key.to_string(),
            object,
        })
    }

    /// Delete an object. A missing key is not an error.
    #[tracing::instrument(skip(self, ctx), fields(owner_id = %ctx.owner_id()))]
    pub async fn delete(
        &self,
        ctx: &CallContext,
        config_id: Option<&str>,
        key: &str,
    ) -> Result<(), AppError> {
        let result = async {
            let full_key = tenant_key(ctx.owner_id(), key)?;
            let (_, client) = self.client_for(ctx, config_id).await?;
            client.delete_object(&full_key).await?;
            Ok::<(), AppError>(())
        }
        .await;

        let mut event = AuditEvent::for_context(ctx, AuditAction::DeleteFile, RESOURCE)
            .resource_id(key)
            .outcome(&result);
        if let Some(stage) = result.as_ref().err().and_then(AppError::stage) {
            event = event.stage(stage);
        }
        self.auditor.record(event).await;
        result
    }
}
