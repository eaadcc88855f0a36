//! Multipart upload session.
//!
//! ```text
//! Idle -> Initiated -> {PartUploading -> PartUploaded}* -> Completing -> Completed
//!   any non-terminal state -> Aborting -> Aborted
//! ```
//!
//! A failed part upload or completion aborts the session with the backend before the error
//! is returned. A session dropped while still in progress (for example because the request
//! future was cancelled) aborts from a spawned task.

use crate::traits::{ObjectBackend, StorageError, StorageResult, UploadedPart};
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use stowage_core::models::TransferStage;
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Initiated,
    PartUploading,
    PartUploaded,
    Completing,
    Completed,
    Aborting,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Aborted)
    }
}

pub struct MultipartSession {
    backend: Arc<dyn ObjectBackend>,
    key: String,
    content_type: Option<String>,
    upload_id: Option<String>,
    parts: Vec<UploadedPart>,
    next_part_number: i32,
    state: SessionState,
}

impl MultipartSession {
    pub fn new(backend: Arc<dyn ObjectBackend>, key: impl Into<String>, content_type: Option<String>) -> Self {
        Self {
            backend,
            key: key.into(),
            content_type,
            upload_id: None,
            parts: Vec::new(),
            next_part_number: 1,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }

    pub fn parts(&self) -> &[UploadedPart] {
        &self.parts
    }

    /// Part number the next `upload_part` call will use.
    pub fn next_part_number(&self) -> i32 {
        self.next_part_number
    }

    fn expect_state(&self, allowed: &[SessionState], operation: &str) -> StorageResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(StorageError::InvalidState(format!(
                "cannot {} in state {:?}",
                operation, self.state
            )))
        }
    }

    pub async fn initiate(&mut self) -> StorageResult<()> {
        self.expect_state(&[SessionState::Idle], "initiate")?;

        match self
            .backend
            .create_multipart_upload(&self.key, self.content_type.as_deref())
            .await
        {
            Ok(upload_id) => {
                tracing::debug!(key = %self.key, upload_id = %upload_id, "Multipart upload initiated");
                self.upload_id = Some(upload_id);
                self.state = SessionState::Initiated;
                Ok(())
            }
            Err(e) => {
                // Nothing exists on the backend yet
                self.state = SessionState::Aborted;
                Err(e)
            }
        }
    }

    /// Upload `body` as the next sequential part. Aborts the session on failure.
    pub async fn upload_part(&mut self, body: Bytes) -> StorageResult<i32> {
        self.expect_state(
            &[SessionState::Initiated, SessionState::PartUploaded],
            "upload part",
        )?;
        let upload_id = self.require_upload_id()?;
        let part_number = self.next_part_number;
        self.state = SessionState::PartUploading;

        match self
            .backend
            .upload_part(&self.key, &upload_id, part_number, body)
            .await
        {
            Ok(e_tag) => {
                self.parts.push(UploadedPart { part_number, e_tag });
                self.next_part_number += 1;
                self.state = SessionState::PartUploaded;
                Ok(part_number)
            }
            Err(e) => {
                self.abort_quietly().await;
                Err(e)
            }
        }
    }

    /// Finalize the object from the ordered list of uploaded parts. Aborts on failure.
    pub async fn complete(&mut self) -> StorageResult<()> {
        self.expect_state(&[SessionState::PartUploaded], "complete")?;
        let upload_id = self.require_upload_id()?;
        self.state = SessionState::Completing;

        match self
            .backend
            .complete_multipart_upload(&self.key, &upload_id, &self.parts)
            .await
        {
            Ok(()) => {
                self.state = SessionState::Completed;
                Ok(())
            }
            Err(e) => {
                self.abort_quietly().await;
                Err(e)
            }
        }
    }

    /// Abort the session with the backend. A no-op once terminal.
    pub async fn abort(&mut self) -> StorageResult<()> {
        if self.state.is_terminal() {
            return Ok(());
        }
        self.state = SessionState::Aborting;
        let result = match self.upload_id.as_deref() {
            Some(upload_id) => self.backend.abort_multipart_upload(&self.key, upload_id).await,
            None => Ok(()),
        };
        self.state = SessionState::Aborted;
        result
    }

    async fn abort_quietly(&mut self) {
        if let Err(e) = self.abort().await {
            tracing::warn!(
                error = %e,
                key = %self.key,
                upload_id = ?self.upload_id,
                "Abort after failed multipart upload also failed"
            );
        }
    }

    fn require_upload_id(&self) -> StorageResult<String> {
        self.upload_id
            .clone()
            .ok_or_else(|| StorageError::InvalidState("session has no upload id".to_string()))
    }
}

impl Drop for MultipartSession {
    fn drop(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        let Some(upload_id) = self.upload_id.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(key = %self.key, upload_id = %upload_id, "Multipart session dropped without a runtime; upload left open");
            return;
        };

        let backend = self.backend.clone();
        let key = std::mem::take(&mut self.key);
        tracing::info!(key = %key, upload_id = %upload_id, "Multipart session dropped in progress, aborting");
        handle.spawn(async move {
            if let Err(e) = backend.abort_multipart_upload(&key, &upload_id).await {
                tracing::warn!(error = %e, key = %key, upload_id = %upload_id, "Background multipart abort failed");
            }
        });
    }
}

/// Fill one chunk of at most `size` bytes from `reader`.
///
/// Returns an empty buffer only at end of stream. Read errors are tagged `read_part`.
pub async fn read_chunk<R>(reader: &mut R, size: usize) -> StorageResult<Bytes>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = BytesMut::with_capacity(size);
    while buf.len() < size {
        let remaining = size - buf.len();
        let n = (&mut *reader)
            .take(remaining as u64)
            .read_buf(&mut buf)
            .await
            .map_err(|e| StorageError::backend(TransferStage::ReadPart, e.to_string()))?;
        if n == 0 {
            break;
        }
    }
    Ok(buf.freeze())
}
