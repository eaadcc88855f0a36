//! In-process object backend for tests and local development.
//!
//! Buckets live in a shared `MemoryStore`, so every client created for the same bucket sees
//! the same objects. Failures can be injected per stage or per part number.

use crate::factory::{resolve_target, ClientFactory};
use crate::traits::{
    ObjectBackend, ObjectDownload, ObjectSummary, StorageError, StorageResult, UploadedPart,
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use stowage_core::models::{StorageConfig, TransferStage};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
}

#[derive(Debug)]
struct PendingUpload {
    bucket: String,
    key: String,
    content_type: Option<String>,
    parts: BTreeMap<i32, (String, Bytes)>,
}

#[derive(Debug, Default)]
struct StoreState {
    buckets: HashMap<String, BTreeMap<String, StoredObject>>,
    uploads: HashMap<String, PendingUpload>,
    next_upload_id: u64,
    aborted_uploads: u64,
    completed_uploads: u64,
    failing_stages: HashSet<TransferStage>,
    failing_part: Option<i32>,
    unreachable_buckets: HashSet<String>,
}

/// Shared state behind every `MemoryBackend`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(&self, bucket: impl Into<String>) -> MemoryBackend {
        MemoryBackend {
            store: self.clone(),
            bucket: bucket.into(),
        }
    }

    /// Make every call for `stage` fail until cleared.
    pub async fn fail_stage(&self, stage: TransferStage) {
        self.state.lock().await.failing_stages.insert(stage);
    }

    /// Make the upload of `part_number` fail.
    pub async fn fail_part(&self, part_number: i32) {
        self.state.lock().await.failing_part = Some(part_number);
    }

    pub async fn clear_faults(&self) {
        let mut state = self.state.lock().await;
        state.failing_stages.clear();
        state.failing_part = None;
        state.unreachable_buckets.clear();
    }

    /// Every call against `bucket` fails as if the backend could not be reached.
    pub async fn set_unreachable(&self, bucket: &str) {
        self.state
            .lock()
            .await
            .unreachable_buckets
            .insert(bucket.to_string());
    }

    pub async fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        let state = self.state.lock().await;
        state
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|o| o.data.clone())
    }

    pub async fn object_count(&self, bucket: &str) -> usize {
        let state = self.state.lock().await;
        state.buckets.get(bucket).map(BTreeMap::len).unwrap_or(0)
    }

    /// Multipart uploads that were started and neither completed nor aborted.
    pub async fn open_uploads(&self) -> usize {
        self.state.lock().await.uploads.len()
    }

    pub async fn aborted_uploads(&self) -> u64 {
        self.state.lock().await.aborted_uploads
    }

    pub async fn completed_uploads(&self) -> u64 {
        self.state.lock().await.completed_uploads
    }
}

impl StoreState {
    fn check(&self, bucket: &str, stage: TransferStage) -> StorageResult<()> {
        if self.unreachable_buckets.contains(bucket) {
            return Err(StorageError::backend(stage, "connection refused"));
        }
        if self.failing_stages.contains(&stage) {
            return Err(StorageError::backend(stage, "injected failure"));
        }
        Ok(())
    }
}

/// Client for one bucket of a `MemoryStore`.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    store: MemoryStore,
    bucket: String,
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectSummary>> {
        let state = self.store.state.lock().await;
        state.check(&self.bucket, TransferStage::List)?;
        Ok(state
            .buckets
            .get(&self.bucket)
            .map(|objects| {
                objects
                    .range(prefix.to_string()..)
                    .take_while(|(key, _)| key.starts_with(prefix))
                    .map(|(key, object)| ObjectSummary {
                        key: key.clone(),
                        size: object.data.len() as i64,
                        last_modified: Some(object.last_modified),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn probe(&self) -> StorageResult<()> {
        let state = self.store.state.lock().await;
        state.check(&self.bucket, TransferStage::List)
    }

    async fn put_object(&self, key: &str, body: Bytes, content_type: Option<&str>) -> StorageResult<()> {
        let mut state = self.store.state.lock().await;
        state.check(&self.bucket, TransferStage::Put)?;
        state.buckets.entry(self.bucket.clone()).or_default().insert(
            key.to_string(),
            StoredObject {
                data: body,
                content_type: content_type.map(String::from),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> StorageResult<ObjectDownload> {
        let state = self.store.state.lock().await;
        state.check(&self.bucket, TransferStage::Get)?;
        let object = state
            .buckets
            .get(&self.bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let length = object.data.len() as u64;
        let chunks: Vec<Result<Bytes, std::io::Error>> = object
            .data
            .chunks(64 * 1024)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        Ok(ObjectDownload {
            body: Box::pin(futures::stream::iter(chunks)),
            content_type: object.content_type,
            content_length: Some(length),
        })
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        let mut state = self.store.state.lock().await;
        state.check(&self.bucket, TransferStage::Delete)?;
        if let Some(objects) = state.buckets.get_mut(&self.bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    async fn create_multipart_upload(&self, key: &str, content_type: Option<&str>) -> StorageResult<String> {
        let mut state = self.store.state.lock().await;
        state.check(&self.bucket, TransferStage::Initiate)?;
        state.next_upload_id += 1;
        let upload_id = format!("upload-{}", state.next_upload_id);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                content_type: content_type.map(String::from),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<String> {
        let mut state = self.store.state.lock().await;
        state.check(&self.bucket, TransferStage::UploadPart)?;
        if state.failing_part == Some(part_number) {
            return Err(StorageError::backend(
                TransferStage::UploadPart,
                format!("injected failure for part {}", part_number),
            ));
        }
        let upload = state
            .uploads
            .get_mut(upload_id)
            .filter(|u| u.key == key)
            .ok_or_else(|| StorageError::backend(TransferStage::UploadPart, "NoSuchUpload"))?;
        let e_tag = format!("\"etag-{}-{}\"", upload_id, part_number);
        upload.parts.insert(part_number, (e_tag.clone(), body));
        Ok(e_tag)
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> StorageResult<()> {
        let mut state = self.store.state.lock().await;
        state.check(&self.bucket, TransferStage::Complete)?;
        let upload = match state.uploads.get(upload_id) {
            Some(upload) if upload.key == key => upload,
            _ => return Err(StorageError::backend(TransferStage::Complete, "NoSuchUpload")),
        };

        let mut data = BytesMut::new();
        let mut previous = 0;
        for part in parts {
            if part.part_number <= previous {
                return Err(StorageError::backend(TransferStage::Complete, "InvalidPartOrder"));
            }
            previous = part.part_number;
            match upload.parts.get(&part.part_number) {
                Some((e_tag, body)) if *e_tag == part.e_tag => data.extend_from_slice(body),
                _ => return Err(StorageError::backend(TransferStage::Complete, "InvalidPart")),
            }
        }

        let upload = match state.uploads.remove(upload_id) {
            Some(upload) => upload,
            None => return Err(StorageError::backend(TransferStage::Complete, "NoSuchUpload")),
        };
        state.buckets.entry(upload.bucket).or_default().insert(
            upload.key,
            StoredObject {
                data: data.freeze(),
                content_type: upload.content_type,
                last_modified: Utc::now(),
            },
        );
        state.completed_uploads += 1;
        Ok(())
    }

    async fn abort_multipart_upload(&self, _key: &str, upload_id: &str) -> StorageResult<()> {
        let mut state = self.store.state.lock().await;
        state.check(&self.bucket, TransferStage::Abort)?;
        if state.uploads.remove(upload_id).is_some() {
            state.aborted_uploads += 1;
        }
        Ok(())
    }
}

/// Factory handing out `MemoryBackend`s after the same validation the S3 factory applies.
#[derive(Debug, Clone, Default)]
pub struct MemoryClientFactory {
    store: MemoryStore,
}

impl MemoryClientFactory {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

#[async_trait]
impl ClientFactory for MemoryClientFactory {
    async fn create(&self, config: &StorageConfig) -> StorageResult<Arc<dyn ObjectBackend>> {
        let target = resolve_target(config)?;
        Ok(Arc::new(self.store.backend(target.bucket)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn read_all(download: ObjectDownload) -> Vec<u8> {
        let mut body = download.body;
        let mut out = Vec::new();
        while let Some(chunk) = body.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        let backend = store.backend("b");

        backend
            .put_object("users/a/x.txt", Bytes::from_static(b"hello"), Some("text/plain"))
            .await
            .unwrap();
        let download = backend.get_object("users/a/x.txt").await.unwrap();
        assert_eq!(download.content_type.as_deref(), Some("text/plain"));
        assert_eq!(download.content_length, Some(5));
        assert_eq!(read_all(download).await, b"hello");

        backend.delete_object("users/a/x.txt").await.unwrap();
        assert!(matches!(
            backend.get_object("users/a/x.txt").await,
            Err(StorageError::NotFound(_))
        ));
        // deleting a missing key is not an error
        backend.delete_object("users/a/x.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_is_prefix_scoped() {
        let store = MemoryStore::new();
        let backend = store.backend("b");
        for key in ["users/a/1", "users/a/2", "users/ab/3", "users/b/4"] {
            backend.put_object(key, Bytes::from_static(b"x"), None).await.unwrap();
        }
        let listed = backend.list_objects("users/a/").await.unwrap();
        let keys: Vec<_> = listed.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["users/a/1", "users/a/2"]);
    }

    #[tokio::test]
    async fn test_multipart_assembles_parts_in_order() {
        let store = MemoryStore::new();
        let backend = store.backend("b");
        let id = backend.create_multipart_upload("k", None).await.unwrap();
        let e1 = backend.upload_part("k", &id, 1, Bytes::from_static(b"ab")).await.unwrap();
        let e2 = backend.upload_part("k", &id, 2, Bytes::from_static(b"cd")).await.unwrap();
        backend
            .complete_multipart_upload(
                "k",
                &id,
                &[
                    UploadedPart { part_number: 1, e_tag: e1 },
                    UploadedPart { part_number: 2, e_tag: e2 },
                ],
            )
            .await
            .unwrap();
        assert_eq!(store.object("b", "k").await.unwrap(), Bytes::from_static(b"abcd"));
        assert_eq!(store.open_uploads().await, 0);
        assert_eq!(store.completed_uploads().await, 1);
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let store = MemoryStore::new();
        let backend = store.backend("b");
        store.fail_part(2).await;
        let id = backend.create_multipart_upload("k", None).await.unwrap();
        assert!(backend.upload_part("k", &id, 1, Bytes::from_static(b"a")).await.is_ok());
        let err = backend.upload_part("k", &id, 2, Bytes::from_static(b"b")).await.unwrap_err();
        assert_eq!(err.stage(), Some(TransferStage::UploadPart));

        store.set_unreachable("b").await;
        assert_eq!(
            backend.probe().await.unwrap_err().stage(),
            Some(TransferStage::List)
        );
        store.clear_faults().await;
        assert!(backend.probe().await.is_ok());
    }
}
