use crate::factory::{Addressing, BackendTarget};
use crate::traits::{
    ObjectBackend, ObjectDownload, ObjectSummary, StorageError, StorageResult, UploadedPart,
};
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Instant;
use stowage_core::models::TransferStage;
use tokio_util::io::ReaderStream;

const MAX_ATTEMPTS: u32 = 3;

/// Build an aws-sdk-s3 client for a resolved target with static credentials.
pub(crate) fn build_client(target: &BackendTarget, access_key_id: &str, secret_access_key: &str) -> Client {
    let credentials = Credentials::new(access_key_id, secret_access_key, None, None, "stowage");

    let mut builder = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(target.region.clone()))
        .credentials_provider(credentials)
        .retry_config(RetryConfig::standard().with_max_attempts(MAX_ATTEMPTS));

    if let Some(endpoint) = &target.endpoint {
        builder = builder.endpoint_url(endpoint.as_str().trim_end_matches('/'));
    }
    // Path-style addressing is required for MinIO and most self-hosted services
    builder = builder.force_path_style(target.addressing == Addressing::PathStyle);

    Client::from_conf(builder.build())
}

fn sdk_message<E, R>(err: &SdkError<E, R>) -> String
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    format!("{}", DisplayErrorContext(err))
}

fn to_chrono(value: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

/// S3 (or S3-compatible) client bound to one bucket.
#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    pub fn new(target: &BackendTarget, access_key_id: &str, secret_access_key: &str) -> Self {
        Self {
            client: build_client(target, access_key_id, secret_access_key),
            bucket: target.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectBackend for S3Backend {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectSummary>> {
        let start = Instant::now();
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| {
                    tracing::error!(
                        error = %DisplayErrorContext(&e),
                        bucket = %self.bucket,
                        prefix = %prefix,
                        "S3 list failed"
                    );
                    StorageError::backend(TransferStage::List, sdk_message(&e))
                })?;

            for object in page.contents() {
                if let Some(key) = object.key() {
                    objects.push(ObjectSummary {
                        key: key.to_string(),
                        size: object.size().unwrap_or(0),
                        last_modified: object.last_modified().and_then(to_chrono),
                    });
                }
            }

            match page.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        tracing::debug!(
            bucket = %self.bucket,
            prefix = %prefix,
            count = objects.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 list successful"
        );
        Ok(objects)
    }

    async fn probe(&self) -> StorageResult<()> {
        self.client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    "S3 connectivity check failed"
                );
                StorageError::backend(TransferStage::List, sdk_message(&e))
            })?;
        Ok(())
    }

    async fn put_object(&self, key: &str, body: Bytes, content_type: Option<&str>) -> StorageResult<()> {
        let size = body.len();
        let start = Instant::now();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_content_type(content_type.map(String::from))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::backend(TransferStage::Put, sdk_message(&e))
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> StorageResult<ObjectDownload> {
        let start = Instant::now();
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err)
                    if matches!(service_err.err(), GetObjectError::NoSuchKey(_)) =>
                {
                    StorageError::NotFound(key.to_string())
                }
                _ => {
                    tracing::error!(
                        error = %DisplayErrorContext(&e),
                        bucket = %self.bucket,
                        key = %key,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "S3 download failed"
                    );
                    StorageError::backend(TransferStage::Get, sdk_message(&e))
                }
            })?;

        let content_type = response.content_type().map(String::from);
        let content_length = response.content_length().and_then(|l| u64::try_from(l).ok());

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = ?content_length,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download started"
        );

        Ok(ObjectDownload {
            body: Box::pin(ReaderStream::new(response.body.into_async_read())),
            content_type,
            content_length,
        })
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        let start = Instant::now();
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                StorageError::backend(TransferStage::Delete, sdk_message(&e))
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );
        Ok(())
    }

    async fn create_multipart_upload(&self, key: &str, content_type: Option<&str>) -> StorageResult<String> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(String::from))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    "Failed to create multipart upload"
                );
                StorageError::backend(TransferStage::Initiate, sdk_message(&e))
            })?;

        output.upload_id().map(String::from).ok_or_else(|| {
            StorageError::backend(TransferStage::Initiate, "No upload ID returned from S3")
        })
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<String> {
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    part_number = part_number,
                    "Failed to upload part"
                );
                StorageError::backend(TransferStage::UploadPart, sdk_message(&e))
            })?;

        output.e_tag().map(String::from).ok_or_else(|| {
            StorageError::backend(
                TransferStage::UploadPart,
                format!("No ETag returned for part {}", part_number),
            )
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> StorageResult<()> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .iter()
                    .map(|p| {
                        CompletedPart::builder()
                            .part_number(p.part_number)
                            .e_tag(&p.e_tag)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    "Failed to complete multipart upload"
                );
                StorageError::backend(TransferStage::Complete, sdk_message(&e))
            })?;
        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    upload_id = %upload_id,
                    "Failed to abort multipart upload"
                );
                StorageError::backend(TransferStage::Abort, sdk_message(&e))
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            upload_id = %upload_id,
            "Multipart upload aborted"
        );
        Ok(())
    }
}
