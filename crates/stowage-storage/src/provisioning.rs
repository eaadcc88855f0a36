//! Self-hosted backend provisioning: creates a tenant bucket with the administrator
//! credentials and describes a configuration for it.

use crate::StorageResult;
use async_trait::async_trait;
use stowage_core::models::StorageConfigDraft;

#[cfg(feature = "storage-s3")]
pub use s3_provisioner::BackendProvisioner;

pub const PROVISIONED_CONFIG_NAME: &str = "Auto-provisioned storage";

/// Creates backend resources for an owner and describes the configuration that reaches them.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(&self, owner_id: &str) -> StorageResult<StorageConfigDraft>;
}

/// `{prefix}-{first 8 alphanumeric chars of the owner id}`, lowercased.
pub fn bucket_name_for(prefix: &str, owner_id: &str) -> String {
    let suffix: String = owner_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase();
    let prefix = prefix.trim_matches('-').to_ascii_lowercase();
    if suffix.is_empty() {
        prefix
    } else {
        format!("{}-{}", prefix, suffix)
    }
}

#[cfg(feature = "storage-s3")]
mod s3_provisioner {
    use super::{bucket_name_for, Provisioner, PROVISIONED_CONFIG_NAME};
    use crate::factory::{Addressing, BackendTarget};
    use crate::{StorageError, StorageResult};
    use async_trait::async_trait;
    use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
    use aws_sdk_s3::operation::create_bucket::CreateBucketError;
    use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
    use stowage_core::constants::FALLBACK_REGION;
    use stowage_core::models::{BackendKind, StorageConfigDraft, TransferStage};
    use stowage_core::AdminBackendConfig;
    use url::Url;

    pub struct BackendProvisioner {
        admin: AdminBackendConfig,
    }

    impl BackendProvisioner {
        pub fn new(admin: AdminBackendConfig) -> Self {
            Self { admin }
        }

        fn admin_target(&self, bucket: &str) -> StorageResult<BackendTarget> {
            let endpoint = Url::parse(&self.admin.endpoint).map_err(|e| {
                StorageError::ClientCreation(format!("invalid admin endpoint: {}", e))
            })?;
            Ok(BackendTarget {
                kind: BackendKind::SelfHosted,
                addressing: Addressing::PathStyle,
                endpoint: Some(endpoint),
                region: if self.admin.region.is_empty() {
                    FALLBACK_REGION.to_string()
                } else {
                    self.admin.region.clone()
                },
                bucket: bucket.to_string(),
            })
        }
    }

    #[async_trait]
    impl Provisioner for BackendProvisioner {
        /// Create the owner's bucket (idempotent) and return a draft bound to it.
        async fn provision(&self, owner_id: &str) -> StorageResult<StorageConfigDraft> {
            let bucket = bucket_name_for(&self.admin.bucket_prefix, owner_id);
            let target = self.admin_target(&bucket)?;
            let client = crate::s3::build_client(
                &target,
                &self.admin.admin_access_key,
                &self.admin.admin_secret_key,
            );

            let mut request = client.create_bucket().bucket(&bucket);
            if target.region != FALLBACK_REGION {
                request = request.create_bucket_configuration(
                    CreateBucketConfiguration::builder()
                        .location_constraint(BucketLocationConstraint::from(target.region.as_str()))
                        .build(),
                );
            }

            match request.send().await {
                Ok(_) => {
                    tracing::info!(owner_id = %owner_id, bucket = %bucket, "Provisioned bucket");
                }
                Err(SdkError::ServiceError(service_err))
                    if matches!(service_err.err(), CreateBucketError::BucketAlreadyOwnedByYou(_)) =>
                {
                    tracing::info!(owner_id = %owner_id, bucket = %bucket, "Bucket already provisioned");
                }
                Err(e) => {
                    tracing::error!(
                        error = %DisplayErrorContext(&e),
                        owner_id = %owner_id,
                        bucket = %bucket,
                        "Bucket provisioning failed"
                    );
                    return Err(StorageError::backend(
                        TransferStage::Put,
                        format!("create bucket {}: {}", bucket, DisplayErrorContext(&e)),
                    ));
                }
            }

            Ok(StorageConfigDraft {
                name: PROVISIONED_CONFIG_NAME.to_string(),
                backend_kind: BackendKind::SelfHosted,
                access_key_id: self.admin.service_access_key.clone(),
                secret_access_key: self.admin.service_secret_key.clone(),
                region: target.region,
                bucket_name: bucket,
                endpoint_url: Some(self.admin.endpoint.clone()),
                use_tls: self.admin.use_tls,
            })
        }
    }
}
