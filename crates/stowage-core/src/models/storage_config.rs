//! Storage configuration models: one backend binding (credentials, bucket, endpoint) per record.

use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::AppError;

/// Which flavour of S3-compatible service a configuration points at.
///
/// Resolved once into an addressing mode by the client factory; nothing else branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Public cloud: virtual-hosted addressing, region only.
    #[serde(alias = "aws", alias = "s3")]
    Cloud,
    /// Self-hosted S3-compatible service: path-style addressing against `endpoint_url`.
    #[serde(alias = "minio", alias = "self-hosted")]
    SelfHosted,
}

impl BackendKind {
    /// Short name used in bulk export files.
    pub fn export_name(&self) -> &'static str {
        match self {
            BackendKind::Cloud => "aws",
            BackendKind::SelfHosted => "minio",
        }
    }
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cloud" | "aws" | "s3" | "" => Ok(BackendKind::Cloud),
            "self_hosted" | "self-hosted" | "minio" => Ok(BackendKind::SelfHosted),
            other => Err(AppError::InvalidInput(format!(
                "Invalid backend kind: {}",
                other
            ))),
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Cloud => write!(f, "cloud"),
            BackendKind::SelfHosted => write!(f, "self_hosted"),
        }
    }
}

/// A stored backend binding for one tenant. Contains the plaintext secret; never log it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub backend_kind: BackendKind,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket_name: String,
    pub endpoint_url: Option<String>,
    pub use_tls: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Debug for StorageConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("name", &self.name)
            .field("backend_kind", &self.backend_kind)
            .field("access_key_id", &redact(&self.access_key_id))
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("bucket_name", &self.bucket_name)
            .field("endpoint_url", &self.endpoint_url)
            .field("use_tls", &self.use_tls)
            .field("is_default", &self.is_default)
            .finish()
    }
}

/// Fields supplied by a tenant when creating a configuration.
#[derive(Clone, Deserialize, Validate, ToSchema)]
pub struct StorageConfigDraft {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    #[serde(default = "default_backend_kind")]
    pub backend_kind: BackendKind,
    #[validate(length(min = 1, message = "Access key is required"))]
    pub access_key_id: String,
    #[validate(length(min = 1, message = "Secret key is required"))]
    pub secret_access_key: String,
    #[serde(default)]
    pub region: String,
    #[validate(length(min = 1, max = 63, message = "Bucket name must be 1-63 characters"))]
    pub bucket_name: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_use_tls")]
    pub use_tls: bool,
}

fn default_backend_kind() -> BackendKind {
    BackendKind::Cloud
}

fn default_use_tls() -> bool {
    true
}

impl Debug for StorageConfigDraft {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfigDraft")
            .field("name", &self.name)
            .field("backend_kind", &self.backend_kind)
            .field("bucket_name", &self.bucket_name)
            .field("endpoint_url", &self.endpoint_url)
            .finish_non_exhaustive()
    }
}

impl StorageConfigDraft {
    /// Field validation plus the endpoint rule for self-hosted backends.
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;
        check_endpoint_presence(self.backend_kind, self.endpoint_url.as_deref())
    }
}

/// Partial update. `None` (or an empty secret) leaves the stored value untouched.
#[derive(Clone, Default, Deserialize, Validate, ToSchema)]
pub struct StorageConfigPatch {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,
    pub backend_kind: Option<BackendKind>,
    #[validate(length(min = 1, message = "Access key cannot be empty"))]
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
    #[validate(length(min = 1, max = 63, message = "Bucket name must be 1-63 characters"))]
    pub bucket_name: Option<String>,
    pub endpoint_url: Option<String>,
    pub use_tls: Option<bool>,
}

impl Debug for StorageConfigPatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfigPatch")
            .field("name", &self.name)
            .field("backend_kind", &self.backend_kind)
            .field("bucket_name", &self.bucket_name)
            .field("endpoint_url", &self.endpoint_url)
            .field("use_tls", &self.use_tls)
            .finish_non_exhaustive()
    }
}

fn check_endpoint_presence(kind: BackendKind, endpoint: Option<&str>) -> Result<(), AppError> {
    if kind == BackendKind::SelfHosted && endpoint.map(str::trim).unwrap_or("").is_empty() {
        return Err(AppError::InvalidInput(
            "Endpoint URL is required for self-hosted backends".to_string(),
        ));
    }
    Ok(())
}

fn normalize_endpoint(endpoint: Option<String>) -> Option<String> {
    endpoint
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
}

impl StorageConfig {
    /// Build a new, non-default record. The registry decides the default flag.
    pub fn from_draft(
        id: String,
        owner_id: &str,
        draft: StorageConfigDraft,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id: owner_id.to_string(),
            name: draft.name.trim().to_string(),
            backend_kind: draft.backend_kind,
            access_key_id: draft.access_key_id,
            secret_access_key: draft.secret_access_key,
            region: draft.region.trim().to_string(),
            bucket_name: draft.bucket_name.trim().to_string(),
            endpoint_url: normalize_endpoint(draft.endpoint_url),
            use_tls: draft.use_tls,
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge the mutable fields of `patch`. Identity, ownership, creation time and the
    /// default flag always come from `self`.
    pub fn merged_with(&self, patch: StorageConfigPatch, now: DateTime<Utc>) -> Result<Self, AppError> {
        patch.validate()?;

        let mut merged = self.clone();
        if let Some(name) = patch.name {
            merged.name = name.trim().to_string();
        }
        if let Some(kind) = patch.backend_kind {
            merged.backend_kind = kind;
        }
        if let Some(access_key_id) = patch.access_key_id {
            merged.access_key_id = access_key_id;
        }
        if let Some(secret) = patch.secret_access_key.filter(|s| !s.is_empty()) {
            merged.secret_access_key = secret;
        }
        if let Some(region) = patch.region {
            merged.region = region.trim().to_string();
        }
        if let Some(bucket) = patch.bucket_name {
            merged.bucket_name = bucket.trim().to_string();
        }
        if patch.endpoint_url.is_some() {
            merged.endpoint_url = normalize_endpoint(patch.endpoint_url);
        }
        if let Some(use_tls) = patch.use_tls {
            merged.use_tls = use_tls;
        }
        merged.updated_at = now;

        check_endpoint_presence(merged.backend_kind, merged.endpoint_url.as_deref())?;
        Ok(merged)
    }

    /// Listing view with both keys masked.
    pub fn redacted(&self) -> StorageConfigView {
        StorageConfigView {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            name: self.name.clone(),
            backend_kind: self.backend_kind,
            access_key_id: redact(&self.access_key_id),
            secret_access_key: redact(&self.secret_access_key),
            region: self.region.clone(),
            bucket_name: self.bucket_name.clone(),
            endpoint_url: self.endpoint_url.clone(),
            use_tls: self.use_tls,
            is_default: self.is_default,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Storage configuration as shown in list views.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StorageConfigView {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub backend_kind: BackendKind,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket_name: String,
    pub endpoint_url: Option<String>,
    pub use_tls: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Keep a short prefix (at most 4 chars, never more than half the value) and mask the rest.
pub fn redact(value: &str) -> String {
    let total = value.chars().count();
    let keep = std::cmp::min(4, total / 2);
    let prefix: String = value.chars().take(keep).collect();
    format!("{}****", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> StorageConfigDraft {
        StorageConfigDraft {
            name: "primary".to_string(),
            backend_kind: BackendKind::SelfHosted,
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG".to_string(),
            region: String::new(),
            bucket_name: "tenant-bucket".to_string(),
            endpoint_url: Some("http://localhost:9000".to_string()),
            use_tls: false,
        }
    }

    #[test]
    fn test_redact_keeps_short_prefix() {
        assert_eq!(redact("wJalrXUtnFEMI/K7MDENG"), "wJal****");
        assert_eq!(redact("abc"), "a****");
        assert_eq!(redact("a"), "****");
        assert_eq!(redact(""), "****");
    }

    #[test]
    fn test_redacted_view_never_contains_secret() {
        let config = StorageConfig::from_draft("id-1".to_string(), "alice", draft(), Utc::now());
        let view = config.redacted();
        assert_ne!(view.secret_access_key, config.secret_access_key);
        assert!(!serde_json::to_string(&view)
            .unwrap()
            .contains(&config.secret_access_key));
        assert!(!format!("{:?}", config).contains(&config.secret_access_key));
    }

    #[test]
    fn test_self_hosted_requires_endpoint() {
        let mut d = draft();
        d.endpoint_url = Some("   ".to_string());
        assert!(matches!(d.check(), Err(AppError::InvalidInput(_))));

        d.backend_kind = BackendKind::Cloud;
        d.region = "eu-west-1".to_string();
        assert!(d.check().is_ok());
    }

    #[test]
    fn test_merge_preserves_identity_and_default_flag() {
        let created = Utc::now() - chrono::Duration::hours(1);
        let mut config = StorageConfig::from_draft("id-1".to_string(), "alice", draft(), created);
        config.is_default = true;

        let patch = StorageConfigPatch {
            name: Some("renamed".to_string()),
            secret_access_key: Some(String::new()),
            bucket_name: Some("other-bucket".to_string()),
            ..Default::default()
        };
        let merged = config.merged_with(patch, Utc::now()).unwrap();

        assert_eq!(merged.id, "id-1");
        assert_eq!(merged.owner_id, "alice");
        assert_eq!(merged.created_at, created);
        assert!(merged.is_default);
        assert_eq!(merged.name, "renamed");
        assert_eq!(merged.bucket_name, "other-bucket");
        assert_eq!(merged.secret_access_key, config.secret_access_key);
        assert!(merged.updated_at > created);
    }

    #[test]
    fn test_backend_kind_accepts_legacy_names() {
        assert_eq!("minio".parse::<BackendKind>().unwrap(), BackendKind::SelfHosted);
        assert_eq!("aws".parse::<BackendKind>().unwrap(), BackendKind::Cloud);
        let kind: BackendKind = serde_json::from_str("\"minio\"").unwrap();
        assert_eq!(kind, BackendKind::SelfHosted);
        assert!("ftp".parse::<BackendKind>().is_err());
    }
}
