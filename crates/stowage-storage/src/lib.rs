//! Object storage backends for Stowage.
//!
//! A [`ClientFactory`] turns a stored configuration into an [`ObjectBackend`] bound to one
//! bucket. [`CachedClientFactory`] keeps built clients around until their credentials change.

pub mod cache;
pub mod factory;
pub mod keys;
pub mod memory;
pub mod multipart;
pub mod provisioning;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

pub use cache::{credential_fingerprint, CachedClientFactory};
#[cfg(feature = "storage-s3")]
pub use factory::S3ClientFactory;
pub use factory::{resolve_target, Addressing, BackendTarget, ClientFactory};
pub use memory::{MemoryBackend, MemoryClientFactory, MemoryStore};
pub use multipart::{read_chunk, MultipartSession, SessionState};
#[cfg(feature = "storage-s3")]
pub use provisioning::BackendProvisioner;
pub use provisioning::Provisioner;
pub use traits::{
    ObjectBackend, ObjectBody, ObjectDownload, ObjectSummary, StorageError, StorageResult,
    UploadedPart,
};
