//! Fixed limits shared by the registry, the transfer engine and the API.

/// Uploads at or above this size use the multipart protocol.
pub const MULTIPART_THRESHOLD_BYTES: u64 = 5 * 1024 * 1024;

/// Size of every multipart chunk except possibly the last one.
pub const MULTIPART_PART_SIZE_BYTES: usize = 5 * 1024 * 1024;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Root of every tenant key namespace on the backend.
pub const TENANT_KEY_ROOT: &str = "users";

pub const MAX_CONFIG_NAME_LEN: u64 = 255;

/// Region used for self-hosted backends that do not care about regions.
pub const FALLBACK_REGION: &str = "us-east-1";
