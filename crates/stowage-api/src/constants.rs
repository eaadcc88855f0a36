//! API constants

/// Version segment of every route.
pub const API_VERSION: &str = "v1";

/// Prefix all routes are mounted under.
pub const API_PREFIX: &str = "/api/v1";

/// Multipart form field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// Number of reverse proxies whose `X-Forwarded-For` entries are trusted.
pub const TRUSTED_PROXY_COUNT: usize = 1;
