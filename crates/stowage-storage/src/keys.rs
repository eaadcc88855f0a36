//! Tenant key namespacing.
//!
//! Key format: `users/{owner_id}/{filename}`. The prefix is added before every backend call
//! and stripped from everything shown back to the tenant.

use crate::{StorageError, StorageResult};
use stowage_core::constants::TENANT_KEY_ROOT;

/// `users/{owner_id}/`
pub fn tenant_prefix(owner_id: &str) -> StorageResult<String> {
    validate_owner_id(owner_id)?;
    Ok(format!("{}/{}/", TENANT_KEY_ROOT, owner_id))
}

/// Namespaced backend key for a logical filename.
pub fn tenant_key(owner_id: &str, filename: &str) -> StorageResult<String> {
    validate_filename(filename)?;
    Ok(format!("{}{}", tenant_prefix(owner_id)?, filename))
}

/// Logical filename for a backend key, or `None` if the key is outside the tenant's
/// namespace or collapses to nothing once the prefix is removed.
pub fn strip_tenant_prefix<'a>(owner_id: &str, full_key: &'a str) -> Option<&'a str> {
    let prefix = tenant_prefix(owner_id).ok()?;
    full_key
        .strip_prefix(prefix.as_str())
        .filter(|name| !name.is_empty())
}

/// An owner id must be exactly one key segment, otherwise its prefix could nest inside
/// another tenant's namespace.
pub fn validate_owner_id(owner_id: &str) -> StorageResult<()> {
    if owner_id.trim().is_empty() {
        return Err(StorageError::InvalidKey("Owner id cannot be empty".to_string()));
    }
    if owner_id.contains('/') || owner_id.contains('\\') {
        return Err(StorageError::InvalidKey(
            "Owner id cannot contain path separators".to_string(),
        ));
    }
    if owner_id.contains("..") {
        return Err(StorageError::InvalidKey(
            "Owner id cannot contain '..'".to_string(),
        ));
    }
    if owner_id.chars().any(char::is_control) {
        return Err(StorageError::InvalidKey(
            "Owner id cannot contain control characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_filename(filename: &str) -> StorageResult<()> {
    if filename.trim().is_empty() {
        return Err(StorageError::InvalidKey("Filename cannot be empty".to_string()));
    }
    if filename.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "Filename cannot start with '/'".to_string(),
        ));
    }
    if filename.contains('\0') {
        return Err(StorageError::InvalidKey(
            "Filename cannot contain NUL bytes".to_string(),
        ));
    }
    if filename.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(
            "Filename cannot contain '..' segments".to_string(),
        ));
    }
    Ok(())
}
