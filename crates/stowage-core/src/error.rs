//! Error types module
//!
//! All failures surfaced by the registry, the transfer engine and the HTTP layer are
//! unified under `AppError`. Each variant self-describes how it should be presented
//! through the `ErrorMetadata` trait.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

use crate::models::TransferStage;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues and backend hiccups
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "CONFIG_NOT_FOUND")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Storage configuration not found: {0}")]
    ConfigNotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Failed to create storage client: {0}")]
    ClientCreation(String),

    #[error("Cannot delete the last storage configuration")]
    LastConfig,

    #[error("No storage configuration found")]
    NoConfiguration,

    #[error("Backend operation failed during {stage}: {message}")]
    BackendOperation {
        stage: TransferStage,
        message: String,
    },

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn backend(stage: TransferStage, message: impl Into<String>) -> Self {
        AppError::BackendOperation {
            stage,
            message: message.into(),
        }
    }

    /// Stage tag for backend failures, `None` for every other variant.
    pub fn stage(&self) -> Option<TransferStage> {
        match self {
            AppError::BackendOperation { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::ConfigNotFound(_) => (
            404,
            "CONFIG_NOT_FOUND",
            false,
            Some("Verify the configuration ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Forbidden(_) => (
            403,
            "FORBIDDEN",
            false,
            Some("Use a configuration you own"),
            false,
            LogLevel::Warn,
        ),
        AppError::ClientCreation(_) => (
            400,
            "CLIENT_CREATION_FAILED",
            false,
            Some("Check credentials, bucket name and endpoint URL"),
            false,
            LogLevel::Debug,
        ),
        AppError::LastConfig => (
            409,
            "LAST_CONFIG",
            false,
            Some("Create another configuration before deleting this one"),
            false,
            LogLevel::Debug,
        ),
        AppError::NoConfiguration => (
            404,
            "NO_CONFIGURATION",
            false,
            Some("Create a storage configuration first"),
            false,
            LogLevel::Debug,
        ),
        AppError::BackendOperation { .. } => (
            502,
            "BACKEND_OPERATION_FAILED",
            true,
            Some("Check backend connectivity and retry"),
            false,
            LogLevel::Warn,
        ),
        AppError::ObjectNotFound(_) => (
            404,
            "OBJECT_NOT_FOUND",
            false,
            Some("Verify the file name exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Check authentication token"),
            false,
            LogLevel::Debug,
        ),
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::ConfigNotFound(_) => "ConfigNotFound",
            AppError::Forbidden(_) => "Forbidden",
            AppError::ClientCreation(_) => "ClientCreation",
            AppError::LastConfig => "LastConfig",
            AppError::NoConfiguration => "NoConfiguration",
            AppError::BackendOperation { .. } => "BackendOperation",
            AppError::ObjectNotFound(_) => "ObjectNotFound",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Database(_) => "Database",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::ConfigNotFound(ref id) => format!("Storage configuration not found: {}", id),
            AppError::Forbidden(ref msg) => msg.clone(),
            AppError::ClientCreation(ref msg) => {
                format!("Invalid storage configuration: {}", msg)
            }
            AppError::LastConfig => "Cannot delete the last storage configuration".to_string(),
            AppError::NoConfiguration => "No storage configuration found".to_string(),
            AppError::BackendOperation { stage, message } => {
                format!("Storage backend failed during {}: {}", stage, message)
            }
            AppError::ObjectNotFound(ref key) => format!("File not found: {}", key),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to access database");
        assert!(err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_not_found_and_forbidden() {
        let err = AppError::ConfigNotFound("cfg-1".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "CONFIG_NOT_FOUND");
        assert!(!err.is_recoverable());
        assert!(err.client_message().contains("cfg-1"));

        let err = AppError::Forbidden("not yours".to_string());
        assert_eq!(err.http_status_code(), 403);
        assert_eq!(err.error_code(), "FORBIDDEN");
        assert_eq!(err.client_message(), "not yours");
    }

    #[test]
    fn test_backend_operation_carries_stage() {
        let err = AppError::backend(TransferStage::UploadPart, "connection reset");
        assert_eq!(err.stage(), Some(TransferStage::UploadPart));
        assert_eq!(err.http_status_code(), 502);
        assert!(err.is_recoverable());
        assert!(!err.is_sensitive());
        assert!(err.client_message().contains("upload_part"));
        assert!(err.client_message().contains("connection reset"));
        assert_eq!(AppError::LastConfig.stage(), None);
    }

    #[test]
    fn test_registry_errors_map_to_client_statuses() {
        assert_eq!(AppError::LastConfig.http_status_code(), 409);
        assert_eq!(AppError::NoConfiguration.http_status_code(), 404);
        assert_eq!(
            AppError::ClientCreation("bad endpoint".to_string()).http_status_code(),
            400
        );
        assert_eq!(
            AppError::ObjectNotFound("a.txt".to_string()).http_status_code(),
            404
        );
    }

    #[test]
    fn test_detailed_message_includes_source_chain() {
        let err = AppError::from(anyhow::anyhow!("root cause").context("outer"));
        let details = err.detailed_message();
        assert!(details.contains("Internal error with source"));
        assert!(details.contains("Caused by"));
    }
}
