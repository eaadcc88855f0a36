//! Stowage Core Library
//!
//! Domain models, error types, configuration, audit hooks and secret encryption shared by
//! every Stowage crate.

pub mod audit;
pub mod config;
pub mod constants;
pub mod encryption;
pub mod error;
pub mod models;

pub use audit::{AuditAction, AuditEvent, AuditSink, NoOpAuditSink, RequestMeta};
pub use config::{AdminBackendConfig, Config, LogFormat};
pub use encryption::EncryptionService;
pub use error::{AppError, ErrorMetadata, LogLevel};
