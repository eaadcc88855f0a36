//! Business logic for the storage service: the configuration registry, the transfer engine
//! and the facade that ties them to connectivity checks and provisioning.

pub mod audit;
pub mod bulk;
pub mod manager;
pub mod registry;
pub mod transfer;

pub use audit::{Auditor, FanoutAuditSink, MemoryAuditSink, TracingAuditSink};
pub use bulk::BulkFormat;
pub use manager::{ExportPayload, StorageManager};
pub use registry::ConfigRegistry;
pub use transfer::{FileDownload, TransferEngine};
