pub mod caller;
pub mod storage_config;
pub mod transfer;

pub use caller::{CallContext, Caller};
pub use storage_config::{
    redact, BackendKind, StorageConfig, StorageConfigDraft, StorageConfigPatch, StorageConfigView,
};
pub use transfer::{FileEntry, FileListing, PageRequest, TransferStage, UploadOutcome, UploadStrategy};
