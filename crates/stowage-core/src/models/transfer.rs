//! File transfer models: listing pages, upload outcomes and failure stages.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Point in a transfer at which a backend call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransferStage {
    Initiate,
    ReadPart,
    UploadPart,
    Complete,
    Abort,
    Put,
    Get,
    Delete,
    List,
}

impl TransferStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStage::Initiate => "initiate",
            TransferStage::ReadPart => "read_part",
            TransferStage::UploadPart => "upload_part",
            TransferStage::Complete => "complete",
            TransferStage::Abort => "abort",
            TransferStage::Put => "put",
            TransferStage::Get => "get",
            TransferStage::Delete => "delete",
            TransferStage::List => "list",
        }
    }
}

impl Display for TransferStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamped pagination window. Invalid input never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// page < 1 becomes 1; page_size outside 1..=100 becomes the default of 10.
    pub fn clamped(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = match page {
            Some(p) if p >= 1 => p.min(u32::MAX as i64) as u32,
            _ => 1,
        };
        let page_size = match page_size {
            Some(s) if s >= 1 && s <= MAX_PAGE_SIZE as i64 => s as u32,
            _ => DEFAULT_PAGE_SIZE,
        };
        Self { page, page_size }
    }

    /// Slice bounds into a list of `total` items, clamped so out-of-range pages are empty.
    pub fn bounds(&self, total: usize) -> (usize, usize) {
        let start = (self.page as usize - 1).saturating_mul(self.page_size as usize);
        let start = start.min(total);
        let end = start.saturating_add(self.page_size as usize).min(total);
        (start, end)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::clamped(None, None)
    }
}

/// One object in a tenant listing. `key` is the logical filename, `full_key` the backend key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileEntry {
    pub key: String,
    pub full_key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileListing {
    pub files: Vec<FileEntry>,
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
    pub config_id: String,
    pub config_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UploadStrategy {
    SinglePut,
    Multipart,
}

impl Display for UploadStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            UploadStrategy::SinglePut => write!(f, "single_put"),
            UploadStrategy::Multipart => write!(f, "multipart"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadOutcome {
    pub key: String,
    pub size: u64,
    pub parts: u32,
    pub strategy: UploadStrategy,
    pub config_id: String,
}
