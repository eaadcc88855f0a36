//! Default-flag transitions over one owner's configurations.
//!
//! Both stores compute every transition here while holding their owner-scoped lock, so the
//! single-default rule lives in one place. Records are kept in creation order.

use stowage_core::models::StorageConfig;
use stowage_core::AppError;

/// Result of removing a record from a set.
#[derive(Debug, Clone)]
pub struct Removal {
    pub removed: StorageConfig,
    /// Id of the record promoted to default, when the removed record held it.
    pub promoted: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OwnerRecordSet {
    records: Vec<StorageConfig>,
}

impl OwnerRecordSet {
    /// `records` must already be in creation order.
    pub fn new(records: Vec<StorageConfig>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[StorageConfig] {
        &self.records
    }

    pub fn into_records(self) -> Vec<StorageConfig> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&StorageConfig> {
        self.records.iter().find(|r| r.id == id)
    }

    fn position(&self, id: &str) -> Result<usize, AppError> {
        self.records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| AppError::ConfigNotFound(id.to_string()))
    }

    /// Append a new record. The first record of an owner becomes the default, later ones never do.
    pub fn insert(&mut self, mut record: StorageConfig) -> &StorageConfig {
        record.is_default = self.records.is_empty();
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// Replace a record in place, keeping its position and default flag.
    pub fn replace(&mut self, mut record: StorageConfig) -> Result<&StorageConfig, AppError> {
        let index = self.position(&record.id)?;
        record.is_default = self.records[index].is_default;
        self.records[index] = record;
        Ok(&self.records[index])
    }

    /// Make `id` the only default. Returns the ids whose flag changed.
    pub fn set_default(&mut self, id: &str) -> Result<Vec<String>, AppError> {
        let target = self.position(id)?;
        let mut changed = Vec::new();
        for (index, record) in self.records.iter_mut().enumerate() {
            let should_be_default = index == target;
            if record.is_default != should_be_default {
                record.is_default = should_be_default;
                changed.push(record.id.clone());
            }
        }
        Ok(changed)
    }

    /// Remove `id`. The sole remaining record can't be removed; a removed default is
    /// replaced by the oldest remaining record.
    pub fn remove(&mut self, id: &str) -> Result<Removal, AppError> {
        let index = self.position(id)?;
        if self.records.len() == 1 {
            return Err(AppError::LastConfig);
        }

        let removed = self.records.remove(index);
        let mut promoted = None;
        if removed.is_default && !self.records.iter().any(|r| r.is_default) {
            let heir = &mut self.records[0];
            heir.is_default = true;
            promoted = Some(heir.id.clone());
        }
        Ok(Removal { removed, promoted })
    }

    /// The flagged default, or the oldest record when no flag is set.
    pub fn default_record(&self) -> Option<&StorageConfig> {
        self.records
            .iter()
            .find(|r| r.is_default)
            .or_else(|| self.records.first())
    }

    /// Insert or replace an imported record verbatim. An imported default displaces the
    /// current one.
    pub fn upsert_imported(&mut self, record: StorageConfig) {
        let is_default = record.is_default;
        let id = record.id.clone();
        match self.records.iter().position(|r| r.id == record.id) {
            Some(index) => self.records[index] = record,
            None => self.records.push(record),
        }
        if is_default {
            for other in self.records.iter_mut().filter(|r| r.id != id) {
                other.is_default = false;
            }
        }
    }

    /// Drop a record without any default handling (it moved to another owner).
    pub fn detach(&mut self, id: &str) -> Option<StorageConfig> {
        let index = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(index))
    }

    /// Restore exactly one default: the oldest flagged record wins, or the oldest record
    /// when none is flagged. Returns the ids whose flag changed.
    pub fn repair(&mut self) -> Vec<String> {
        let keep = match self.records.iter().position(|r| r.is_default) {
            Some(index) => index,
            None if self.records.is_empty() => return Vec::new(),
            None => 0,
        };
        let mut changed = Vec::new();
        for (index, record) in self.records.iter_mut().enumerate() {
            let should_be_default = index == keep;
            if record.is_default != should_be_default {
                record.is_default = should_be_default;
                changed.push(record.id.clone());
            }
        }
        changed
    }

    /// Number of records flagged default.
    pub fn default_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_default).count()
    }
}
