use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::models::status::{ProcessingResult, ProcessingStatus, Status};

/// Process-wide map of pipeline progress, keyed by stored filename.
///
/// Each pipeline only writes its own key. A record moves forward from
/// `processing` to `completed` or `error` and is never written again once
/// terminal.
#[derive(Clone, Default)]
pub struct StatusStore {
    records: Arc<DashMap<String, ProcessingStatus>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the `processing` record. Returns false if one already exists.
    pub fn begin(&self, filename: &str, original_name: &str) -> bool {
        match self.records.entry(filename.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(ProcessingStatus::new(filename, original_name));
                true
            }
        }
    }

    pub fn progress(&self, filename: &str, message: impl Into<String>) -> bool {
        self.update(filename, |record| {
            record.message = message.into();
        })
    }

    pub fn complete(&self, filename: &str, result: ProcessingResult) -> bool {
        self.update(filename, |record| {
            record.status = Status::Completed;
            record.message = "Processing complete".to_string();
            record.result = Some(result);
            record.completed_at = Some(Utc::now());
        })
    }

    pub fn fail(&self, filename: &str, error: impl Into<String>) -> bool {
        self.update(filename, |record| {
            record.status = Status::Error;
            record.message = "Processing failed".to_string();
            record.error = Some(error.into());
            record.completed_at = Some(Utc::now());
        })
    }

    pub fn get(&self, filename: &str) -> Option<ProcessingStatus> {
        self.records.get(filename).map(|r| r.value().clone())
    }

    pub fn snapshot(&self) -> BTreeMap<String, ProcessingStatus> {
        self.records
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Drops terminal records last touched before `cutoff`. Records still
    /// processing are kept regardless of age.
    pub fn evict_terminal_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, record| !(record.status.is_terminal() && record.updated_at < cutoff));
        before - self.records.len()
    }

    fn update(&self, filename: &str, apply: impl FnOnce(&mut ProcessingStatus)) -> bool {
        let Some(mut record) = self.records.get_mut(filename) else {
            tracing::warn!(filename, "No status record to update");
            return false;
        };
        if record.status.is_terminal() {
            tracing::warn!(filename, status = ?record.status, "Ignoring update to finished record");
            return false;
        }
        apply(record.value_mut());
        record.updated_at = Utc::now();
        true
    }
}
