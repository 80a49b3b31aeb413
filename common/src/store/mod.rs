//! The record store seam.
//!
//! Reads never fail: a store that cannot be reached or returns garbage reads as
//! empty. Writes return [`StoreError`] so the operator API can report a failed
//! import, while verification treats them as best-effort.

use crate::model::record::Record;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("record store is corrupted: {0}")]
    Corrupted(String),
}

/// Persistence for certificate records.
///
/// Records are write-once: there is no update, only insert and delete.
pub trait RecordStore: Send + Sync {
    /// All records, in insertion order.
    fn list(&self) -> Vec<Record>;
    /// Appends `records`. An identifier already present keeps its first record.
    fn insert(&self, records: &[Record]) -> Result<(), StoreError>;
    fn delete_one(&self, id: &str) -> Result<(), StoreError>;
    fn delete_all(&self) -> Result<(), StoreError>;
    fn get_by_id(&self, id: &str) -> Option<Record>;
}

/// In-process store backed by a `Vec`.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<Record>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<Record>) -> Self {
        MemoryRecordStore {
            records: Mutex::new(records),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        // A panic while holding the lock cannot leave a half-written record behind.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RecordStore for MemoryRecordStore {
    fn list(&self) -> Vec<Record> {
        self.lock().clone()
    }

    fn insert(&self, records: &[Record]) -> Result<(), StoreError> {
        let mut stored = self.lock();
        for record in records {
            if !stored.iter().any(|r| r.id == record.id) {
                stored.push(record.clone());
            }
        }
        Ok(())
    }

    fn delete_one(&self, id: &str) -> Result<(), StoreError> {
        self.lock().retain(|r| r.id != id);
        Ok(())
    }

    fn delete_all(&self) -> Result<(), StoreError> {
        self.lock().clear();
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Option<Record> {
        self.lock().iter().find(|r| r.id == id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record::tests::sample_record;

    #[test]
    fn insert_keeps_order_and_first_registration() {
        let store = MemoryRecordStore::new();
        let first = sample_record();
        let second = Record {
            id: "ICES-2024-002".to_string(),
            student_name: "Rahul Sharma".to_string(),
            ..sample_record()
        };
        let duplicate = Record {
            student_name: "Someone Else".to_string(),
            ..sample_record()
        };

        store.insert(&[first.clone(), second.clone()]).unwrap();
        store.insert(&[duplicate]).unwrap();

        assert_eq!(store.list(), vec![first.clone(), second]);
        assert_eq!(store.get_by_id("ICES-2024-001"), Some(first));
    }

    #[test]
    fn deletes_one_or_all() {
        let store = MemoryRecordStore::with_records(vec![
            sample_record(),
            Record {
                id: "ICES-2024-002".to_string(),
                ..sample_record()
            },
        ]);

        store.delete_one("ICES-2024-001").unwrap();
        assert!(store.get_by_id("ICES-2024-001").is_none());
        assert_eq!(store.list().len(), 1);

        store.delete_all().unwrap();
        assert!(store.list().is_empty());
    }
}
