//! In-memory registry of discovered peripherals.

use crate::domain::models::DeviceRecord;

/// Insertion-ordered, deduplicated set of discovered devices.
///
/// Mutation happens only on the discovery controller's thread of control;
/// other components read through cloned snapshots.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    records: Vec<DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record unless one with the same id is already present.
    /// Returns true if the record was added.
    pub fn add(&mut self, record: DeviceRecord) -> bool {
        if self.contains(&record.id) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&DeviceRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Snapshot of the current records in insertion order.
    pub fn all(&self) -> Vec<DeviceRecord> {
        self.records.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
