// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for sw-update objects

pub mod json;

pub use json::{JsonStore, StorageError};

use crate::sw_update::SwUpdateRecord;
use std::collections::BTreeMap;

/// Where the director keeps sw-update records between restarts
pub trait SwUpdateStore {
    fn save(&mut self, record: &SwUpdateRecord) -> Result<(), StorageError>;

    /// Removing a record that is not there is not an error
    fn delete(&mut self, uuid: &str) -> Result<(), StorageError>;

    fn load_all(&self) -> Result<Vec<SwUpdateRecord>, StorageError>;
}

/// In-memory store for tests and for running without a state directory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: BTreeMap<String, SwUpdateRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uuid: &str) -> Option<&SwUpdateRecord> {
        self.records.get(uuid)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SwUpdateStore for MemoryStore {
    fn save(&mut self, record: &SwUpdateRecord) -> Result<(), StorageError> {
        self.records.insert(record.uuid.clone(), record.clone());
        Ok(())
    }

    fn delete(&mut self, uuid: &str) -> Result<(), StorageError> {
        self.records.remove(uuid);
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<SwUpdateRecord>, StorageError> {
        Ok(self.records.values().cloned().collect())
    }
}

impl<S: SwUpdateStore + ?Sized> SwUpdateStore for Box<S> {
    fn save(&mut self, record: &SwUpdateRecord) -> Result<(), StorageError> {
        (**self).save(record)
    }

    fn delete(&mut self, uuid: &str) -> Result<(), StorageError> {
        (**self).delete(uuid)
    }

    fn load_all(&self) -> Result<Vec<SwUpdateRecord>, StorageError> {
        (**self).load_all()
    }
}
