// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON file-based storage

use super::SwUpdateStore;
use crate::sw_update::SwUpdateRecord;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SW_UPDATES: &str = "sw-updates";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not found: {kind}/{id}")]
    NotFound { kind: String, id: String },
}

/// One pretty-printed JSON file per record, grouped by kind
#[derive(Debug, Clone)]
pub struct JsonStore {
    base_path: PathBuf,
}

impl JsonStore {
    /// Open a store at the given path
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn save<T: Serialize>(&self, kind: &str, id: &str, data: &T) -> Result<(), StorageError> {
        let dir = self.base_path.join(kind);
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(data)?;
        // Replace atomically
        let tmp = dir.join(format!(".{}.json.tmp", id));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.path_for(kind, id))?;
        Ok(())
    }

    pub fn load<T: DeserializeOwned>(&self, kind: &str, id: &str) -> Result<T, StorageError> {
        let path = self.path_for(kind, id);
        if !path.exists() {
            return Err(StorageError::NotFound {
                kind: kind.to_string(),
                id: id.to_string(),
            });
        }
        let json = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn delete(&self, kind: &str, id: &str) -> Result<(), StorageError> {
        let path = self.path_for(kind, id);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// All ids of a kind, sorted
    pub fn list(&self, kind: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.base_path.join(kind);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    ids.push(stem.to_string_lossy().to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn exists(&self, kind: &str, id: &str) -> bool {
        self.path_for(kind, id).exists()
    }

    fn path_for(&self, kind: &str, id: &str) -> PathBuf {
        self.base_path.join(kind).join(format!("{}.json", id))
    }
}

impl SwUpdateStore for JsonStore {
    fn save(&mut self, record: &SwUpdateRecord) -> Result<(), StorageError> {
        JsonStore::save(self, SW_UPDATES, &record.uuid, record)
    }

    fn delete(&mut self, uuid: &str) -> Result<(), StorageError> {
        JsonStore::delete(self, SW_UPDATES, uuid)
    }

    fn load_all(&self) -> Result<Vec<SwUpdateRecord>, StorageError> {
        let mut records = Vec::new();
        for id in self.list(SW_UPDATES)? {
            records.push(self.load(SW_UPDATES, &id)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
#[path = "json_tests.rs"]
mod tests;
