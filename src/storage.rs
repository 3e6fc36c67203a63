// Key-value persistence for state that must survive a reload
//
// Only the store's current-listing slice goes through here; the per-type
// sequences and cursors are session scoped.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::listing::Listing;

pub trait KeyValueStorage: Send + Sync + 'static {
    fn get(&self, name: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, name: &str, value: &str) -> Result<(), StorageError>;
    fn delete(&self, name: &str) -> Result<(), StorageError>;
}

/// The persisted slice of the listing store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub current_listing: Option<Listing>,
}

impl StoreSnapshot {
    pub fn load(storage: &dyn KeyValueStorage, bucket: &str) -> Result<Option<Self>, StorageError> {
        match storage.get(bucket)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn save(&self, storage: &dyn KeyValueStorage, bucket: &str) -> Result<(), StorageError> {
        storage.set(bucket, &serde_json::to_string(self)?)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, name: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(name).map(|entry| entry.value().clone()))
    }

    fn set(&self, name: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.entries.remove(name);
        Ok(())
    }
}

/// One `<name>.json` file per bucket under a root directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(format!("{}.json", name)))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, name: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.bucket_path(name)?) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, name: &str, value: &str) -> Result<(), StorageError> {
        let path = self.bucket_path(name)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.bucket_path(name)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
