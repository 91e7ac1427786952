//! Durable Entitlement Storage
//!
//! The entitlement record is a single JSON document. Storage only moves
//! text; validation happens in [`crate::entitlement`].

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{ClientError, Result};

/// Where the cached entitlement record is kept
pub trait EntitlementStorage: Send + Sync {
    /// Raw record, `None` if nothing was ever saved
    fn load(&self) -> Result<Option<String>>;

    /// Replace the record. Must be durable when this returns.
    fn save(&self, record: &str) -> Result<()>;
}

/// Record kept in a file on disk
#[derive(Clone, Debug)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EntitlementStorage for FileStorage {
    fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, record: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write beside the target, flush, then swap in
        let staging = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&staging)?;
            file.write_all(record.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

/// Record kept in memory. Clones share the same slot, so a second client
/// built from a clone sees what the first one saved.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded with a raw record
    pub fn with_record(record: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(record.into()))),
        }
    }
}

impl EntitlementStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| ClientError::Storage("memory slot poisoned".into()))?;
        Ok(slot.clone())
    }

    fn save(&self, record: &str) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| ClientError::Storage("memory slot poisoned".into()))?;
        *slot = Some(record.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested").join("entitlement.json"));

        assert!(storage.load().unwrap().is_none());
        storage.save("{\"a\":1}").unwrap();
        storage.save("{\"a\":2}").unwrap();
        assert_eq!(storage.load().unwrap().as_deref(), Some("{\"a\":2}"));
        assert!(!storage.path().with_extension("tmp").exists());
    }

    #[test]
    fn test_memory_storage_shared_between_clones() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        storage.save("record").unwrap();
        assert_eq!(other.load().unwrap().as_deref(), Some("record"));
    }
}
