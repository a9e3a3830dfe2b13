//! In-memory backend, no encryption. Used by tests and embedders.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{ensure_relative, BackendError, EncryptionBackend};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<PathBuf, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<PathBuf, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EncryptionBackend for MemoryBackend {
    fn write(&self, path: &Path, plaintext: &str) -> Result<(), BackendError> {
        ensure_relative(path)?;
        self.entries().insert(path.to_path_buf(), plaintext.to_string());
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<String, BackendError> {
        ensure_relative(path)?;
        self.entries()
            .get(path)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(path.to_path_buf()))
    }

    fn remove(&self, path: &Path) -> Result<(), BackendError> {
        ensure_relative(path)?;
        self.entries().remove(path);
        Ok(())
    }

    fn enumerate(&self) -> Result<Vec<PathBuf>, BackendError> {
        Ok(self.entries().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend() {
        let backend = MemoryBackend::new();
        let path = Path::new("a/data.gpg");

        assert!(matches!(backend.read(path), Err(BackendError::NotFound(_))));

        backend.write(path, "one").unwrap();
        backend.write(path, "two").unwrap();
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.read(path).unwrap(), "two");
        assert_eq!(backend.enumerate().unwrap(), vec![path.to_path_buf()]);

        backend.remove(path).unwrap();
        backend.remove(path).unwrap();
        assert!(backend.is_empty());
    }
}
