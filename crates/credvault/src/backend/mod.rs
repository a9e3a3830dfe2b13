//! Encryption backends
//!
//! A backend encrypts, stores, enumerates and removes blobs at relative
//! paths. The entry store never touches the disk directly.

pub mod age_files;
pub mod memory;
pub mod pass;

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use credvault_core::{BackendKind, Config, Paths};

pub use self::age_files::AgeBackend;
pub use self::memory::MemoryBackend;
pub use self::pass::PassBackend;

/// Backend errors
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Entry not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Store not initialized - run 'docker-credential-credvault init' first")]
    NotInitialized,

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Invalid entry path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("{program} failed: {message}")]
    Command { program: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Capability that persists encrypted entries at relative paths
pub trait EncryptionBackend {
    /// Encrypt and store `plaintext`, replacing any previous content
    fn write(&self, path: &Path, plaintext: &str) -> Result<(), BackendError>;

    /// Decrypt the entry at `path`; [`BackendError::NotFound`] if absent
    fn read(&self, path: &Path) -> Result<String, BackendError>;

    /// Remove the entry at `path`. Removing an absent entry succeeds.
    fn remove(&self, path: &Path) -> Result<(), BackendError>;

    /// Every stored path, relative to the backend root, in no particular order
    fn enumerate(&self) -> Result<Vec<PathBuf>, BackendError>;
}

impl<B: EncryptionBackend + ?Sized> EncryptionBackend for Box<B> {
    fn write(&self, path: &Path, plaintext: &str) -> Result<(), BackendError> {
        (**self).write(path, plaintext)
    }

    fn read(&self, path: &Path) -> Result<String, BackendError> {
        (**self).read(path)
    }

    fn remove(&self, path: &Path) -> Result<(), BackendError> {
        (**self).remove(path)
    }

    fn enumerate(&self) -> Result<Vec<PathBuf>, BackendError> {
        (**self).enumerate()
    }
}

impl<B: EncryptionBackend + ?Sized> EncryptionBackend for &B {
    fn write(&self, path: &Path, plaintext: &str) -> Result<(), BackendError> {
        (**self).write(path, plaintext)
    }

    fn read(&self, path: &Path) -> Result<String, BackendError> {
        (**self).read(path)
    }

    fn remove(&self, path: &Path) -> Result<(), BackendError> {
        (**self).remove(path)
    }

    fn enumerate(&self) -> Result<Vec<PathBuf>, BackendError> {
        (**self).enumerate()
    }
}

/// Build the backend selected in the configuration
pub fn from_config(config: &Config, paths: &Paths) -> Box<dyn EncryptionBackend> {
    match config.backend {
        BackendKind::Age => Box::new(AgeBackend::new(&config.store_dir(paths))),
        BackendKind::Pass => Box::new(PassBackend::new(
            &paths.password_store(),
            &config.pass_prefix,
        )),
    }
}

/// Entry paths must stay below the backend root
pub(crate) fn ensure_relative(path: &Path) -> Result<(), BackendError> {
    let mut has_name = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => has_name = true,
            Component::CurDir => {}
            _ => return Err(BackendError::InvalidPath(path.to_path_buf())),
        }
    }

    if has_name {
        Ok(())
    } else {
        Err(BackendError::InvalidPath(path.to_path_buf()))
    }
}

/// Walk `dir` and collect the relative paths of all files below it
pub(crate) fn walk_files(dir: &Path) -> Result<Vec<PathBuf>, BackendError> {
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut files = vec![];
    for entry in walkdir::WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| BackendError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(dir) {
            files.push(relative.to_path_buf());
        }
    }

    Ok(files)
}

/// Remove empty directories from `start` upwards, stopping at `root`
pub(crate) fn prune_empty_dirs(start: Option<&Path>, root: &Path) -> Result<(), BackendError> {
    let mut parent = start;
    while let Some(dir) = parent {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        if dir.read_dir()?.next().is_none() {
            std::fs::remove_dir(dir)?;
            parent = dir.parent();
        } else {
            break;
        }
    }
    Ok(())
}
