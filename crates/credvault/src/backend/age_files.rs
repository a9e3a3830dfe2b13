//! age backend - one age-encrypted file per entry
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/keys/identity.key     X25519 identity (0600)
//! <root>/entries/<path>        encrypted entries (0600)
//! ```

use age::secrecy::ExposeSecret;
use std::fs::{self, File, Permissions};
use std::io::{Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{ensure_relative, prune_empty_dirs, walk_files, BackendError, EncryptionBackend};

/// Encrypted entry files protected by a local age identity
pub struct AgeBackend {
    /// Root directory of the store
    root: PathBuf,
    /// Directory holding the encrypted entry tree
    entries_dir: PathBuf,
    /// Directory for identity keys
    keys_dir: PathBuf,
    /// Path to the identity key file
    identity_path: PathBuf,
}

impl AgeBackend {
    pub fn new(root: &Path) -> Self {
        let entries_dir = root.join("entries");
        let keys_dir = root.join("keys");
        let identity_path = keys_dir.join("identity.key");

        Self {
            root: root.to_path_buf(),
            entries_dir,
            keys_dir,
            identity_path,
        }
    }

    /// Create the directories and generate an identity; returns the public key.
    /// Running it again keeps the existing identity.
    pub fn init(&self) -> Result<String, BackendError> {
        fs::create_dir_all(&self.entries_dir)?;
        fs::create_dir_all(&self.keys_dir)?;

        fs::set_permissions(&self.root, Permissions::from_mode(0o700))?;
        fs::set_permissions(&self.entries_dir, Permissions::from_mode(0o700))?;
        fs::set_permissions(&self.keys_dir, Permissions::from_mode(0o700))?;

        if self.identity_path.exists() {
            return self.public_key();
        }

        let identity = age::x25519::Identity::generate();
        let identity_str = identity.to_string();

        let mut file = File::create(&self.identity_path)?;
        file.write_all(identity_str.expose_secret().as_bytes())?;
        fs::set_permissions(&self.identity_path, Permissions::from_mode(0o600))?;

        debug!("Generated identity at {}", self.identity_path.display());
        Ok(identity.to_public().to_string())
    }

    pub fn is_initialized(&self) -> bool {
        self.identity_path.exists()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public key (recipient) of the identity
    pub fn public_key(&self) -> Result<String, BackendError> {
        Ok(self.load_identity()?.to_public().to_string())
    }

    fn load_identity(&self) -> Result<age::x25519::Identity, BackendError> {
        if !self.is_initialized() {
            return Err(BackendError::NotInitialized);
        }

        let content = fs::read_to_string(&self.identity_path)?;
        content
            .trim()
            .parse::<age::x25519::Identity>()
            .map_err(|e| BackendError::Decryption(format!("Failed to parse identity: {}", e)))
    }

    fn entry_path(&self, path: &Path) -> Result<PathBuf, BackendError> {
        ensure_relative(path)?;
        Ok(self.entries_dir.join(path))
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, BackendError> {
        let recipient = self.load_identity()?.to_public();

        let encryptor = age::Encryptor::with_recipients(vec![Box::new(recipient)])
            .ok_or_else(|| BackendError::Encryption("no recipients".to_string()))?;

        let mut encrypted = vec![];
        let mut writer = encryptor
            .wrap_output(&mut encrypted)
            .map_err(|e| BackendError::Encryption(e.to_string()))?;

        writer
            .write_all(plaintext)
            .map_err(|e| BackendError::Encryption(e.to_string()))?;

        writer
            .finish()
            .map_err(|e| BackendError::Encryption(e.to_string()))?;

        Ok(encrypted)
    }

    fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>, BackendError> {
        let identity = self.load_identity()?;

        let decryptor = match age::Decryptor::new(encrypted)
            .map_err(|e| BackendError::Decryption(e.to_string()))?
        {
            age::Decryptor::Recipients(d) => d,
            _ => {
                return Err(BackendError::Decryption(
                    "Unexpected passphrase encryption".to_string(),
                ))
            }
        };

        let mut decrypted = vec![];
        let mut reader = decryptor
            .decrypt(std::iter::once(&identity as &dyn age::Identity))
            .map_err(|e| BackendError::Decryption(e.to_string()))?;

        reader
            .read_to_end(&mut decrypted)
            .map_err(|e| BackendError::Decryption(e.to_string()))?;

        Ok(decrypted)
    }
}

impl EncryptionBackend for AgeBackend {
    fn write(&self, path: &Path, plaintext: &str) -> Result<(), BackendError> {
        let entry_path = self.entry_path(path)?;
        let encrypted = self.encrypt(plaintext.as_bytes())?;

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&entry_path)?;
        file.write_all(&encrypted)?;
        fs::set_permissions(&entry_path, Permissions::from_mode(0o600))?;

        debug!("Wrote entry {}", path.display());
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<String, BackendError> {
        let entry_path = self.entry_path(path)?;
        if !self.is_initialized() {
            return Err(BackendError::NotInitialized);
        }
        if !entry_path.is_file() {
            return Err(BackendError::NotFound(path.to_path_buf()));
        }

        let encrypted = fs::read(&entry_path)?;
        let decrypted = self.decrypt(&encrypted)?;

        String::from_utf8(decrypted)
            .map_err(|_| BackendError::Decryption("Entry is not valid UTF-8".to_string()))
    }

    fn remove(&self, path: &Path) -> Result<(), BackendError> {
        let entry_path = self.entry_path(path)?;
        if !entry_path.is_file() {
            return Ok(());
        }

        fs::remove_file(&entry_path)?;
        prune_empty_dirs(entry_path.parent(), &self.entries_dir)?;

        debug!("Removed entry {}", path.display());
        Ok(())
    }

    fn enumerate(&self) -> Result<Vec<PathBuf>, BackendError> {
        walk_files(&self.entries_dir)
    }
}
