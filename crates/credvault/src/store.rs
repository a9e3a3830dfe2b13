//! Entry store - credential operations over encoded paths
//!
//! Every operation encodes or decodes a key with the [`PathCodec`] and then
//! talks to the backend. There is no cache; the backend is the only state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::backend::{BackendError, EncryptionBackend};
use crate::codec::{CodecError, PathCodec};

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A stored path that could not be decoded
#[derive(Debug, Clone)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub error: CodecError,
}

/// Result of [`EntryStore::list`]
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// server URL -> username
    pub entries: HashMap<String, String>,
    /// Paths that did not decode, in enumeration order
    pub skipped: Vec<SkippedEntry>,
}

/// Credential store on top of an encryption backend
pub struct EntryStore<B> {
    backend: B,
    codec: PathCodec,
}

impl<B: EncryptionBackend> EntryStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_codec(backend, PathCodec::default())
    }

    pub fn with_codec(backend: B, codec: PathCodec) -> Self {
        Self { backend, codec }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Store a credential, replacing the previous one for this server URL
    pub fn add(&self, server_url: &str, username: &str, secret: &str) -> Result<()> {
        let path = self.codec.encode(server_url, username)?;
        self.backend.write(&path, secret)?;

        // A server URL holds one credential; drop entries for other usernames
        // only once the new one is stored
        for (existing, _) in self.resolve(server_url)? {
            if existing != path {
                debug!("Replacing {} for {}", existing.display(), server_url);
                self.backend.remove(&existing)?;
            }
        }

        Ok(())
    }

    /// Read the entry at a path obtained from the backend.
    /// Returns empty strings when nothing is stored there.
    pub fn get_by_path(&self, path: &Path) -> Result<(String, String)> {
        let (_, username) = self.codec.decode(path)?;

        match self.backend.read(path) {
            Ok(secret) => Ok((username, secret)),
            Err(BackendError::NotFound(_)) => Ok((String::new(), String::new())),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up the credential for a server URL.
    /// Returns empty strings when none is stored.
    pub fn get(&self, server_url: &str) -> Result<(String, String)> {
        match self.resolve(server_url)?.pop() {
            Some((path, _)) => self.get_by_path(&path),
            None => Ok((String::new(), String::new())),
        }
    }

    /// All stored credentials as server URL -> username.
    /// Undecodable paths are skipped and reported in [`Listing::skipped`].
    pub fn list(&self) -> Result<Listing> {
        let mut listing = Listing::default();

        for path in self.backend.enumerate()? {
            match self.codec.decode(&path) {
                Ok((server_url, username)) => {
                    listing.entries.insert(server_url, username);
                }
                Err(error) => {
                    warn!("Skipping {}: {}", path.display(), error);
                    listing.skipped.push(SkippedEntry { path, error });
                }
            }
        }

        Ok(listing)
    }

    /// Remove the credential for a server URL. Nothing stored is not an error.
    pub fn delete(&self, server_url: &str) -> Result<()> {
        for (path, _) in self.resolve(server_url)? {
            self.backend.remove(&path)?;
        }
        Ok(())
    }

    /// Remove the entry for an exact key. Nothing stored is not an error.
    pub fn delete_entry(&self, server_url: &str, username: &str) -> Result<()> {
        let path = self.codec.encode(server_url, username)?;
        self.backend.remove(&path)?;
        Ok(())
    }

    /// Stored paths decoding to `server_url`, in enumeration order
    fn resolve(&self, server_url: &str) -> Result<Vec<(PathBuf, String)>> {
        let mut found = vec![];
        for path in self.backend.enumerate()? {
            match self.codec.decode(&path) {
                Ok((url, username)) if url == server_url => found.push((path, username)),
                Ok(_) => {}
                Err(e) => debug!("Ignoring {}: {}", path.display(), e),
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AgeBackend, MemoryBackend};
    use crate::codec::encode_path;
    use tempfile::TempDir;

    const FIRST: &str = "https://foobar.docker.io:2376/v1";
    const SECOND: &str = "https://foobar.docker.io:9999/v2";
    const SECRET: &str = "isthebestmeshuggahalbum";

    fn memory_store() -> EntryStore<MemoryBackend> {
        EntryStore::new(MemoryBackend::new())
    }

    fn exercise_lifecycle<B: EncryptionBackend>(store: &EntryStore<B>) {
        store.add(FIRST, "nothing", SECRET).unwrap();
        store.add(SECOND, "nothing", SECRET).unwrap();

        let listing = store.list().unwrap();
        assert!(listing.skipped.is_empty());
        assert_eq!(listing.entries.len(), 2);

        for (server, username) in &listing.entries {
            assert!(server == FIRST || server == SECOND, "invalid url: {}", server);
            assert_eq!(username, "nothing");

            let (u, s) = store.get(server).unwrap();
            assert_eq!(u, "nothing");
            assert_eq!(s, SECRET);

            store.delete(server).unwrap();

            let (u, s) = store.get(server).unwrap();
            assert_eq!(u, "");
            assert_eq!(s, "");
        }

        assert!(store.list().unwrap().entries.is_empty());
    }

    #[test]
    fn test_lifecycle_in_memory() {
        exercise_lifecycle(&memory_store());
    }

    #[test]
    fn test_lifecycle_with_age() {
        let temp = TempDir::new().unwrap();
        let backend = AgeBackend::new(temp.path());
        backend.init().unwrap();

        exercise_lifecycle(&EntryStore::new(backend));
    }

    #[test]
    fn test_add_overwrites() {
        let store = memory_store();
        store.add("https://h/v1/bob", "bob", "old").unwrap();
        store.add("https://h/v1/bob", "bob", "new").unwrap();

        assert_eq!(store.backend().len(), 1);
        assert_eq!(
            store.get("https://h/v1/bob").unwrap(),
            ("bob".to_string(), "new".to_string())
        );
    }

    #[test]
    fn test_add_replaces_other_username() {
        let store = memory_store();
        store.add("https://registry.io", "alice", "a").unwrap();
        store.add("https://registry.io", "bob", "b").unwrap();

        assert_eq!(store.backend().len(), 1);
        assert_eq!(
            store.get("https://registry.io").unwrap(),
            ("bob".to_string(), "b".to_string())
        );
    }

    /// Accepts reads and removes but refuses every write
    struct ReadOnlyBackend(MemoryBackend);

    impl EncryptionBackend for ReadOnlyBackend {
        fn write(&self, _path: &Path, _plaintext: &str) -> std::result::Result<(), BackendError> {
            Err(BackendError::Encryption("gpg agent unavailable".to_string()))
        }

        fn read(&self, path: &Path) -> std::result::Result<String, BackendError> {
            self.0.read(path)
        }

        fn remove(&self, path: &Path) -> std::result::Result<(), BackendError> {
            self.0.remove(path)
        }

        fn enumerate(&self) -> std::result::Result<Vec<PathBuf>, BackendError> {
            self.0.enumerate()
        }
    }

    #[test]
    fn test_failed_add_keeps_previous_credential() {
        let memory = MemoryBackend::new();
        EntryStore::new(&memory)
            .add("https://registry.io", "alice", "a")
            .unwrap();

        let store = EntryStore::new(ReadOnlyBackend(memory));
        assert!(matches!(
            store.add("https://registry.io", "bob", "b"),
            Err(StoreError::Backend(BackendError::Encryption(_)))
        ));

        assert_eq!(
            store.get("https://registry.io").unwrap(),
            ("alice".to_string(), "a".to_string())
        );
        assert_eq!(store.list().unwrap().entries.len(), 1);
    }

    #[test]
    fn test_get_by_path() {
        let store = memory_store();
        store.add("https://h/v1/bob", "bob", "pw").unwrap();

        let path = encode_path("https://h/v1/bob", "bob").unwrap();
        assert_eq!(
            store.get_by_path(&path).unwrap(),
            ("bob".to_string(), "pw".to_string())
        );

        let missing = encode_path("https://h/v1/eve", "eve").unwrap();
        assert_eq!(
            store.get_by_path(&missing).unwrap(),
            (String::new(), String::new())
        );

        assert!(matches!(
            store.get_by_path(Path::new("junk/file")),
            Err(StoreError::Codec(CodecError::MalformedPath(_)))
        ));
    }

    #[test]
    fn test_get_unknown_is_empty() {
        let store = memory_store();
        assert_eq!(
            store.get("https://nowhere").unwrap(),
            (String::new(), String::new())
        );
    }

    #[test]
    fn test_list_skips_bad_entries() {
        let store = memory_store();
        store.add("https://h/v1/bob", "bob", "pw").unwrap();
        store
            .backend()
            .write(Path::new("not*base64/data.gpg"), "x")
            .unwrap();
        store.backend().write(Path::new("stray.txt"), "x").unwrap();

        let listing = store.list().unwrap();
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries["https://h/v1/bob"], "bob");
        assert_eq!(listing.skipped.len(), 2);
        assert!(listing
            .skipped
            .iter()
            .any(|s| matches!(s.error, CodecError::Encoding(_))));
        assert!(listing
            .skipped
            .iter()
            .any(|s| matches!(s.error, CodecError::MalformedPath(_))));
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let store = memory_store();
        store.delete("https://never.written").unwrap();
        store.delete_entry("https://never.written/me", "me").unwrap();
    }

    #[test]
    fn test_delete_entry() {
        let store = memory_store();
        store.add("https://h/v1/bob", "bob", "pw").unwrap();
        store.delete_entry("https://h/v1/bob", "bob").unwrap();
        assert!(store.backend().is_empty());
    }

    #[test]
    fn test_invalid_key_surfaces() {
        let store = memory_store();
        assert!(matches!(
            store.add("https://h", "a\0b", "pw"),
            Err(StoreError::Codec(CodecError::InvalidKey(_)))
        ));
        assert!(store.backend().is_empty());
    }

    #[test]
    fn test_narrow_segments() {
        let store = EntryStore::with_codec(MemoryBackend::new(), PathCodec::new(16));
        let server_url = format!("https://{}/v1/user", "long".repeat(40));
        store.add(&server_url, "user", "pw").unwrap();

        let paths = store.backend().enumerate().unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].iter().all(|segment| segment.len() <= 16));

        assert_eq!(
            store.get(&server_url).unwrap(),
            ("user".to_string(), "pw".to_string())
        );
    }
}
