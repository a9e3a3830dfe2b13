//! credvault - encrypted credential store for container tooling
//!
//! Each credential is one encrypted file. Its location encodes the
//! credential key (server URL + username) so the store needs no index:
//! listing the tree and decoding the paths recovers every key.
//!
//! The encryption itself is delegated to a backend: age files managed by
//! credvault, or the `pass` password manager.

pub mod backend;
pub mod codec;
pub mod protocol;
pub mod store;

pub use backend::{AgeBackend, BackendError, EncryptionBackend, MemoryBackend, PassBackend};
pub use codec::{decode_path, encode_path, CodecError, PathCodec};
pub use protocol::{Action, Credential, ProtocolError};
pub use store::{EntryStore, Listing, StoreError};
