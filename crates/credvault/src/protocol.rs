//! Docker credential-helper protocol
//!
//! One action per invocation. The payload arrives on stdin and the answer
//! goes to stdout:
//!
//! - `store`: `{"ServerURL", "Username", "Secret"}` in, nothing out
//! - `get`: server URL in, credential JSON out
//! - `erase`: server URL in, nothing out
//! - `list`: nothing in, `{server URL: username}` out

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use thiserror::Error;
use tracing::debug;

use crate::backend::EncryptionBackend;
use crate::store::{EntryStore, StoreError};

/// Message Docker recognises as "no credentials stored"
pub const NOT_FOUND_MESSAGE: &str = "credentials not found in native keychain";

/// Protocol errors; the display text is what the host gets to see
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("credentials not found in native keychain")]
    NotFound,

    #[error("no credentials server URL")]
    MissingServerUrl,

    #[error("no credentials username")]
    MissingUsername,

    #[error("invalid credentials payload")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A credential as exchanged with the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "ServerURL")]
    pub server_url: String,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Secret")]
    pub secret: String,
}

/// Helper actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Store,
    Get,
    Erase,
    List,
}

/// Run one action against the store
pub fn serve<B, R, W>(
    store: &EntryStore<B>,
    action: Action,
    input: R,
    output: W,
) -> Result<(), ProtocolError>
where
    B: EncryptionBackend,
    R: Read,
    W: Write,
{
    debug!("Serving {:?}", action);
    match action {
        Action::Store => store_credential(store, input),
        Action::Get => get_credential(store, input, output),
        Action::Erase => erase_credential(store, input),
        Action::List => list_credentials(store, output),
    }
}

pub fn store_credential<B: EncryptionBackend, R: Read>(
    store: &EntryStore<B>,
    input: R,
) -> Result<(), ProtocolError> {
    let credential: Credential = serde_json::from_reader(input)?;

    if credential.server_url.is_empty() {
        return Err(ProtocolError::MissingServerUrl);
    }
    if credential.username.is_empty() {
        return Err(ProtocolError::MissingUsername);
    }

    store.add(
        &credential.server_url,
        &credential.username,
        &credential.secret,
    )?;
    Ok(())
}

pub fn get_credential<B: EncryptionBackend, R: Read, W: Write>(
    store: &EntryStore<B>,
    input: R,
    mut output: W,
) -> Result<(), ProtocolError> {
    let server_url = read_server_url(input)?;

    let (username, secret) = store.get(&server_url)?;
    if username.is_empty() && secret.is_empty() {
        return Err(ProtocolError::NotFound);
    }

    let credential = Credential {
        server_url,
        username,
        secret,
    };
    serde_json::to_writer(&mut output, &credential)?;
    writeln!(output)?;
    Ok(())
}

pub fn erase_credential<B: EncryptionBackend, R: Read>(
    store: &EntryStore<B>,
    input: R,
) -> Result<(), ProtocolError> {
    let server_url = read_server_url(input)?;
    store.delete(&server_url)?;
    Ok(())
}

pub fn list_credentials<B: EncryptionBackend, W: Write>(
    store: &EntryStore<B>,
    mut output: W,
) -> Result<(), ProtocolError> {
    let listing = store.list()?;

    // Sorted for stable output
    let entries: BTreeMap<_, _> = listing.entries.into_iter().collect();
    serde_json::to_writer(&mut output, &entries)?;
    writeln!(output)?;
    Ok(())
}

fn read_server_url<R: Read>(mut input: R) -> Result<String, ProtocolError> {
    let mut buffer = String::new();
    input.read_to_string(&mut buffer)?;

    let server_url = buffer.trim();
    if server_url.is_empty() {
        return Err(ProtocolError::MissingServerUrl);
    }
    Ok(server_url.to_string())
}
