//! Path codec - maps a credential key to a relative path and back
//!
//! A key `(server_url, username)` becomes the buffer `prefix NUL username`,
//! where `prefix` is `server_url` with the username suffix stripped. The
//! buffer is base64url encoded (padded) and cut into directory names no
//! longer than the configured limit, then terminated by `data.gpg`:
//!
//! ```text
//! cHJvdG9ubWFpbC9icmlk...SHhw/bndMRHRDREdZSWFxOFkyUWZpTWVRPT0=/data.gpg
//! ```
//!
//! Keys whose username is not a suffix of the server URL cannot use that
//! compact form without corrupting the URL on decode. They are stored whole
//! (`server_url NUL username`) under a leading `@raw` directory. `@` is not
//! part of the base64url alphabet, so the two layouts never collide.

use base64::{engine::general_purpose, Engine as _};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the leaf file holding one encrypted entry
pub const DATA_FILE: &str = "data.gpg";

/// Leading segment of keys stored in the verbatim layout
pub const RAW_MARKER: &str = "@raw";

/// Default directory name limit: encrypted ext4 allows 143 bytes, stay below
/// 128 and keep room for suffixes added by the encryption backend.
pub const DEFAULT_MAX_SEGMENT_LEN: usize = 120;

const DELIMITER: u8 = 0;

/// Path codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("incorrect path encoding: no data.gpg in {0}")]
    MalformedPath(String),

    #[error("incorrect path encoding: {0}")]
    Encoding(String),

    #[error("incorrect path encoding: no delimiter")]
    Delimiter,

    #[error("invalid credential key: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Username stripped from the end of the server URL
    Compact,
    /// Server URL kept whole, under the `@raw` marker
    Verbatim,
}

/// Encodes credential keys into length-bounded relative paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathCodec {
    max_segment_len: usize,
}

impl Default for PathCodec {
    fn default() -> Self {
        Self {
            max_segment_len: DEFAULT_MAX_SEGMENT_LEN,
        }
    }
}

impl PathCodec {
    pub fn new(max_segment_len: usize) -> Self {
        Self { max_segment_len }
    }

    /// Encode a key into a relative path ending in `data.gpg`
    pub fn encode(&self, server_url: &str, username: &str) -> Result<PathBuf, CodecError> {
        if self.max_segment_len == 0 {
            return Err(CodecError::InvalidKey(
                "segment length limit must be positive".to_string(),
            ));
        }
        if username.as_bytes().contains(&DELIMITER) {
            return Err(CodecError::InvalidKey("username contains a NUL byte".to_string()));
        }
        if server_url.as_bytes().contains(&DELIMITER) {
            return Err(CodecError::InvalidKey("server URL contains a NUL byte".to_string()));
        }

        let (layout, head) = match server_url.strip_suffix(username) {
            Some(prefix) => (Layout::Compact, prefix),
            None => (Layout::Verbatim, server_url),
        };

        let mut buffer = Vec::with_capacity(head.len() + 1 + username.len());
        buffer.extend_from_slice(head.as_bytes());
        buffer.push(DELIMITER);
        buffer.extend_from_slice(username.as_bytes());

        let encoded = general_purpose::URL_SAFE.encode(&buffer);

        let mut path = PathBuf::new();
        if layout == Layout::Verbatim {
            path.push(RAW_MARKER);
        }

        // base64 output is ASCII, so splitting on byte offsets is safe
        let mut rest = encoded.as_str();
        while !rest.is_empty() {
            let (segment, tail) = rest.split_at(rest.len().min(self.max_segment_len));
            path.push(segment);
            rest = tail;
        }

        path.push(DATA_FILE);
        Ok(path)
    }

    /// Decode a path produced by [`PathCodec::encode`] back into
    /// `(server_url, username)`
    pub fn decode(&self, path: &Path) -> Result<(String, String), CodecError> {
        let malformed = || CodecError::MalformedPath(path.display().to_string());

        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(name) => {
                    let name = name.to_str().ok_or_else(|| {
                        CodecError::Encoding(format!("non UTF-8 segment in {}", path.display()))
                    })?;
                    segments.push(name);
                }
                Component::CurDir => {}
                _ => return Err(malformed()),
            }
        }

        let (last, dirs) = segments.split_last().ok_or_else(malformed)?;
        if segments.len() < 2 || *last != DATA_FILE {
            return Err(malformed());
        }

        let (layout, payload) = match dirs.split_first() {
            Some((&RAW_MARKER, payload)) => (Layout::Verbatim, payload),
            _ => (Layout::Compact, dirs),
        };
        if payload.is_empty() {
            return Err(malformed());
        }

        let decoded = general_purpose::URL_SAFE
            .decode(payload.concat())
            .map_err(|e| CodecError::Encoding(e.to_string()))?;

        let mut parts = decoded.split(|b| *b == DELIMITER);
        let (Some(head), Some(username), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(CodecError::Delimiter);
        };

        let head = utf8(head)?;
        let username = utf8(username)?;

        let server_url = match layout {
            Layout::Compact => format!("{}{}", head, username),
            Layout::Verbatim => head,
        };

        Ok((server_url, username))
    }
}

fn utf8(bytes: &[u8]) -> Result<String, CodecError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::Encoding(e.to_string()))
}

/// Encode with the default segment limit
pub fn encode_path(server_url: &str, username: &str) -> Result<PathBuf, CodecError> {
    PathCodec::default().encode(server_url, username)
}

/// Decode with the default codec
pub fn decode_path(path: &Path) -> Result<(String, String), CodecError> {
    PathCodec::default().decode(path)
}
