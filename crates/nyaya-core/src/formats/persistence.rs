//! Binary snapshot persistence.
//!
//! Layout: 5-byte magic `NYAYA`, one format-version byte, then the
//! postcard-encoded `SerializableSnapshot`.

use crate::error::FormatError;
use crate::snapshot::SerializableSnapshot;

/// Magic header identifying a binary snapshot.
pub const MAGIC: &[u8; 5] = b"NYAYA";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = MAGIC.len() + 1;

/// Whether `bytes` start with the binary snapshot header.
#[must_use]
pub fn is_binary_snapshot(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

/// Encode a snapshot with header.
pub fn encode_snapshot(snapshot: &SerializableSnapshot) -> Result<Vec<u8>, FormatError> {
    let body = postcard::to_stdvec(snapshot)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(MAGIC);
    bytes.push(FORMAT_VERSION);
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Decode a snapshot, checking header and version.
pub fn decode_snapshot(bytes: &[u8]) -> Result<SerializableSnapshot, FormatError> {
    if !is_binary_snapshot(bytes) {
        return Err(FormatError::BadMagic);
    }
    let version = bytes.get(MAGIC.len()).copied().ok_or(FormatError::BadMagic)?;
    if version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }
    let body = bytes.get(HEADER_LEN..).unwrap_or_default();
    Ok(postcard::from_bytes(body)?)
}

// =============================================================================
// TESTS
// =============================================================================
