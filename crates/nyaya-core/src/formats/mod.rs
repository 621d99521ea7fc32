//! # Formats Module
//!
//! Serialization formats for statute graph snapshots.
//!
//! This module contains:
//! - JSON snapshot documents (`serde_json`), the interchange format
//! - Binary persistence format (postcard + header), the fast-load format
//!
//! Note: File I/O operations remain in the app layer (apps/nyaya).
//! This module only handles format conversion (pure transformations).

mod json;
mod persistence;

pub use json::*;
pub use persistence::*;

use crate::error::FormatError;
use crate::snapshot::SerializableSnapshot;

/// Decode either format, sniffing the binary magic header.
pub fn decode_any(bytes: &[u8]) -> Result<SerializableSnapshot, FormatError> {
    if is_binary_snapshot(bytes) {
        decode_snapshot(bytes)
    } else {
        snapshot_from_json_slice(bytes)
    }
}
