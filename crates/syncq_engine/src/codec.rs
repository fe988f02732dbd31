//! Queue snapshot encoding.
//!
//! Layout:
//!
//! ```text
//! ┌──────────┬─────────────┬──────────────────────────────┐
//! │ "SYNQ"   │ version u16 │ CBOR array of SyncItem       │
//! │ 4 bytes  │ LE          │                              │
//! └──────────┴─────────────┴──────────────────────────────┘
//! ```

use crate::error::{SyncError, SyncResult};
use crate::item::SyncItem;

/// Magic bytes for queue snapshots.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"SYNQ";

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u16 = 1;

const HEADER_LEN: usize = 6;

/// Encodes the queue into a snapshot.
pub fn encode_snapshot(items: &[SyncItem]) -> SyncResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(HEADER_LEN + items.len() * 128);
    buf.extend_from_slice(&SNAPSHOT_MAGIC);
    buf.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());

    ciborium::into_writer(items, &mut buf)
        .map_err(|e| SyncError::codec(format!("failed to encode snapshot: {e}")))?;

    Ok(buf)
}

/// Decodes a snapshot. An empty snapshot is an empty queue.
pub fn decode_snapshot(data: &[u8]) -> SyncResult<Vec<SyncItem>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    if data.len() < HEADER_LEN || data[0..4] != SNAPSHOT_MAGIC {
        return Err(SyncError::codec("invalid snapshot magic"));
    }

    let version = u16::from_le_bytes([data[4], data[5]]);
    if version > SNAPSHOT_VERSION {
        return Err(SyncError::codec(format!(
            "unsupported snapshot version: {version}"
        )));
    }

    ciborium::from_reader(&data[HEADER_LEN..])
        .map_err(|e| SyncError::codec(format!("failed to decode snapshot: {e}")))
}
