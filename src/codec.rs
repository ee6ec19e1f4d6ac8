//! Versioned Binary Encoding for Persisted Embeddings
//!
//! Embeddings are stored in the durable entry store as opaque BLOBs. The
//! layout is an explicit, versioned fixed-width encoding so persisted bytes
//! stay portable across implementations and can be audited with a hex dump:
//!
//! ```text
//! +---------+---------+------------------+----------------------+
//! | magic   | version | dimension (u32)  | dimension x f32      |
//! | 4 bytes | 1 byte  | little-endian    | little-endian        |
//! +---------+---------+------------------+----------------------+
//! ```
//!
//! The store never interprets these bytes; encoding and decoding happen at
//! the cache boundary.

use crate::error::{MnemoError, Result};

/// Magic bytes identifying a mnemo embedding blob
pub const MAGIC: &[u8; 4] = b"MNEM";

/// Current embedding encoding version
pub const VERSION: u8 = 1;

/// Fixed header size: magic + version + dimension
const HEADER_LEN: usize = 4 + 1 + 4;

/// Encode an embedding into the versioned binary layout.
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + embedding.len() * 4);
    bytes.extend_from_slice(MAGIC);
    bytes.push(VERSION);
    bytes.extend_from_slice(&(embedding.len() as u32).to_le_bytes());
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode an embedding blob produced by [`encode_embedding`].
///
/// Returns [`MnemoError::Corruption`] when the magic, version, or length
/// do not line up with the declared dimension.
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() < HEADER_LEN {
        return Err(MnemoError::Corruption(format!(
            "embedding blob too short: {} bytes",
            bytes.len()
        )));
    }

    if &bytes[0..4] != MAGIC {
        return Err(MnemoError::Corruption(
            "embedding blob has invalid magic".into(),
        ));
    }

    let version = bytes[4];
    if version != VERSION {
        return Err(MnemoError::Corruption(format!(
            "unsupported embedding encoding version: {version}"
        )));
    }

    let dimension = u32::from_le_bytes(
        bytes[5..9]
            .try_into()
            .map_err(|_| MnemoError::Corruption("invalid dimension bytes".into()))?,
    ) as usize;

    let expected_len = HEADER_LEN + dimension * 4;
    if bytes.len() != expected_len {
        return Err(MnemoError::Corruption(format!(
            "embedding blob length {} does not match declared dimension {dimension}",
            bytes.len()
        )));
    }

    let mut embedding = Vec::with_capacity(dimension);
    for chunk in bytes[HEADER_LEN..].chunks_exact(4) {
        let value = f32::from_le_bytes(
            chunk
                .try_into()
                .map_err(|_| MnemoError::Corruption("invalid float bytes".into()))?,
        );
        embedding.push(value);
    }

    Ok(embedding)
}
