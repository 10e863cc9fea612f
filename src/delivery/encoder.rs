//! Chunk encoder.
//!
//! A chunk on the wire is `base64(len:u16le | raw)`, wrapped at 76 columns
//! with every line (including the last) terminated by `\n`. This is the
//! MIME layout the device-side decoder expects.

use crate::error::{FotaError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{BufMut, Bytes, BytesMut};

/// Default chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: u16 = 512;

/// Size of the little-endian length prefix
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Encoded characters per output line
pub const LINE_WIDTH: usize = 76;

/// Maximum raw bytes per chunk. Bounded by the 2-byte prefix.
pub const MAX_CHUNK_SIZE: usize = u16::MAX as usize;

/// Number of raw bytes read from the source per DATA command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSize(u16);

impl ChunkSize {
    /// Validate a requested chunk size. Zero and anything the length
    /// prefix cannot represent are rejected.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(FotaError::config("chunk size must be at least 1 byte"));
        }
        if size > MAX_CHUNK_SIZE {
            return Err(FotaError::config(format!(
                "chunk size {} exceeds maximum {} (2-byte length prefix)",
                size, MAX_CHUNK_SIZE
            )));
        }
        Ok(Self(size as u16))
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self(DEFAULT_CHUNK_SIZE)
    }
}

impl std::fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encode one raw chunk into its transport-safe payload.
pub fn encode_chunk(raw: &[u8]) -> Result<Bytes> {
    let len = u16::try_from(raw.len()).map_err(|_| {
        FotaError::config(format!(
            "chunk of {} bytes does not fit the 2-byte length prefix",
            raw.len()
        ))
    })?;

    let mut framed = Vec::with_capacity(LENGTH_PREFIX_SIZE + raw.len());
    framed.extend_from_slice(&len.to_le_bytes());
    framed.extend_from_slice(raw);

    let encoded = STANDARD.encode(&framed);
    Ok(wrap_lines(encoded.as_bytes(), encoded_len(raw.len())))
}

/// Length of the payload `encode_chunk` produces for `raw_len` bytes.
pub(crate) fn encoded_len(raw_len: usize) -> usize {
    let b64 = (LENGTH_PREFIX_SIZE + raw_len).div_ceil(3) * 4;
    b64 + b64.div_ceil(LINE_WIDTH)
}

fn wrap_lines(encoded: &[u8], capacity: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(capacity);
    for line in encoded.chunks(LINE_WIDTH) {
        buf.put_slice(line);
        buf.put_u8(b'\n');
    }
    buf.freeze()
}
