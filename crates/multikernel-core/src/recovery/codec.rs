//! Byte codecs for persisted recovery points.
//!
//! State bytes are stored as standard base64 inside the point's JSON
//! document, optionally run-length compressed first. The run-length code:
//! a run of the same byte repeated `n` times (`2 <= n <= 255`) becomes the
//! three bytes `0x00, n, byte`; other literal bytes are copied verbatim.
//! A literal `0x00` is escaped as the triple `0x00, 1, 0x00` so every
//! `0x00` in the encoded stream introduces a triple.

use crate::error::{KernelError, Result};

const RLE_MARKER: u8 = 0x00;
const MAX_RUN: usize = 255;

/// Run-length encode `data`.
#[must_use]
pub fn rle_encode(data: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        let mut run = 1;
        while i + run < data.len() && data[i + run] == byte && run < MAX_RUN {
            run += 1;
        }
        if byte == RLE_MARKER || run >= 2 {
            encoded.push(RLE_MARKER);
            encoded.push(run as u8);
            encoded.push(byte);
        } else {
            encoded.push(byte);
        }
        i += run;
    }
    encoded
}

/// Decode a run-length stream produced by [`rle_encode`].
///
/// # Errors
///
/// Returns [`KernelError::CorruptRunLength`] for a truncated triple or a
/// zero run count.
pub fn rle_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoded = Vec::with_capacity(data.len() * 2);
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        if byte == RLE_MARKER {
            if i + 2 >= data.len() {
                return Err(KernelError::CorruptRunLength { offset: i });
            }
            let count = data[i + 1];
            if count == 0 {
                return Err(KernelError::CorruptRunLength { offset: i });
            }
            let value = data[i + 2];
            decoded.extend(std::iter::repeat(value).take(count as usize));
            i += 3;
        } else {
            decoded.push(byte);
            i += 1;
        }
    }
    Ok(decoded)
}

/// Encode and return the result only when it is strictly smaller than the
/// input; compression is never applied when it would grow the payload.
#[must_use]
pub fn compress_if_smaller(data: &[u8]) -> Option<Vec<u8>> {
    let encoded = rle_encode(data);
    if encoded.len() < data.len() {
        Some(encoded)
    } else {
        None
    }
}

/// Serde adapter storing a byte vector as standard base64 with `=` padding.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize bytes as a base64 string.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    /// Deserialize bytes from a base64 string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
