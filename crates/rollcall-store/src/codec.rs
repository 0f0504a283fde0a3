//! Descriptor blob codec: little-endian f32 bytes, four per component.

use thiserror::Error;

#[derive(Error, Debug)]
#[error("descriptor blob length {0} is not a multiple of 4")]
pub struct BlobLengthError(pub usize);

/// Encode a descriptor's components as a little-endian byte blob.
pub fn encode(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a byte blob back into descriptor components.
///
/// A length not divisible by 4 means the blob was corrupted; it is
/// rejected rather than truncated.
pub fn decode(bytes: &[u8]) -> Result<Vec<f32>, BlobLengthError> {
    if bytes.len() % 4 != 0 {
        return Err(BlobLengthError(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
