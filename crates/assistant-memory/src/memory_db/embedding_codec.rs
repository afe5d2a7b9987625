//! Embedding blob encoding: contiguous little-endian IEEE-754 f32, `4 * D` bytes.
//!
//! The dimension is not stored in the blob; readers get it from the
//! `embedding_meta` table or the provider configuration.
use bytes::{Buf, BufMut};

use crate::error::{MemoryError, Result};

pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        buf.put_f32_le(*value);
    }
    buf
}

pub fn decode_embedding(mut blob: &[u8], dimension: usize) -> Result<Vec<f32>> {
    if blob.len() != dimension * 4 {
        return Err(MemoryError::InvalidEmbedding {
            expected: dimension,
            actual: blob.len() / 4,
        });
    }
    let mut embedding = Vec::with_capacity(dimension);
    while blob.has_remaining() {
        embedding.push(blob.get_f32_le());
    }
    Ok(embedding)
}
