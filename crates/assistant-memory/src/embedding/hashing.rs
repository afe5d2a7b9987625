//! Deterministic local embedder (feature hashing)
//!
//! Lower-cased word unigrams, character trigrams and individual symbols
//! (punctuation, emoji) are hashed with FNV-1a into signed buckets and the
//! result is L2-normalised. The last bucket is a constant bias, so every
//! string, including the empty one, gets a non-zero vector. Output is stable
//! across processes and releases, so vectors written by one run stay
//! comparable with queries made by the next. Lexical, not semantic.
use async_trait::async_trait;

use super::EmbeddingProvider;
use crate::error::{MemoryError, Result};
use crate::utils::TextUtils;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.35;
const SYMBOL_WEIGHT: f32 = 0.25;
const BIAS_WEIGHT: f32 = 0.05;

#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimension: usize,
}

impl HashingEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn fnv1a(bytes: &[u8]) -> u64 {
        bytes.iter().fold(FNV_OFFSET, |hash, b| {
            (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
        })
    }

    /// Hashed features land in every bucket but the last.
    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let buckets = self.dimension - 1;
        if buckets == 0 {
            return;
        }
        let hash = Self::fnv1a(feature.as_bytes());
        let bucket = (hash % buckets as u64) as usize;
        // top bit picks the sign so collisions tend to cancel rather than pile up
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }

    pub fn embed_sync(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimension == 0 {
            return Err(MemoryError::Embedding("dimension must be positive".to_string()));
        }
        let mut vector = vec![0.0f32; self.dimension];
        vector[self.dimension - 1] = BIAS_WEIGHT;

        for word in TextUtils::tokenize(text) {
            self.add_feature(&mut vector, &format!("w:{}", word), WORD_WEIGHT);
            let padded: Vec<char> = format!(" {} ", word).chars().collect();
            for trigram in padded.windows(3) {
                let gram: String = trigram.iter().collect();
                self.add_feature(&mut vector, &format!("c:{}", gram), TRIGRAM_WEIGHT);
            }
        }
        for symbol in text.chars().filter(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
            self.add_feature(&mut vector, &format!("s:{}", symbol), SYMBOL_WEIGHT);
        }

        // the bias bucket is never touched by hashing, so the norm is positive
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        vector.iter_mut().for_each(|v| *v /= norm);
        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hashing-fnv1a"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_sync(text)
    }
}
