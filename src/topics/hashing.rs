// Feature-hashing embedder — the offline fallback backend.
//
// Each token is hashed with SipHash-1-3 (fixed keys, so output is stable
// across runs and platforms) into one of `dim` buckets with a ±1 sign taken
// from the top hash bit. The bag-of-buckets vector is L2-normalized.
// Documents that share vocabulary land close together; documents with
// disjoint vocabulary are near-orthogonal.

use std::hash::Hasher;

use anyhow::Result;
use async_trait::async_trait;
use siphasher::sip::SipHasher13;

use super::embeddings::l2_normalize;
use super::traits::EmbeddingProvider;

/// Default number of hash buckets.
pub const DEFAULT_HASH_DIM: usize = 512;

pub struct HashingEmbedder {
    dim: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIM)
    }
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    /// Embed a single document synchronously.
    pub fn embed_one(&self, text: &str) -> Vec<f64> {
        let mut v = vec![0.0_f64; self.dim];
        for token in text.split_whitespace() {
            let hash = sip_hash(token);
            let bucket = (hash % self.dim as u64) as usize;
            let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
            v[bucket] += sign;
        }
        l2_normalize(v)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "feature-hashing"
    }
}

fn sip_hash(token: &str) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write(token.as_bytes());
    hasher.finish()
}
