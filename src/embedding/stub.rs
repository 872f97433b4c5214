//! Deterministic, dependency-free embedder.
//!
//! Hashes each token into a signed bucket and L2-normalizes the result. Not
//! semantically rich, but identical text always yields an identical vector,
//! which is what air-gapped runs and tests need.

use async_trait::async_trait;

use super::error::{EmbeddingError, EmbeddingResult};
use super::provider::EmbeddingProvider;
use crate::constants::STUB_EMBEDDING_DIM;
use crate::lexical::tokenize;

#[derive(Debug, Clone)]
pub struct StubEmbeddingProvider {
    dim: usize,
}

impl Default for StubEmbeddingProvider {
    fn default() -> Self {
        Self::new(STUB_EMBEDDING_DIM)
    }
}

impl StubEmbeddingProvider {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Synchronous core shared with the mock provider.
    pub fn embed_sync(&self, model_id: &str, text: &str) -> EmbeddingResult<Vec<f32>> {
        if self.dim == 0 {
            return Err(EmbeddingError::Unavailable {
                reason: "stub dimension is zero".to_string(),
            });
        }

        let mut vector = vec![0.0f32; self.dim];
        for token in tokenize(text) {
            let mut hasher = blake3::Hasher::new();
            hasher.update(model_id.as_bytes());
            hasher.update(b"|");
            hasher.update(token.as_bytes());
            let hash = hasher.finalize();
            let bytes = hash.as_bytes();

            let bucket = u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]) as usize
                % self.dim;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        } else {
            // Keep empty text embeddable: a fixed unit vector instead of zeros.
            vector[0] = 1.0;
        }
        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbeddingProvider {
    async fn embed(&self, model_id: &str, text: &str) -> EmbeddingResult<Vec<f32>> {
        self.embed_sync(model_id, text)
    }

    fn name(&self) -> &str {
        "stub"
    }
}
