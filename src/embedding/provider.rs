use std::sync::Arc;

use async_trait::async_trait;

use super::error::EmbeddingResult;

/// External embedding capability used by the cache on an online miss.
///
/// Implementations may be slow and non-deterministic; the cache is what makes
/// their output replayable.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds `text` (already normalized by the caller) under `model_id`.
    async fn embed(&self, model_id: &str, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: EmbeddingProvider + ?Sized> EmbeddingProvider for Arc<T> {
    async fn embed(&self, model_id: &str, text: &str) -> EmbeddingResult<Vec<f32>> {
        (**self).embed(model_id, text).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
