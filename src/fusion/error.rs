use thiserror::Error;

use crate::cache::CacheError;

#[derive(Debug, Error)]
pub enum FusionError {
    #[error("alpha must be within [0, 1], got {alpha}")]
    InvalidAlpha { alpha: f64 },

    #[error("top_k must be at least 1")]
    ZeroTopK,

    #[error("model_id must not be empty")]
    EmptyModelId,

    /// Cache miss under `require_complete_cache`, or any non-miss cache failure.
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("embedding for {id} has dimension {actual}, query has {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },
}

impl FusionError {
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, FusionError::Cache(e) if e.is_cache_miss())
    }
}

pub type RetrieveResult<T> = Result<T, FusionError>;
