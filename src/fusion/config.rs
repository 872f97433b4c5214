use serde::{Deserialize, Serialize};

use super::error::{FusionError, RetrieveResult};
use super::normalize::Normalization;
use crate::constants::{DEFAULT_ALPHA, DEFAULT_MODEL_ID, DEFAULT_TOP_K};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Lexical weight; semantic gets `1 - alpha`.
    pub alpha: f64,
    pub top_k: usize,
    pub normalization: Normalization,
    pub model_id: String,
    /// Turn offline embedding misses into errors instead of lexical-only candidates.
    pub require_complete_cache: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            top_k: DEFAULT_TOP_K,
            normalization: Normalization::default(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            require_complete_cache: false,
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> RetrieveResult<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(FusionError::InvalidAlpha { alpha: self.alpha });
        }
        if self.top_k == 0 {
            return Err(FusionError::ZeroTopK);
        }
        if self.model_id.trim().is_empty() {
            return Err(FusionError::EmptyModelId);
        }
        Ok(())
    }
}
