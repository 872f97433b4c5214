use std::path::PathBuf;

use thiserror::Error;

use super::exit::ExitStatus;
use crate::cache::CacheError;
use crate::corpus::CorpusError;
use crate::fusion::FusionError;
use crate::parity::ArtifactError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Fusion(#[from] FusionError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("invalid request {path}: {reason}")]
    Request { path: PathBuf, reason: String },

    #[error("failed to serialize pipeline artifact: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// A required embedding was absent in offline replay.
    pub fn is_cache_miss(&self) -> bool {
        match self {
            PipelineError::Cache(e) => e.is_cache_miss(),
            PipelineError::Fusion(e) => e.is_cache_miss(),
            _ => false,
        }
    }

    pub fn exit_status(&self) -> ExitStatus {
        match self {
            PipelineError::Cache(CacheError::ReplayViolation { .. })
            | PipelineError::Fusion(FusionError::Cache(CacheError::ReplayViolation { .. })) => {
                ExitStatus::DeterminismFailed
            }
            _ if self.is_cache_miss() => ExitStatus::ConfigError,
            PipelineError::Fusion(
                FusionError::InvalidAlpha { .. } | FusionError::ZeroTopK | FusionError::EmptyModelId,
            ) => ExitStatus::ConfigError,
            PipelineError::Corpus(_) | PipelineError::Request { .. } => ExitStatus::ConfigError,
            _ => ExitStatus::RuntimeFailure,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_status().code()
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
