use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    /// A report was already persisted for this `(query_id, run_id)`.
    #[error("artifact already exists: {path}")]
    ArtifactExists { path: PathBuf },

    /// An existing artifact differs from the one being persisted.
    #[error("artifact at {path} differs from the report being persisted")]
    ArtifactConflict { path: PathBuf },

    #[error("invalid artifact path component: {component:?}")]
    InvalidComponent { component: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ArtifactResult<T> = Result<T, ArtifactError>;
