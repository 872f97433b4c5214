use std::path::PathBuf;
use thiserror::Error;

use super::types::CacheKey;
use crate::embedding::EmbeddingError;

/// Errors returned by the embedding cache, its stores and the ledger.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Key absent while running in offline replay. Fatal for the request, never retried.
    #[error("cache miss in offline replay for key {key}")]
    CacheMiss { key: CacheKey },

    /// The provider call failed. Not retried by the cache.
    #[error("external embedding fetch failed for key {key}: {source}")]
    ExternalFetch {
        key: CacheKey,
        #[source]
        source: EmbeddingError,
    },

    /// The provider call exceeded its deadline. No entry was written.
    #[error("external embedding fetch for key {key} timed out after {timeout_ms}ms")]
    FetchTimeout { key: CacheKey, timeout_ms: u64 },

    /// The access could not be recorded, so it cannot be proven.
    #[error("ledger write failed for key {key}: {reason}")]
    LedgerWrite { key: CacheKey, reason: String },

    #[error("ledger is unreadable at line {line}: {reason}")]
    LedgerCorrupt { line: usize, reason: String },

    /// An `online=true` record was written during offline replay.
    #[error("online ledger record during offline replay for key {key}")]
    ReplayViolation { key: CacheKey },

    #[error("legacy cache directory not found: {path}")]
    LegacyDirMissing { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CacheError {
    /// Returns `true` for [`CacheError::CacheMiss`].
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, CacheError::CacheMiss { .. })
    }

    /// The offending key, when the error is tied to one.
    pub fn key(&self) -> Option<&CacheKey> {
        match self {
            CacheError::CacheMiss { key }
            | CacheError::ExternalFetch { key, .. }
            | CacheError::FetchTimeout { key, .. }
            | CacheError::LedgerWrite { key, .. }
            | CacheError::ReplayViolation { key } => Some(key),
            CacheError::LedgerCorrupt { .. }
            | CacheError::LegacyDirMissing { .. }
            | CacheError::Io(_)
            | CacheError::Serialization(_) => None,
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

/// Convenience result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
