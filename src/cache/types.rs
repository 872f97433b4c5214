use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::hashing::{cache_key_hex, normalize_text, text_digest};

/// Shared, immutable embedding vector.
pub type Vector = Arc<[f32]>;

/// Content-addressed key: hex SHA-256 over `(model_id, sha256(normalized_text))`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Builds the key from a model id and the digest of already-normalized text.
    pub fn from_parts(model_id: &str, text_digest: &[u8; 32]) -> Self {
        Self(cache_key_hex(model_id, text_digest))
    }

    /// Normalizes `text` and builds its key.
    pub fn for_text(model_id: &str, text: &str) -> Self {
        Self::from_parts(model_id, &text_digest(&normalize_text(text)))
    }

    /// Lowercase 64-char hex form.
    #[inline]
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// Two-char directory shard used by the filesystem layout.
    #[inline]
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }

    /// Parses a hex key, rejecting anything that is not 64 lowercase hex chars.
    pub fn parse(hex_key: &str) -> Option<Self> {
        let valid = hex_key.len() == 64
            && hex_key
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        valid.then(|| Self(hex_key.to_string()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request for one embedding, normalized once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingRequest {
    pub model_id: String,
    pub raw_text: String,
    pub normalized_text: String,
}

impl EmbeddingRequest {
    pub fn new(model_id: &str, raw_text: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            raw_text: raw_text.to_string(),
            normalized_text: normalize_text(raw_text),
        }
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::from_parts(&self.model_id, &text_digest(&self.normalized_text))
    }
}

/// Whether the cache may reach the external provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Misses are fetched from the provider.
    #[default]
    Online,
    /// Misses fail with [`super::CacheError::CacheMiss`]; no provider calls.
    OfflineReplay,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Online => "online",
            Mode::OfflineReplay => "offline_replay",
        }
    }

    /// Ledger phase recorded for accesses made in this mode.
    pub fn ledger_phase(&self) -> super::LedgerPhase {
        match self {
            Mode::Online => super::LedgerPhase::Fetch,
            Mode::OfflineReplay => super::LedgerPhase::Replay,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, Mode::OfflineReplay)
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(Mode::Online),
            "offline_replay" | "offline" | "replay" => Ok(Mode::OfflineReplay),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a cache entry's vector came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    /// Fetched from the provider by this cache.
    Online,
    /// Imported without a provider call (legacy migration).
    Offline,
}

/// Persisted embedding. Write-once: never modified after the first successful `put`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub model_id: String,
    pub vector: Vec<f32>,
    pub dim: usize,
    pub source: EntrySource,
    pub created_at: String,
}

impl CacheEntry {
    pub fn new(
        key: CacheKey,
        model_id: &str,
        vector: Vec<f32>,
        source: EntrySource,
        created_at: String,
    ) -> Self {
        let dim = vector.len();
        Self {
            key,
            model_id: model_id.to_string(),
            vector,
            dim,
            source,
            created_at,
        }
    }

    /// Checks that the entry is usable for `expected`; returns the reason if not.
    pub fn check(&self, expected: &CacheKey) -> Result<(), String> {
        if &self.key != expected {
            return Err(format!("key mismatch: stored {}", self.key));
        }
        check_vector(&self.vector)?;
        if self.dim != self.vector.len() {
            return Err(format!(
                "dim {} does not match vector length {}",
                self.dim,
                self.vector.len()
            ));
        }
        Ok(())
    }

    pub fn to_vector(&self) -> Vector {
        Arc::from(self.vector.as_slice())
    }
}

/// Rejects empty vectors and non-finite components.
pub fn check_vector(vector: &[f32]) -> Result<(), String> {
    if vector.is_empty() {
        return Err("empty vector".to_string());
    }
    if let Some(pos) = vector.iter().position(|v| !v.is_finite()) {
        return Err(format!("non-finite component at index {pos}"));
    }
    Ok(())
}
