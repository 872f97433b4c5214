//! Anchor library crate (used by the `anchor` binary and integration tests).
//!
//! Retrieval-and-verification core that grounds claims in corpus evidence and
//! proves the result is reproducible.
//!
//! ## Components
//! - [`EmbeddingCache`], [`CacheStore`] - content-addressed embeddings with an
//!   append-only access ledger and online / offline-replay gating
//! - [`LexicalIndex`] - BM25 over the corpus
//! - [`FusionRetriever`] - weighted lexical + semantic ranking with an id tie-break
//! - [`ParityValidator`], [`ArtifactStore`] - evidence must sit inside the fused top-k
//! - [`DeterminismHarness`] - fixed clock, seeded randomness, N-run hash comparison
//! - [`Pipeline`], [`run_validation`] - the stages wired together
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod config;
pub mod constants;
pub mod corpus;
pub mod determinism;
pub mod embedding;
pub mod fusion;
pub mod hashing;
pub mod lexical;
pub mod parity;
pub mod pipeline;

pub use cache::{
    CacheEntry, CacheError, CacheKey, CacheResult, CacheStore, EmbeddingCache, FsCacheStore,
    LedgerAudit, LedgerRecord, MemoryCacheStore, MigrationReport, Mode, migrate_legacy_layout,
};
pub use config::{Config, ConfigError};
pub use corpus::{Chunk, Corpus, CorpusError};
pub use determinism::{
    Clock, DeterminismHarness, DeterminismViolation, FixedClock, HarnessError, RunTrace,
    SeededRandom, SystemClock,
};
#[cfg(any(test, feature = "mock"))]
pub use embedding::MockEmbeddingProvider;
pub use embedding::{
    EmbeddingError, EmbeddingProvider, HttpEmbeddingProvider, StubEmbeddingProvider,
};
pub use fusion::{FusionConfig, FusionError, FusionResult, FusionRetriever, Normalization, Signal};
pub use hashing::{cache_key_hex, derive_query_id, hash_artifact, normalize_text};
pub use lexical::{LexicalIndex, tokenize};
pub use parity::{ArtifactError, ArtifactStore, ParityReport, ParityValidator};
pub use pipeline::{
    ExitStatus, Pipeline, PipelineArtifact, PipelineError, PipelineRequest, PipelineStage,
    run_validation,
};
