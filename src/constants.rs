//! Cross-cutting, shared constants.
//!
//! Defaults here are the values [`crate::config::Config`] falls back to when the
//! corresponding `ANCHOR_*` variable is unset.

use std::time::Duration;

/// Default lexical weight in the fused score.
pub const DEFAULT_ALPHA: f64 = 0.6;

/// Default number of fused results kept.
pub const DEFAULT_TOP_K: usize = 5;

/// Default number of runs the determinism harness compares.
pub const DEFAULT_RUNS: usize = 3;

/// Default embedding model identifier.
pub const DEFAULT_MODEL_ID: &str = "text-embedding-3-small";

pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS);

/// Max vectors kept in the in-memory hot layer in front of the cache store.
pub const DEFAULT_HOT_CAPACITY: u64 = 50_000;

/// Dimension produced by the deterministic stub embedder.
pub const STUB_EMBEDDING_DIM: usize = 256;

/// BM25 term-frequency saturation.
pub const BM25_K1: f64 = 1.2;

/// BM25 length normalization.
pub const BM25_B: f64 = 0.75;

/// Tokens shorter than this are dropped by the lexical tokenizer.
pub const MIN_TOKEN_LEN: usize = 2;

/// `created_at` assigned to migrated legacy entries that carry none.
pub const LEGACY_CREATED_AT: &str = "1970-01-01T00:00:00.000Z";

/// Ledger file name used when no explicit ledger path is configured.
pub const DEFAULT_LEDGER_FILENAME: &str = "ledger.jsonl";
