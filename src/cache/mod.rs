//! Content-addressed embedding cache, its stores and the access ledger.

pub mod embedding_cache;
pub mod error;
pub mod ledger;
pub mod migrate;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use embedding_cache::EmbeddingCache;
pub use error::{CacheError, CacheResult};
pub use ledger::{LedgerAudit, LedgerPhase, LedgerRecord, LedgerStatus, RunRecords, read_ledger_file};
pub use migrate::{MigrationReport, import_legacy, migrate_legacy_layout};
pub use store::{CacheStore, FsCacheStore, MemoryCacheStore, PutOutcome};
pub use types::{CacheEntry, CacheKey, EmbeddingRequest, EntrySource, Mode, Vector};
