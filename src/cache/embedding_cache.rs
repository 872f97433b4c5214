//! Content-addressed embedding cache with online/offline gating.
//!
//! Every access appends one [`LedgerRecord`]. Online misses for the same key are
//! coalesced behind a per-key async lock so the provider is called at most once
//! per key per process; callers that waited record `online=false`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::error::{CacheError, CacheResult};
use super::ledger::{LedgerRecord, LedgerStatus, RunRecords};
use super::store::{CacheStore, PutOutcome};
use super::types::{CacheEntry, CacheKey, EmbeddingRequest, EntrySource, Mode, Vector, check_vector};
use crate::constants::{DEFAULT_FETCH_TIMEOUT, DEFAULT_HOT_CAPACITY};
use crate::determinism::Clock;
use crate::embedding::{EmbeddingError, EmbeddingProvider};

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// Embedding cache over an injected provider and store.
pub struct EmbeddingCache<P: EmbeddingProvider, S: CacheStore> {
    provider: P,
    store: S,
    clock: Arc<dyn Clock>,
    hot: Cache<CacheKey, Vector>,
    in_flight: Mutex<HashMap<CacheKey, KeyLock>>,
    fetch_timeout: Duration,
}

impl<P: EmbeddingProvider, S: CacheStore> std::fmt::Debug for EmbeddingCache<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("provider", &self.provider.name())
            .field("hot_entries", &self.hot.entry_count())
            .field("in_flight", &self.in_flight.lock().len())
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

impl<P: EmbeddingProvider, S: CacheStore> EmbeddingCache<P, S> {
    pub fn new(provider: P, store: S, clock: Arc<dyn Clock>) -> Self {
        Self::with_timeout(provider, store, clock, DEFAULT_FETCH_TIMEOUT)
    }

    /// Creates a cache whose provider calls fail after `fetch_timeout`.
    pub fn with_timeout(
        provider: P,
        store: S,
        clock: Arc<dyn Clock>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            clock,
            hot: Cache::builder().max_capacity(DEFAULT_HOT_CAPACITY).build(),
            in_flight: Mutex::new(HashMap::new()),
            fetch_timeout,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Returns the vector for `(model_id, text)`, fetching it only in [`Mode::Online`].
    #[instrument(skip(self, text, mode), fields(text_len = text.len(), mode = %mode))]
    pub async fn get_or_fetch(&self, model_id: &str, text: &str, mode: Mode) -> CacheResult<Vector> {
        let request = EmbeddingRequest::new(model_id, text);
        let key = request.key();

        if let Some(vector) = self.lookup(&key)? {
            self.record(&key, mode, false, LedgerStatus::Ok)?;
            debug!(key = %key, "Served from cache");
            return Ok(vector);
        }

        match mode {
            Mode::OfflineReplay => {
                self.record(&key, mode, false, LedgerStatus::Error)?;
                warn!(key = %key, "Cache miss in offline replay, refusing to fetch");
                Err(CacheError::CacheMiss { key })
            }
            Mode::Online => self.fetch_coalesced(&request, key).await,
        }
    }

    /// Returns `true` if `(model_id, text)` is cached. Does not touch the ledger.
    pub fn contains(&self, model_id: &str, text: &str) -> CacheResult<bool> {
        Ok(self.lookup(&CacheKey::for_text(model_id, text))?.is_some())
    }

    /// Keys among `texts` that are not cached, in input order, deduplicated.
    pub fn missing_keys<'a, I>(&self, model_id: &str, texts: I) -> CacheResult<Vec<CacheKey>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut missing = Vec::new();
        for text in texts {
            let key = CacheKey::for_text(model_id, text);
            if self.lookup(&key)?.is_none() && !missing.contains(&key) {
                missing.push(key);
            }
        }
        Ok(missing)
    }

    /// Fails with [`CacheError::CacheMiss`] naming the first uncached text.
    pub fn ensure_warm<'a, I>(&self, model_id: &str, texts: I) -> CacheResult<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let missing = self.missing_keys(model_id, texts)?;
        match missing.into_iter().next() {
            Some(key) => Err(CacheError::CacheMiss { key }),
            None => Ok(()),
        }
    }

    /// Drops every entry and the ledger. Destructive; the only way besides
    /// migration to remove persisted state.
    pub fn reset(&self) -> CacheResult<()> {
        self.store.reset()?;
        self.hot.invalidate_all();
        info!("Embedding cache reset");
        Ok(())
    }

    fn lookup(&self, key: &CacheKey) -> CacheResult<Option<Vector>> {
        if let Some(vector) = self.hot.get(key) {
            return Ok(Some(vector));
        }
        match self.store.get(key)? {
            Some(entry) => {
                let vector = entry.to_vector();
                self.hot.insert(key.clone(), Arc::clone(&vector));
                Ok(Some(vector))
            }
            None => Ok(None),
        }
    }

    async fn fetch_coalesced(&self, request: &EmbeddingRequest, key: CacheKey) -> CacheResult<Vector> {
        let slot = self.key_lock(&key);
        let _held = slot.lock.lock().await;
        self.fetch_locked(request, &key).await
    }

    async fn fetch_locked(&self, request: &EmbeddingRequest, key: &CacheKey) -> CacheResult<Vector> {
        // Another caller may have populated the key while we waited.
        if let Some(vector) = self.lookup(key)? {
            self.record(key, Mode::Online, false, LedgerStatus::Ok)?;
            debug!(key = %key, "Coalesced onto completed fetch");
            return Ok(vector);
        }

        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            self.provider
                .embed(&request.model_id, &request.normalized_text),
        )
        .await;

        let raw = match fetched {
            Ok(Ok(raw)) => raw,
            Ok(Err(source)) => {
                self.record_failed_fetch(key);
                return Err(CacheError::ExternalFetch {
                    key: key.clone(),
                    source,
                });
            }
            Err(_) => {
                self.record_failed_fetch(key);
                return Err(CacheError::FetchTimeout {
                    key: key.clone(),
                    timeout_ms: self.fetch_timeout.as_millis() as u64,
                });
            }
        };

        if let Err(reason) = check_vector(&raw) {
            self.record_failed_fetch(key);
            return Err(CacheError::ExternalFetch {
                key: key.clone(),
                source: EmbeddingError::InvalidResponse { reason },
            });
        }

        // Nothing is published until the online fetch is on the ledger.
        self.record(key, Mode::Online, true, LedgerStatus::Ok)?;

        let entry = CacheEntry::new(
            key.clone(),
            &request.model_id,
            raw,
            EntrySource::Online,
            self.clock.timestamp(),
        );

        let vector = match self.store.put(&entry)? {
            PutOutcome::Written => entry.to_vector(),
            // Written by someone outside this process first; keep theirs.
            PutOutcome::AlreadyPresent => match self.store.get(key)? {
                Some(existing) => existing.to_vector(),
                None => entry.to_vector(),
            },
        };
        self.hot.insert(key.clone(), Arc::clone(&vector));

        info!(
            key = %key,
            provider = self.provider.name(),
            dim = vector.len(),
            "Fetched embedding online"
        );
        Ok(vector)
    }

    fn record(&self, key: &CacheKey, mode: Mode, online: bool, status: LedgerStatus) -> CacheResult<()> {
        let record = LedgerRecord {
            timestamp: self.clock.timestamp(),
            phase: mode.ledger_phase(),
            key: key.clone(),
            online,
            status,
        };
        self.store.append_ledger(&record).map_err(|e| {
            error!(key = %key, error = %e, "Ledger append failed");
            CacheError::LedgerWrite {
                key: key.clone(),
                reason: e.to_string(),
            }
        })?;
        RunRecords::capture(&record);
        Ok(())
    }

    /// The request is already failing; a ledger failure here is logged, not surfaced.
    fn record_failed_fetch(&self, key: &CacheKey) {
        let _ = self.record(key, Mode::Online, true, LedgerStatus::Error);
    }

    fn key_lock<'a>(&'a self, key: &'a CacheKey) -> InFlightSlot<'a> {
        let lock = Arc::clone(self.in_flight.lock().entry(key.clone()).or_default());
        InFlightSlot {
            in_flight: &self.in_flight,
            key,
            lock,
        }
    }

    /// Keys with a fetch in progress or waiting on one.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}

/// A caller's share of a per-key lock. Dropping the last share, including when
/// the owning future is cancelled, removes the key from the in-flight map.
struct InFlightSlot<'a> {
    in_flight: &'a Mutex<HashMap<CacheKey, KeyLock>>,
    key: &'a CacheKey,
    lock: KeyLock,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock();
        // One reference in the map plus ours means nobody else is waiting.
        if Arc::strong_count(&self.lock) <= 2
            && in_flight
                .get(self.key)
                .is_some_and(|current| Arc::ptr_eq(current, &self.lock))
        {
            in_flight.remove(self.key);
        }
    }
}
