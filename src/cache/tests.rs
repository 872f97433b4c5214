use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use super::*;
use crate::determinism::FixedClock;
use crate::embedding::MockEmbeddingProvider;

const MODEL: &str = "test-model";

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::parse("2024-01-01T00:00:00Z").expect("clock"))
}

fn memory_cache() -> EmbeddingCache<Arc<MockEmbeddingProvider>, Arc<MemoryCacheStore>> {
    EmbeddingCache::new(
        Arc::new(MockEmbeddingProvider::with_dim(16)),
        Arc::new(MemoryCacheStore::new()),
        clock(),
    )
}

fn online_records(records: &[LedgerRecord]) -> usize {
    records.iter().filter(|r| r.online).count()
}

#[test]
fn test_key_ignores_case_and_whitespace() {
    assert_eq!(
        CacheKey::for_text(MODEL, "  Climate   RISK "),
        CacheKey::for_text(MODEL, "climate risk")
    );
    assert_ne!(
        CacheKey::for_text("other", "climate risk"),
        CacheKey::for_text(MODEL, "climate risk")
    );
}

#[test]
fn test_key_parse() {
    let key = CacheKey::for_text(MODEL, "x");
    assert_eq!(CacheKey::parse(key.as_hex()), Some(key.clone()));
    assert_eq!(key.shard().len(), 2);
    assert!(CacheKey::parse("ABC").is_none());
}

#[test]
fn test_mode_parse() {
    assert_eq!("online".parse::<Mode>(), Ok(Mode::Online));
    assert_eq!("OFFLINE_REPLAY".parse::<Mode>(), Ok(Mode::OfflineReplay));
    assert!("sometimes".parse::<Mode>().is_err());
    assert_eq!(Mode::OfflineReplay.ledger_phase(), LedgerPhase::Replay);
}

#[tokio::test]
async fn test_offline_empty_cache_fails_closed() {
    let cache = memory_cache();

    let err = cache
        .get_or_fetch(MODEL, "climate risk", Mode::OfflineReplay)
        .await
        .expect_err("offline miss");

    assert!(err.is_cache_miss());
    assert_eq!(err.key(), Some(&CacheKey::for_text(MODEL, "climate risk")));
    assert_eq!(cache.provider().calls(), 0);

    let records = cache.store().read_ledger().expect("ledger");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].phase, LedgerPhase::Replay);
    assert!(!records[0].online);
    assert_eq!(records[0].status, LedgerStatus::Error);
}

#[tokio::test]
async fn test_online_miss_fetches_once_then_hits() {
    let cache = memory_cache();

    let first = cache
        .get_or_fetch(MODEL, "climate risk", Mode::Online)
        .await
        .expect("fetch");
    let second = cache
        .get_or_fetch(MODEL, "Climate  Risk", Mode::Online)
        .await
        .expect("hit");

    assert_eq!(first, second);
    assert_eq!(cache.provider().calls(), 1);

    let records = cache.store().read_ledger().expect("ledger");
    assert_eq!(records.len(), 2);
    assert!(records[0].online);
    assert_eq!(records[0].phase, LedgerPhase::Fetch);
    assert_eq!(records[0].timestamp, "2024-01-01T00:00:00.000Z");
    assert!(!records[1].online);
}

#[tokio::test]
async fn test_replay_after_warm_is_offline() {
    let cache = memory_cache();
    cache
        .get_or_fetch(MODEL, "climate risk", Mode::Online)
        .await
        .expect("warm");
    let before = cache.store().ledger_len().expect("len");

    cache
        .get_or_fetch(MODEL, "climate risk", Mode::OfflineReplay)
        .await
        .expect("replay hit");

    let records = cache.store().read_ledger().expect("ledger");
    let replayed = &records[before..];
    let audit = LedgerAudit::ensure_replay_clean(replayed).expect("clean");
    assert_eq!(audit.records, 1);
    assert_eq!(audit.offline, 1);
    assert_eq!(replayed[0].status, LedgerStatus::Ok);
}

#[tokio::test]
async fn test_stored_entry_is_online_sourced() {
    let cache = memory_cache();
    cache
        .get_or_fetch(MODEL, "board oversight", Mode::Online)
        .await
        .expect("fetch");

    let key = CacheKey::for_text(MODEL, "board oversight");
    let entry = cache.store().get(&key).expect("get").expect("present");
    assert_eq!(entry.source, EntrySource::Online);
    assert_eq!(entry.dim, 16);
    assert_eq!(entry.model_id, MODEL);
    assert_eq!(entry.created_at, "2024-01-01T00:00:00.000Z");
}

#[tokio::test]
async fn test_concurrent_misses_coalesce() {
    let provider = Arc::new(MockEmbeddingProvider::with_dim(16).with_delay(Duration::from_millis(50)));
    let store = Arc::new(MemoryCacheStore::new());
    let cache = Arc::new(EmbeddingCache::new(Arc::clone(&provider), Arc::clone(&store), clock()));

    let a = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.get_or_fetch(MODEL, "climate risk", Mode::Online).await })
    };
    let b = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.get_or_fetch(MODEL, "climate risk", Mode::Online).await })
    };

    let va = a.await.expect("join").expect("fetch a");
    let vb = b.await.expect("join").expect("fetch b");

    assert_eq!(va, vb);
    assert_eq!(provider.calls(), 1);

    let records = store.read_ledger().expect("ledger");
    assert_eq!(records.len(), 2);
    assert_eq!(online_records(&records), 1);
}

#[tokio::test]
async fn test_provider_failure_propagates_without_entry() {
    let cache = memory_cache();
    cache.provider().set_failing(true);

    let err = cache
        .get_or_fetch(MODEL, "climate risk", Mode::Online)
        .await
        .expect_err("provider down");

    assert!(matches!(err, CacheError::ExternalFetch { .. }));
    assert!(cache.store().is_empty());
    let records = cache.store().read_ledger().expect("ledger");
    assert_eq!(records.len(), 1);
    assert!(records[0].online);
    assert_eq!(records[0].status, LedgerStatus::Error);
}

#[tokio::test]
async fn test_fetch_timeout_writes_nothing() {
    let cache = EmbeddingCache::with_timeout(
        MockEmbeddingProvider::with_dim(16).with_delay(Duration::from_millis(200)),
        MemoryCacheStore::new(),
        clock(),
        Duration::from_millis(10),
    );

    let err = cache
        .get_or_fetch(MODEL, "climate risk", Mode::Online)
        .await
        .expect_err("timeout");

    assert!(matches!(err, CacheError::FetchTimeout { timeout_ms: 10, .. }));
    assert!(cache.store().is_empty());
}

#[tokio::test]
async fn test_ledger_failure_is_fatal() {
    let cache = memory_cache();
    cache.store().set_ledger_failing(true);

    let err = cache
        .get_or_fetch(MODEL, "climate risk", Mode::Online)
        .await
        .expect_err("ledger down");

    assert!(matches!(err, CacheError::LedgerWrite { .. }));
    assert_eq!(cache.provider().calls(), 1);
    assert!(cache.store().is_empty());

    // The unrecorded vector was never published, so replay cannot serve it.
    cache.store().set_ledger_failing(false);
    let err = cache
        .get_or_fetch(MODEL, "climate risk", Mode::OfflineReplay)
        .await
        .expect_err("not cached");
    assert!(err.is_cache_miss());

    cache
        .get_or_fetch(MODEL, "climate risk", Mode::Online)
        .await
        .expect("refetch");
    let records = cache.store().read_ledger().expect("ledger");
    assert_eq!(online_records(&records), 1);
    assert_eq!(cache.provider().calls(), 2);
}

#[tokio::test]
async fn test_cancelled_fetch_releases_key_lock() {
    let cache = EmbeddingCache::new(
        Arc::new(MockEmbeddingProvider::with_dim(16).with_delay(Duration::from_secs(5))),
        Arc::new(MemoryCacheStore::new()),
        clock(),
    );

    let dropped = tokio::time::timeout(
        Duration::from_millis(20),
        cache.get_or_fetch(MODEL, "climate risk", Mode::Online),
    )
    .await;

    assert!(dropped.is_err());
    assert_eq!(cache.in_flight(), 0);
    assert!(cache.store().is_empty());
}

#[tokio::test]
async fn test_run_records_capture_only_inside_scope() {
    let cache = memory_cache();
    cache
        .get_or_fetch(MODEL, "outside", Mode::Online)
        .await
        .expect("outside");

    let run = RunRecords::new();
    run.scope(async {
        cache
            .get_or_fetch(MODEL, "inside", Mode::Online)
            .await
            .expect("inside");
        cache
            .get_or_fetch(MODEL, "inside", Mode::OfflineReplay)
            .await
            .expect("hit");
    })
    .await;

    let captured = run.records();
    assert_eq!(captured.len(), 2);
    assert!(captured.iter().all(|r| r.key == CacheKey::for_text(MODEL, "inside")));
    assert_eq!(online_records(&captured), 1);
    assert_eq!(cache.store().ledger_len().expect("len"), 3);
}

#[tokio::test]
async fn test_ensure_warm_and_missing_keys() {
    let cache = memory_cache();
    cache
        .get_or_fetch(MODEL, "alpha", Mode::Online)
        .await
        .expect("warm");

    assert!(cache.ensure_warm(MODEL, ["alpha", "ALPHA "]).is_ok());

    let missing = cache
        .missing_keys(MODEL, ["alpha", "beta", "gamma", "beta"])
        .expect("missing");
    assert_eq!(
        missing,
        vec![CacheKey::for_text(MODEL, "beta"), CacheKey::for_text(MODEL, "gamma")]
    );

    let err = cache.ensure_warm(MODEL, ["alpha", "beta"]).expect_err("cold");
    assert_eq!(err.key(), Some(&CacheKey::for_text(MODEL, "beta")));

    // Warm checks are not accesses.
    assert_eq!(cache.store().ledger_len().expect("len"), 1);
}

#[tokio::test]
async fn test_reset_clears_entries_and_ledger() {
    let cache = memory_cache();
    cache
        .get_or_fetch(MODEL, "alpha", Mode::Online)
        .await
        .expect("warm");
    cache.reset().expect("reset");

    assert!(!cache.contains(MODEL, "alpha").expect("contains"));
    assert_eq!(cache.store().ledger_len().expect("len"), 0);
}

#[tokio::test]
async fn test_fs_store_persists_across_instances() {
    let dir = TempDir::new().expect("tempdir");
    let first = EmbeddingCache::new(
        MockEmbeddingProvider::with_dim(8),
        FsCacheStore::new(dir.path().to_path_buf()),
        clock(),
    );
    let vector = first
        .get_or_fetch(MODEL, "climate risk", Mode::Online)
        .await
        .expect("fetch");

    let key = CacheKey::for_text(MODEL, "climate risk");
    let path = first.store().entry_path(&key);
    assert!(path.exists());
    assert!(path.starts_with(dir.path().join(key.shard())));

    let second = EmbeddingCache::new(
        MockEmbeddingProvider::with_dim(8),
        FsCacheStore::new(dir.path().to_path_buf()),
        clock(),
    );
    let replayed = second
        .get_or_fetch(MODEL, "climate risk", Mode::OfflineReplay)
        .await
        .expect("replay");
    assert_eq!(vector, replayed);
    assert_eq!(second.provider().calls(), 0);

    let records = second.store().read_ledger().expect("ledger");
    assert_eq!(records.len(), 2);
    assert_eq!(second.store().entry_count().expect("count"), 1);
}

#[tokio::test]
async fn test_fs_malformed_entry_is_a_miss() {
    let dir = TempDir::new().expect("tempdir");
    let store = FsCacheStore::new(dir.path().to_path_buf());
    let key = CacheKey::for_text(MODEL, "climate risk");
    let path = store.entry_path(&key);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(&path, b"{not json").expect("write");

    let cache = EmbeddingCache::new(MockEmbeddingProvider::with_dim(8), store, clock());

    let err = cache
        .get_or_fetch(MODEL, "climate risk", Mode::OfflineReplay)
        .await
        .expect_err("malformed offline");
    assert!(err.is_cache_miss());

    cache
        .get_or_fetch(MODEL, "climate risk", Mode::Online)
        .await
        .expect("refetch");
    assert_eq!(cache.provider().calls(), 1);
    assert!(cache.store().get(&key).expect("get").is_some());
}

#[test]
fn test_fs_put_never_overwrites_valid_entry() {
    let dir = TempDir::new().expect("tempdir");
    let store = FsCacheStore::new(dir.path().to_path_buf());
    let key = CacheKey::for_text(MODEL, "x");
    let original = CacheEntry::new(key.clone(), MODEL, vec![1.0, 0.0], EntrySource::Online, "t0".into());
    let replacement = CacheEntry::new(key.clone(), MODEL, vec![0.0, 1.0], EntrySource::Online, "t1".into());

    assert_eq!(store.put(&original).expect("put"), PutOutcome::Written);
    assert_eq!(store.put(&replacement).expect("put"), PutOutcome::AlreadyPresent);
    assert_eq!(store.get(&key).expect("get"), Some(original));
}

#[test]
fn test_entry_check_rejects_inconsistent_entries() {
    let key = CacheKey::for_text(MODEL, "x");
    let mut entry = CacheEntry::new(key.clone(), MODEL, vec![1.0, 2.0], EntrySource::Online, "t".into());
    assert!(entry.check(&key).is_ok());

    entry.dim = 3;
    assert!(entry.check(&key).is_err());

    let nan = CacheEntry::new(key.clone(), MODEL, vec![f32::NAN], EntrySource::Online, "t".into());
    assert!(nan.check(&key).is_err());
    assert!(entry.check(&CacheKey::for_text(MODEL, "y")).is_err());
}

#[test]
fn test_ledger_file_roundtrip_and_corruption() {
    let dir = TempDir::new().expect("tempdir");
    let store = FsCacheStore::new(dir.path().to_path_buf());
    let record = LedgerRecord {
        timestamp: "2024-01-01T00:00:00.000Z".into(),
        phase: LedgerPhase::Fetch,
        key: CacheKey::for_text(MODEL, "x"),
        online: true,
        status: LedgerStatus::Ok,
    };
    store.append_ledger(&record).expect("append");
    assert_eq!(store.read_ledger().expect("read"), vec![record.clone()]);

    let line = std::fs::read_to_string(store.ledger_path()).expect("read");
    assert!(line.contains(r#""phase":"fetch""#));
    assert!(line.ends_with('\n'));

    std::fs::write(store.ledger_path(), format!("{line}garbage\n")).expect("write");
    assert!(matches!(
        store.read_ledger(),
        Err(CacheError::LedgerCorrupt { line: 2, .. })
    ));
}

#[test]
fn test_ledger_audit_counts_and_violation() {
    let key = CacheKey::for_text(MODEL, "x");
    let record = |online, status| LedgerRecord {
        timestamp: "t".into(),
        phase: LedgerPhase::Replay,
        key: key.clone(),
        online,
        status,
    };
    let records = vec![
        record(false, LedgerStatus::Ok),
        record(false, LedgerStatus::Error),
    ];
    let audit = LedgerAudit::from_records(&records);
    assert_eq!(
        audit,
        LedgerAudit {
            records: 2,
            online: 0,
            offline: 2,
            errors: 1
        }
    );

    let dirty = vec![record(false, LedgerStatus::Ok), record(true, LedgerStatus::Ok)];
    assert!(matches!(
        LedgerAudit::ensure_replay_clean(&dirty),
        Err(CacheError::ReplayViolation { .. })
    ));
}
