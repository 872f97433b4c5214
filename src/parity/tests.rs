use std::sync::Arc;

use proptest::prelude::*;
use tempfile::TempDir;

use super::*;
use crate::determinism::FixedClock;

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn validator() -> ParityValidator {
    let clock = FixedClock::parse("2024-01-01T00:00:00Z").expect("clock");
    ParityValidator::new(Arc::new(clock), "run-0001")
}

fn top_k() -> Vec<String> {
    ids(&["d1", "d3", "d5", "d2", "d4"])
}

#[test]
fn test_climate_risk_subset_passes() {
    let report = validator().check("climate risk", &ids(&["d1", "d3"]), &top_k(), 5);
    assert!(report.parity_ok);
    assert!(report.missing.is_empty());
    assert_eq!(report.fused_top_k, top_k());
    assert_eq!(report.run_id, "run-0001");
    assert_eq!(report.checked_at, "2024-01-01T00:00:00.000Z");
    assert_eq!(report.query_id, crate::hashing::derive_query_id("climate risk"));
}

#[test]
fn test_climate_risk_outsider_fails() {
    let report = validator().check("climate risk", &ids(&["d1", "d7"]), &top_k(), 5);
    assert!(!report.parity_ok);
    assert_eq!(report.missing, ids(&["d7"]));
}

#[test]
fn test_only_first_k_count() {
    let report = validator().check("q", &ids(&["d1", "d4"]), &top_k(), 2);
    assert!(!report.parity_ok);
    assert_eq!(report.missing, ids(&["d4"]));
    assert_eq!(report.fused_top_k, ids(&["d1", "d3"]));
}

#[test]
fn test_missing_is_deduplicated_in_order() {
    let report = validator().check("q", &ids(&["d9", "d1", "d8", "d9"]), &top_k(), 5);
    assert_eq!(report.missing, ids(&["d9", "d8"]));
}

#[test]
fn test_empty_evidence_passes() {
    let report = validator().check("q", &[], &[], 5);
    assert!(report.parity_ok);
}

#[test]
fn test_report_json_field_names() {
    let report = validator().check_with_id("q-1", "q", &ids(&["d1"]), &top_k(), 5);
    let value: serde_json::Value = serde_json::from_slice(&report.to_json_bytes().expect("json")).expect("parse");
    for field in ["query_id", "run_id", "query", "k", "fused_top_k", "evidence_ids", "parity_ok", "missing", "checked_at"] {
        assert!(value.get(field).is_some(), "missing field {field}");
    }
    assert_eq!(value["query_id"], "q-1");
}

#[test]
fn test_store_persist_and_load() {
    let dir = TempDir::new().expect("tempdir");
    let store = ArtifactStore::new(dir.path().to_path_buf());
    let report = validator().check("climate risk", &ids(&["d1"]), &top_k(), 5);

    let path = store.persist(&report).expect("persist");
    assert_eq!(
        path,
        dir.path().join(&report.query_id).join("run-0001.json")
    );
    assert_eq!(store.load(&report.query_id, "run-0001").expect("load"), report);
}

#[test]
fn test_store_is_write_once() {
    let dir = TempDir::new().expect("tempdir");
    let store = ArtifactStore::new(dir.path().to_path_buf());
    let report = validator().check("climate risk", &ids(&["d1"]), &top_k(), 5);
    store.persist(&report).expect("first");

    let err = store.persist(&report).expect_err("second");
    assert!(matches!(err, ArtifactError::ArtifactExists { .. }));

    let mut changed = report.clone();
    changed.evidence_ids = ids(&["d7"]);
    assert!(store.persist(&changed).is_err());
    assert_eq!(store.load(&report.query_id, &report.run_id).expect("load"), report);
}

#[test]
fn test_store_idempotent_accepts_identical_only() {
    let dir = TempDir::new().expect("tempdir");
    let store = ArtifactStore::new(dir.path().to_path_buf());
    let report = validator().check("climate risk", &ids(&["d1"]), &top_k(), 5);

    assert!(matches!(store.persist_idempotent(&report), Ok(PersistOutcome::Written(_))));
    assert!(matches!(
        store.persist_idempotent(&report),
        Ok(PersistOutcome::AlreadyRecorded(_))
    ));

    let mut changed = report.clone();
    changed.parity_ok = false;
    assert!(matches!(
        store.persist_idempotent(&changed),
        Err(ArtifactError::ArtifactConflict { .. })
    ));
}

#[test]
fn test_store_rejects_path_traversal() {
    let dir = TempDir::new().expect("tempdir");
    let store = ArtifactStore::new(dir.path().to_path_buf());
    for bad in ["", "..", "a/b", "a\\b"] {
        assert!(matches!(
            store.report_path(bad, "run"),
            Err(ArtifactError::InvalidComponent { .. })
        ));
    }
}

proptest! {
    #[test]
    fn prop_parity_matches_subset(
        top in proptest::collection::vec("d[0-9]", 0..8),
        evidence in proptest::collection::vec("d[0-9]", 0..6),
        k in 0usize..10,
    ) {
        let report = validator().check("q", &evidence, &top, k);
        let window: Vec<&String> = top.iter().take(k).collect();
        let subset = evidence.iter().all(|e| window.contains(&e));
        prop_assert_eq!(report.parity_ok, subset);
        for id in &report.missing {
            prop_assert!(evidence.contains(id));
            prop_assert!(!window.contains(&id));
        }
    }
}
