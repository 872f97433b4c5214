use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;

#[derive(Debug, thiserror::Error)]
#[error("boom at run {0}")]
struct Boom(usize);

fn trace(run_index: usize, hash: &str) -> RunTrace {
    RunTrace {
        run_index,
        output_hash: hash.to_string(),
        duration: Duration::ZERO,
    }
}

#[test]
fn test_fixed_clock_timestamp_format() {
    let clock = FixedClock::parse("2024-01-01T00:00:00Z").expect("parse");
    assert_eq!(clock.timestamp(), "2024-01-01T00:00:00.000Z");
    assert_eq!(clock.timestamp(), clock.timestamp());
}

#[test]
fn test_fixed_clock_converts_offsets_to_utc() {
    let clock = FixedClock::parse("2024-06-30T12:30:00+02:00").expect("parse");
    assert_eq!(clock.timestamp(), "2024-06-30T10:30:00.000Z");
}

#[test]
fn test_fixed_clock_rejects_garbage() {
    assert!(FixedClock::parse("yesterday").is_err());
}

#[test]
fn test_system_clock_moves_forward() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}

#[test]
fn test_seeded_random_reproducible() {
    let a = SeededRandom::new(42);
    let b = SeededRandom::new(42);
    for _ in 0..8 {
        assert_eq!(a.next_u64(), b.next_u64());
    }
    assert_eq!(a.seed(), 42);
}

#[test]
fn test_seeded_random_differs_by_seed() {
    assert_ne!(SeededRandom::new(1).next_u64(), SeededRandom::new(2).next_u64());
}

#[test]
fn test_run_id_is_v4_uuid_and_reproducible() {
    let a = SeededRandom::new(7).run_id();
    let b = SeededRandom::new(7).run_id();
    assert_eq!(a, b);
    let parsed = uuid::Uuid::parse_str(&a).expect("uuid");
    assert_eq!(parsed.get_version_num(), 4);
}

#[test]
fn test_successive_run_ids_differ() {
    let random = SeededRandom::new(7);
    assert_ne!(random.run_id(), random.run_id());
}

#[test]
fn test_assert_identical_passes() {
    let traces = vec![trace(0, "aa"), trace(1, "aa"), trace(2, "aa")];
    assert!(assert_identical(&traces).is_ok());
    assert!(assert_identical(&[]).is_ok());
}

#[test]
fn test_assert_identical_lists_every_mismatch() {
    let traces = vec![trace(0, "aa"), trace(1, "bb"), trace(2, "aa"), trace(3, "cc")];
    let violation = assert_identical(&traces).expect_err("should differ");
    assert_eq!(violation.expected, "aa");
    assert_eq!(
        violation.mismatches,
        vec![
            RunMismatch {
                run_index: 1,
                output_hash: "bb".to_string()
            },
            RunMismatch {
                run_index: 3,
                output_hash: "cc".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_run_n_times_identical_hashes() {
    let run = run_n_times(3, |_| async { Ok::<_, Boom>(vec!["d1", "d3"]) })
        .await
        .expect("runs");
    assert_eq!(run.traces.len(), 3);
    assert_eq!(run.output, vec!["d1", "d3"]);
    let hashes = run.hashes();
    assert!(hashes.iter().all(|h| *h == hashes[0]));
    assert_eq!(hashes[0].len(), 64);
}

#[tokio::test]
async fn test_run_n_times_zero_runs() {
    let result = run_n_times(0, |_| async { Ok::<_, Boom>(1) }).await;
    assert!(matches!(result, Err(HarnessError::ZeroRuns)));
}

#[tokio::test]
async fn test_run_n_times_aborts_on_first_failure() {
    let calls = AtomicUsize::new(0);
    let result = run_n_times(5, |run_index| {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if run_index == 1 {
                Err(Boom(run_index))
            } else {
                Ok(run_index)
            }
        }
    })
    .await;

    let err = result.expect_err("should fail");
    assert!(matches!(err, HarnessError::RunFailed { run_index: 1, .. }));
    assert_eq!(err.run_error::<Boom>().map(|b| b.0), Some(1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_harness_detects_nondeterminism() {
    let harness = DeterminismHarness::new(Arc::new(SystemClock), 1, 3);
    let result = harness
        .run(|ctx| async move { Ok::<_, Boom>(ctx.run_index) })
        .await;
    match result {
        Err(HarnessError::Determinism(violation)) => {
            assert_eq!(violation.mismatches.len(), 2);
        }
        other => panic!("expected determinism violation, got {other:?}"),
    }
}

#[tokio::test]
async fn test_harness_contexts_share_seed_and_clock() {
    let clock = FixedClock::parse("2024-01-01T00:00:00Z").expect("parse");
    let harness = DeterminismHarness::new(Arc::new(clock), 99, 3);
    let run = harness
        .run(|ctx| async move { Ok::<_, Boom>((ctx.clock.timestamp(), ctx.random.run_id())) })
        .await
        .expect("identical");
    assert_eq!(run.output.0, "2024-01-01T00:00:00.000Z");
    assert_eq!(run.output.1, SeededRandom::new(99).run_id());
}
