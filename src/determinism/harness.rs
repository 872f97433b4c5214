//! Repeated execution with output fingerprinting.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::error::{DeterminismViolation, HarnessError, HarnessResult, RunMismatch};
use super::random::SeededRandom;
use crate::hashing::hash_artifact;

/// Fingerprint of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTrace {
    pub run_index: usize,
    /// BLAKE3 hex of the run's serialized output.
    pub output_hash: String,
    pub duration: Duration,
}

/// Traces of every run plus the first run's output.
#[derive(Debug)]
pub struct HarnessRun<T> {
    pub traces: Vec<RunTrace>,
    pub output: T,
}

impl<T> HarnessRun<T> {
    pub fn hashes(&self) -> Vec<&str> {
        self.traces.iter().map(|t| t.output_hash.as_str()).collect()
    }
}

/// Runs `pipeline_fn` `n` times, hashing each serialized output.
///
/// Stops at the first failing run. Keeps the output of run 0.
pub async fn run_n_times<F, Fut, T, E>(n: usize, mut pipeline_fn: F) -> HarnessResult<HarnessRun<T>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Serialize,
    E: std::error::Error + Send + Sync + 'static,
{
    if n == 0 {
        return Err(HarnessError::ZeroRuns);
    }

    let mut traces = Vec::with_capacity(n);
    let mut first = None;

    for run_index in 0..n {
        let started = Instant::now();
        let output = pipeline_fn(run_index).await.map_err(|e| {
            warn!(run_index, error = %e, "Run failed, aborting harness");
            HarnessError::RunFailed {
                run_index,
                source: Box::new(e),
            }
        })?;
        let bytes = serde_json::to_vec(&output).map_err(|e| HarnessError::Serialization {
            run_index,
            reason: e.to_string(),
        })?;
        let trace = RunTrace {
            run_index,
            output_hash: hash_artifact(&bytes),
            duration: started.elapsed(),
        };
        debug!(run_index, hash = %trace.output_hash, elapsed = ?trace.duration, "Run complete");
        traces.push(trace);
        if first.is_none() {
            first = Some(output);
        }
    }

    match first {
        Some(output) => Ok(HarnessRun { traces, output }),
        None => Err(HarnessError::ZeroRuns),
    }
}

/// Fails if any trace's hash differs from the first.
pub fn assert_identical(traces: &[RunTrace]) -> Result<(), DeterminismViolation> {
    let Some(reference) = traces.first() else {
        return Ok(());
    };

    let mismatches: Vec<RunMismatch> = traces
        .iter()
        .filter(|t| t.output_hash != reference.output_hash)
        .map(|t| RunMismatch {
            run_index: t.run_index,
            output_hash: t.output_hash.clone(),
        })
        .collect();

    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(DeterminismViolation {
            expected: reference.output_hash.clone(),
            mismatches,
        })
    }
}

/// Inputs handed to each run: the shared clock and a random stream restarted from the seed.
#[derive(Debug)]
pub struct RunContext {
    pub run_index: usize,
    pub clock: Arc<dyn Clock>,
    pub random: SeededRandom,
}

/// Fixed clock, fixed seed, N runs, identical hashes or failure.
#[derive(Debug, Clone)]
pub struct DeterminismHarness {
    clock: Arc<dyn Clock>,
    seed: u64,
    runs: usize,
}

impl DeterminismHarness {
    pub fn new(clock: Arc<dyn Clock>, seed: u64, runs: usize) -> Self {
        Self { clock, seed, runs }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn context(&self, run_index: usize) -> RunContext {
        RunContext {
            run_index,
            clock: Arc::clone(&self.clock),
            random: SeededRandom::new(self.seed),
        }
    }

    /// Runs the pipeline `runs` times and checks the output hashes agree.
    pub async fn run<F, Fut, T, E>(&self, mut pipeline_fn: F) -> HarnessResult<HarnessRun<T>>
    where
        F: FnMut(RunContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize,
        E: std::error::Error + Send + Sync + 'static,
    {
        let run = run_n_times(self.runs, |run_index| pipeline_fn(self.context(run_index))).await?;
        assert_identical(&run.traces)?;
        info!(
            runs = run.traces.len(),
            hash = %run.traces[0].output_hash,
            "All runs produced identical output"
        );
        Ok(run)
    }
}
