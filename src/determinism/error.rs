use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A run whose output hash differs from the first run's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMismatch {
    pub run_index: usize,
    pub output_hash: String,
}

/// Two or more runs produced different artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("determinism violation: expected {expected}, {} run(s) differ", .mismatches.len())]
pub struct DeterminismViolation {
    /// Hash of run 0.
    pub expected: String,
    pub mismatches: Vec<RunMismatch>,
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("harness requires at least one run")]
    ZeroRuns,

    /// Run `run_index` failed; later runs were not started.
    #[error("run {run_index} failed: {source}")]
    RunFailed {
        run_index: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to serialize run {run_index} output: {reason}")]
    Serialization { run_index: usize, reason: String },

    #[error(transparent)]
    Determinism(#[from] DeterminismViolation),
}

impl HarnessError {
    /// Downcasts the failed run's error, if any.
    pub fn run_error<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            HarnessError::RunFailed { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
