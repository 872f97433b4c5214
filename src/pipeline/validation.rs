//! The validation entry point: optional warm pass, N replay runs, verdict, exit status.

use std::path::PathBuf;

use tracing::{error, info, warn};

use super::error::PipelineError;
use super::exit::ExitStatus;
use super::request::PipelineRequest;
use super::runner::{Pipeline, PipelineArtifact};
use crate::cache::{CacheStore, Mode};
use crate::corpus::Corpus;
use crate::determinism::{DeterminismHarness, DeterminismViolation, HarnessError};
use crate::embedding::EmbeddingProvider;
use crate::parity::ArtifactStore;

/// Result of [`run_validation`]. `status` is always set; the rest depends on how far it got.
#[derive(Debug)]
pub struct ValidationOutcome {
    pub status: ExitStatus,
    pub artifact: Option<PipelineArtifact>,
    pub hashes: Vec<String>,
    pub report_path: Option<PathBuf>,
    pub violation: Option<DeterminismViolation>,
    pub failure: Option<String>,
}

impl ValidationOutcome {
    fn failed(status: ExitStatus, failure: String) -> Self {
        Self {
            status,
            artifact: None,
            hashes: Vec::new(),
            report_path: None,
            violation: None,
            failure: Some(failure),
        }
    }
}

/// Runs the pipeline through the harness and persists the parity report.
///
/// In [`Mode::Online`] a single online pass warms the cache first; the harness
/// runs are always offline replays so that the compared runs cannot reach the
/// provider.
pub async fn run_validation<P, S>(
    pipeline: &Pipeline<P, S>,
    harness: &DeterminismHarness,
    request: &PipelineRequest,
    corpus: &Corpus,
    mode: Mode,
    artifacts: &ArtifactStore,
) -> ValidationOutcome
where
    P: EmbeddingProvider,
    S: CacheStore,
{
    if mode == Mode::Online {
        if let Err(e) = pipeline.run(request, corpus, Mode::Online, harness.context(0)).await {
            error!(error = %e, "Warm pass failed");
            return ValidationOutcome::failed(e.exit_status(), e.to_string());
        }
        info!("Warm pass complete, replaying offline");
    }

    let run = harness
        .run(move |ctx| pipeline.run(request, corpus, Mode::OfflineReplay, ctx))
        .await;

    let run = match run {
        Ok(run) => run,
        Err(HarnessError::Determinism(violation)) => {
            error!(expected = %violation.expected, mismatches = violation.mismatches.len(), "Runs diverged");
            return ValidationOutcome {
                failure: Some(violation.to_string()),
                violation: Some(violation),
                ..ValidationOutcome::failed(ExitStatus::DeterminismFailed, String::new())
            };
        }
        Err(e) => {
            let status = match (&e, e.run_error::<PipelineError>()) {
                (_, Some(pipeline_error)) => pipeline_error.exit_status(),
                (HarnessError::ZeroRuns, None) => ExitStatus::ConfigError,
                _ => ExitStatus::RuntimeFailure,
            };
            error!(error = %e, exit_code = status.code(), "Validation run failed");
            return ValidationOutcome::failed(status, e.to_string());
        }
    };

    let hashes = run.hashes().into_iter().map(str::to_string).collect();
    let artifact = run.output;

    let report_path = match artifacts.persist_idempotent(&artifact.parity) {
        Ok(outcome) => outcome.path().to_path_buf(),
        Err(e) => {
            error!(error = %e, "Failed to persist parity report");
            return ValidationOutcome {
                hashes,
                artifact: Some(artifact),
                ..ValidationOutcome::failed(ExitStatus::RuntimeFailure, e.to_string())
            };
        }
    };

    let status = if artifact.parity.parity_ok {
        ExitStatus::Passed
    } else {
        warn!(missing = ?artifact.parity.missing, "Evidence outside fused top-k");
        ExitStatus::ParityFailed
    };

    ValidationOutcome {
        status,
        artifact: Some(artifact),
        hashes,
        report_path: Some(report_path),
        violation: None,
        failure: None,
    }
}
