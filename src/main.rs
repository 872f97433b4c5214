//! Anchor validation entrypoint.
//!
//! ```text
//! anchor                    run the pipeline through the determinism harness
//! anchor --warm             single online pass to populate the cache
//! anchor --migrate <dir>    import a legacy cache directory
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use mimalloc::MiMalloc;
use serde_json::json;

use anchor::cache::{EmbeddingCache, FsCacheStore, Mode, migrate_legacy_layout};
use anchor::config::{Config, ConfigError};
use anchor::corpus::{Corpus, CorpusError};
use anchor::determinism::DeterminismHarness;
use anchor::embedding::{EmbeddingProvider, HttpEmbeddingProvider, StubEmbeddingProvider};
use anchor::fusion::{FusionError, FusionRetriever};
use anchor::parity::ArtifactStore;
use anchor::pipeline::{ExitStatus, Pipeline, PipelineError, PipelineRequest, run_validation};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

enum Command {
    Validate,
    Warm,
    Migrate(PathBuf),
}

fn parse_command(args: &[String]) -> Result<Command, ConfigError> {
    match args.first().map(String::as_str) {
        None => Ok(Command::Validate),
        Some("--warm") => Ok(Command::Warm),
        Some("--migrate") => args
            .get(1)
            .map(|dir| Command::Migrate(PathBuf::from(dir)))
            .ok_or(ConfigError::MissingEnvVar {
                name: "--migrate <old_dir>",
            }),
        Some(other) => Err(ConfigError::InvalidValue {
            name: "argument",
            value: other.to_string(),
        }),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args).await {
        Ok(status) => status.into(),
        Err(e) => {
            let status = classify(&e);
            tracing::error!(error = %format!("{e:#}"), exit_code = status.code(), "Anchor failed");
            status.into()
        }
    }
}

/// Maps a top-level failure to its exit status.
fn classify(err: &anyhow::Error) -> ExitStatus {
    if let Some(e) = err.downcast_ref::<PipelineError>() {
        return e.exit_status();
    }
    if err.downcast_ref::<ConfigError>().is_some() || err.downcast_ref::<CorpusError>().is_some() {
        return ExitStatus::ConfigError;
    }
    if let Some(e) = err.downcast_ref::<FusionError>()
        && !matches!(e, FusionError::Cache(_) | FusionError::DimensionMismatch { .. })
    {
        return ExitStatus::ConfigError;
    }
    ExitStatus::RuntimeFailure
}

async fn run(args: &[String]) -> anyhow::Result<ExitStatus> {
    let command = parse_command(args)?;
    let config = Config::from_env()?;
    config.validate()?;

    if let Command::Migrate(old_dir) = &command {
        let report = migrate_legacy_layout(old_dir, &config.cache_dir)
            .with_context(|| format!("migrating {}", old_dir.display()))?;
        println!("{}", json!({ "copied": report.copied, "already_present": report.already_present, "invalid": report.invalid }));
        return Ok(ExitStatus::Passed);
    }

    let (corpus_path, request_path) = config.require_inputs()?;
    let corpus = Corpus::from_jsonl(corpus_path)?;
    let request = PipelineRequest::from_json_file(request_path)?;

    let seed = config.seed.unwrap_or_else(rand::random);
    let clock = config.harness_clock();
    tracing::info!(
        mode = %config.mode,
        seed,
        time = %clock.timestamp(),
        model_id = %config.model_id,
        chunks = corpus.len(),
        "Anchor starting"
    );

    let provider: Arc<dyn EmbeddingProvider> = match &config.embedding_url {
        Some(url) => Arc::new(HttpEmbeddingProvider::new(
            url.clone(),
            config.embedding_api_key.clone(),
            config.fetch_timeout(),
        )?),
        None => {
            tracing::warn!("No ANCHOR_EMBEDDING_URL configured, using the deterministic stub embedder");
            Arc::new(StubEmbeddingProvider::default())
        }
    };
    // A warm pass is not replayed, so its ledger follows the wall clock.
    let cache_clock = match command {
        Command::Warm => config.clock(),
        _ => Arc::clone(&clock),
    };
    let store = FsCacheStore::with_ledger(config.cache_dir.clone(), config.resolved_ledger_path());
    let cache = Arc::new(EmbeddingCache::with_timeout(
        provider,
        store,
        cache_clock,
        config.fetch_timeout(),
    ));
    let pipeline = Pipeline::new(FusionRetriever::new(cache, config.fusion_config())?);
    let harness = DeterminismHarness::new(clock, seed, config.runs);

    if let Command::Warm = command {
        if config.mode.is_offline() {
            return Err(ConfigError::InvalidValue {
                name: "ANCHOR_MODE",
                value: "--warm requires online mode".to_string(),
            }
            .into());
        }
        let artifact = pipeline
            .run(&request, &corpus, Mode::Online, harness.context(0))
            .await?;
        println!(
            "{}",
            json!({ "warmed": artifact.ledger.online, "ledger_records": artifact.ledger.records })
        );
        return Ok(ExitStatus::Passed);
    }

    let artifacts = ArtifactStore::new(config.artifact_dir.clone());
    let outcome = run_validation(&pipeline, &harness, &request, &corpus, config.mode, &artifacts).await;

    let summary = json!({
        "exit_code": outcome.status.code(),
        "query_id": outcome.artifact.as_ref().map(|a| a.query_id.clone()),
        "parity_ok": outcome.artifact.as_ref().map(|a| a.parity.parity_ok),
        "missing": outcome.artifact.as_ref().map(|a| a.parity.missing.clone()),
        "lexical_only": outcome.artifact.as_ref().map(|a| a.fusion.lexical_only.clone()),
        "hashes": outcome.hashes,
        "report": outcome.report_path.as_ref().map(|p| p.display().to_string()),
        "violation": outcome.violation,
        "failure": outcome.failure,
    });
    println!("{summary}");

    Ok(outcome.status)
}
