//! One deterministic pass: cache check, retrieval, fusion, parity, artifact.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::error::PipelineResult;
use super::request::PipelineRequest;
use super::stage::PipelineStage;
use crate::cache::{CacheStore, EmbeddingCache, LedgerAudit, Mode, RunRecords};
use crate::corpus::Corpus;
use crate::determinism::RunContext;
use crate::embedding::EmbeddingProvider;
use crate::fusion::{FusionResult, FusionRetriever};
use crate::parity::{ParityReport, ParityValidator};

/// Everything a run produced. Two runs over the same inputs serialize identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub query_id: String,
    pub mode: Mode,
    pub fusion: FusionResult,
    pub parity: ParityReport,
    /// Ledger records written by this run's own lookups.
    pub ledger: LedgerAudit,
    pub stages: Vec<PipelineStage>,
}

impl PipelineArtifact {
    /// Compact JSON in field declaration order.
    pub fn canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

struct StageLog {
    current: PipelineStage,
    visited: Vec<PipelineStage>,
}

impl StageLog {
    fn new() -> Self {
        Self {
            current: PipelineStage::Init,
            visited: vec![PipelineStage::Init],
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.current.next() {
            debug!(from = %self.current, to = %next, "Stage transition");
            self.current = next;
            self.visited.push(next);
        }
    }
}

pub struct Pipeline<P: EmbeddingProvider, S: CacheStore> {
    retriever: FusionRetriever<P, S>,
}

impl<P: EmbeddingProvider, S: CacheStore> std::fmt::Debug for Pipeline<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("retriever", &self.retriever)
            .finish()
    }
}

impl<P: EmbeddingProvider, S: CacheStore> Pipeline<P, S> {
    pub fn new(retriever: FusionRetriever<P, S>) -> Self {
        Self { retriever }
    }

    pub fn retriever(&self) -> &FusionRetriever<P, S> {
        &self.retriever
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache<P, S>> {
        self.retriever.cache()
    }

    /// Runs every stage once. Any failure ends the run at the failing stage.
    ///
    /// Offline replay requires the query and every chunk to be cached before
    /// retrieval starts.
    #[instrument(skip_all, fields(run_index = ctx.run_index, mode = %mode))]
    pub async fn run(
        &self,
        request: &PipelineRequest,
        corpus: &Corpus,
        mode: Mode,
        ctx: RunContext,
    ) -> PipelineResult<PipelineArtifact> {
        let cache = self.cache();
        let config = self.retriever.config();
        let query_id = request.query_id();
        let mut stages = StageLog::new();
        let run_records = RunRecords::new();

        stages.advance();
        if mode.is_offline() {
            cache.ensure_warm(
                &config.model_id,
                std::iter::once(request.query.as_str()).chain(corpus.texts()),
            )?;
            debug!(query_id = %query_id, chunks = corpus.len(), "Required embeddings present");
        }

        stages.advance();
        let candidates = run_records
            .scope(self.retriever.score(&request.query, corpus, mode))
            .await?;

        stages.advance();
        let fusion = self.retriever.rank(&request.query, candidates);

        stages.advance();
        let validator = ParityValidator::new(Arc::clone(&ctx.clock), ctx.random.run_id());
        let parity = validator.check_with_id(
            &query_id,
            &request.query,
            &request.evidence_ids,
            &fusion.ids(),
            fusion.k,
        );

        stages.advance();
        let produced = run_records.records();
        let ledger = match mode {
            Mode::OfflineReplay => LedgerAudit::ensure_replay_clean(&produced)?,
            Mode::Online => LedgerAudit::from_records(&produced),
        };

        stages.advance();
        info!(
            query_id = %query_id,
            parity_ok = parity.parity_ok,
            returned = fusion.entries.len(),
            ledger_records = ledger.records,
            "Pipeline run complete"
        );

        Ok(PipelineArtifact {
            query_id,
            mode,
            fusion,
            parity,
            ledger,
            stages: stages.visited,
        })
    }
}
