//! Lexical + semantic fusion over the corpus.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};

use super::config::FusionConfig;
use super::error::{FusionError, RetrieveResult};
use super::types::{FusedEntry, FusionResult, ScoredResult, Signal};
use crate::cache::{CacheError, CacheStore, EmbeddingCache, Mode};
use crate::corpus::Corpus;
use crate::embedding::EmbeddingProvider;
use crate::lexical::LexicalIndex;

/// Semantic scores for the candidates that had an embedding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemanticScores {
    pub scores: BTreeMap<String, f64>,
    /// Candidates whose embedding (or the query's) missed in offline replay.
    pub lexical_only: Vec<String>,
}

/// Output of [`FusionRetriever::score`], input of [`FusionRetriever::rank`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoredCandidates {
    pub scored: Vec<ScoredResult>,
    /// Sorted ids of candidates without a semantic score.
    pub lexical_only: Vec<String>,
}

/// Cosine similarity accumulated in `f64`; `0.0` if either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

pub struct FusionRetriever<P: EmbeddingProvider, S: CacheStore> {
    cache: Arc<EmbeddingCache<P, S>>,
    index: LexicalIndex,
    config: FusionConfig,
}

impl<P: EmbeddingProvider, S: CacheStore> std::fmt::Debug for FusionRetriever<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionRetriever")
            .field("index", &self.index)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<P: EmbeddingProvider, S: CacheStore> FusionRetriever<P, S> {
    pub fn new(cache: Arc<EmbeddingCache<P, S>>, config: FusionConfig) -> RetrieveResult<Self> {
        Self::with_index(cache, LexicalIndex::new(), config)
    }

    pub fn with_index(
        cache: Arc<EmbeddingCache<P, S>>,
        index: LexicalIndex,
        config: FusionConfig,
    ) -> RetrieveResult<Self> {
        config.validate()?;
        Ok(Self {
            cache,
            index,
            config,
        })
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache<P, S>> {
        &self.cache
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn score_lexical(&self, query: &str, corpus: &Corpus) -> BTreeMap<String, f64> {
        self.index.score(query, corpus)
    }

    /// Looks up the query and every candidate embedding concurrently.
    ///
    /// Offline misses become lexical-only unless `require_complete_cache` is set.
    /// Every other failure aborts.
    pub async fn semantic_scores(
        &self,
        query: &str,
        corpus: &Corpus,
        mode: Mode,
    ) -> RetrieveResult<SemanticScores> {
        let model_id = self.config.model_id.as_str();

        let query_vector = match self.cache.get_or_fetch(model_id, query, mode).await {
            Ok(vector) => vector,
            Err(e) => {
                self.tolerate_miss(e)?;
                warn!(candidates = corpus.len(), "Query embedding missing, all candidates lexical-only");
                return Ok(SemanticScores {
                    scores: BTreeMap::new(),
                    lexical_only: corpus.ids().map(str::to_string).collect(),
                });
            }
        };

        let lookups = corpus
            .iter()
            .map(|(_, chunk)| self.cache.get_or_fetch(model_id, &chunk.text, mode));
        let results = join_all(lookups).await;

        let mut semantic = SemanticScores::default();
        for ((id, _), result) in corpus.iter().zip(results) {
            match result {
                Ok(vector) => {
                    if vector.len() != query_vector.len() {
                        return Err(FusionError::DimensionMismatch {
                            id: id.to_string(),
                            expected: query_vector.len(),
                            actual: vector.len(),
                        });
                    }
                    semantic
                        .scores
                        .insert(id.to_string(), cosine_similarity(&query_vector, &vector));
                }
                Err(e) => {
                    self.tolerate_miss(e)?;
                    warn!(id, "Candidate embedding missing, scoring lexical-only");
                    semantic.lexical_only.push(id.to_string());
                }
            }
        }
        Ok(semantic)
    }

    /// Normalizes, weights, orders by `(fused desc, id asc)` and truncates to `top_k`.
    pub fn fuse(&self, scored: &[ScoredResult]) -> Vec<FusedEntry> {
        let alpha = self.config.alpha;
        let normalization = self.config.normalization;

        let lexical: BTreeMap<String, f64> = scored
            .iter()
            .map(|s| (s.id.clone(), s.lexical_score))
            .collect();
        let semantic: BTreeMap<String, f64> = scored
            .iter()
            .filter_map(|s| s.semantic_score.map(|v| (s.id.clone(), v)))
            .collect();
        let lexical = normalization.apply(&lexical);
        let semantic = normalization.apply(&semantic);

        let mut entries: Vec<FusedEntry> = scored
            .iter()
            .map(|s| {
                let lexical_norm = lexical.get(&s.id).copied().unwrap_or(0.0);
                let semantic_norm = semantic.get(&s.id).copied();
                let (fused_score, signal) = match semantic_norm {
                    Some(sem) => (alpha * lexical_norm + (1.0 - alpha) * sem, Signal::Hybrid),
                    None => (alpha * lexical_norm, Signal::LexicalOnly),
                };
                FusedEntry {
                    id: s.id.clone(),
                    fused_score,
                    lexical_norm,
                    semantic_norm,
                    signal,
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            b.fused_score
                .total_cmp(&a.fused_score)
                .then_with(|| a.id.cmp(&b.id))
        });
        entries.truncate(self.config.top_k);
        entries
    }

    /// Raw lexical and semantic scores for every candidate, in id order.
    pub async fn score(&self, query: &str, corpus: &Corpus, mode: Mode) -> RetrieveResult<ScoredCandidates> {
        let lexical = self.score_lexical(query, corpus);
        let semantic = self.semantic_scores(query, corpus, mode).await?;

        let scored = lexical
            .iter()
            .map(|(id, &lexical_score)| ScoredResult {
                id: id.clone(),
                lexical_score,
                semantic_score: semantic.scores.get(id).copied(),
            })
            .collect();

        let mut lexical_only = semantic.lexical_only;
        lexical_only.sort();
        Ok(ScoredCandidates {
            scored,
            lexical_only,
        })
    }

    /// Fuses scored candidates into the final ranked result.
    pub fn rank(&self, query: &str, candidates: ScoredCandidates) -> FusionResult {
        let entries = self.fuse(&candidates.scored);

        debug!(
            returned = entries.len(),
            lexical_only = candidates.lexical_only.len(),
            "Fusion complete"
        );
        if !candidates.lexical_only.is_empty() {
            info!(
                lexical_only = candidates.lexical_only.len(),
                "Fusion degraded to lexical-only for some candidates"
            );
        }

        FusionResult {
            query: query.to_string(),
            k: self.config.top_k,
            entries,
            lexical_only: candidates.lexical_only,
            candidates: candidates.scored.len(),
        }
    }

    #[instrument(skip(self, query, corpus), fields(candidates = corpus.len(), k = self.config.top_k))]
    pub async fn retrieve(&self, query: &str, corpus: &Corpus, mode: Mode) -> RetrieveResult<FusionResult> {
        let candidates = self.score(query, corpus, mode).await?;
        Ok(self.rank(query, candidates))
    }

    fn tolerate_miss(&self, err: CacheError) -> RetrieveResult<()> {
        if err.is_cache_miss() && !self.config.require_complete_cache {
            Ok(())
        } else {
            Err(err.into())
        }
    }
}
