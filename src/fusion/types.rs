use serde::{Deserialize, Serialize};

/// Which signals contributed to a fused score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Hybrid,
    /// No semantic score: the embedding was a cache miss in offline replay.
    LexicalOnly,
}

/// Raw per-candidate scores before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResult {
    pub id: String,
    pub lexical_score: f64,
    pub semantic_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedEntry {
    pub id: String,
    pub fused_score: f64,
    pub lexical_norm: f64,
    pub semantic_norm: Option<f64>,
    pub signal: Signal,
}

/// Ranked output, ordered by `(fused_score desc, id asc)`, at most `k` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    pub query: String,
    pub k: usize,
    pub entries: Vec<FusedEntry>,
    /// Every candidate that fell back to lexical-only scoring, sorted by id.
    pub lexical_only: Vec<String>,
    /// Number of candidates ranked before truncation.
    pub candidates: usize,
}

impl FusionResult {
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    pub fn is_degraded(&self) -> bool {
        !self.lexical_only.is_empty()
    }
}
