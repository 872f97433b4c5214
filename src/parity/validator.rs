//! Evidence / retrieval parity: every cited id must be in the fused top-k.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use super::report::ParityReport;
use crate::determinism::Clock;
use crate::hashing::derive_query_id;

#[derive(Debug, Clone)]
pub struct ParityValidator {
    clock: Arc<dyn Clock>,
    run_id: String,
}

impl ParityValidator {
    pub fn new(clock: Arc<dyn Clock>, run_id: impl Into<String>) -> Self {
        Self {
            clock,
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Checks `evidence_ids ⊆ fused_top_k[..k]`, deriving the query id from the query text.
    pub fn check(&self, query: &str, evidence_ids: &[String], fused_top_k: &[String], k: usize) -> ParityReport {
        self.check_with_id(&derive_query_id(query), query, evidence_ids, fused_top_k, k)
    }

    /// Same as [`ParityValidator::check`] with a caller-supplied query id. Never fails.
    pub fn check_with_id(
        &self,
        query_id: &str,
        query: &str,
        evidence_ids: &[String],
        fused_top_k: &[String],
        k: usize,
    ) -> ParityReport {
        let top_k: Vec<String> = fused_top_k.iter().take(k).cloned().collect();
        let allowed: HashSet<&str> = top_k.iter().map(String::as_str).collect();

        let mut seen = HashSet::new();
        let missing: Vec<String> = evidence_ids
            .iter()
            .filter(|id| !allowed.contains(id.as_str()))
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();
        let parity_ok = missing.is_empty();

        if parity_ok {
            info!(query_id, evidence = evidence_ids.len(), k, "Parity check passed");
        } else {
            warn!(query_id, missing = ?missing, k, "Parity check failed");
        }

        ParityReport {
            query_id: query_id.to_string(),
            run_id: self.run_id.clone(),
            query: query.to_string(),
            k,
            fused_top_k: top_k,
            evidence_ids: evidence_ids.to_vec(),
            parity_ok,
            missing,
            checked_at: self.clock.timestamp(),
        }
    }
}
