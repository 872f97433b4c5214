use serde::{Deserialize, Serialize};

/// Verdict of one parity check. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParityReport {
    pub query_id: String,
    pub run_id: String,
    pub query: String,
    pub k: usize,
    /// The first `k` fused ids the evidence was checked against.
    pub fused_top_k: Vec<String>,
    pub evidence_ids: Vec<String>,
    pub parity_ok: bool,
    /// Evidence ids outside `fused_top_k`, first occurrence order, deduplicated.
    pub missing: Vec<String>,
    pub checked_at: String,
}

impl ParityReport {
    /// Pretty JSON with a trailing newline; stable for a given report.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}
