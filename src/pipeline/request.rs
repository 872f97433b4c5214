use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{PipelineError, PipelineResult};
use crate::hashing::derive_query_id;

/// One query plus the evidence a downstream selector cited for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Derived from the query text when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    pub query: String,
    #[serde(default)]
    pub evidence_ids: Vec<String>,
}

impl PipelineRequest {
    pub fn new(query: &str, evidence_ids: &[&str]) -> Self {
        Self {
            query_id: None,
            query: query.to_string(),
            evidence_ids: evidence_ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_query_id(mut self, query_id: &str) -> Self {
        self.query_id = Some(query_id.to_string());
        self
    }

    pub fn query_id(&self) -> String {
        self.query_id
            .clone()
            .unwrap_or_else(|| derive_query_id(&self.query))
    }

    pub fn from_json_file(path: &Path) -> PipelineResult<Self> {
        let bytes = fs::read(path).map_err(|e| PipelineError::Request {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| PipelineError::Request {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
