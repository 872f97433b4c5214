use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-run state machine. Stages are visited strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Init,
    FetchOrLoadCache,
    Retrieve,
    Fuse,
    ValidateParity,
    EmitArtifact,
    Done,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 7] = [
        PipelineStage::Init,
        PipelineStage::FetchOrLoadCache,
        PipelineStage::Retrieve,
        PipelineStage::Fuse,
        PipelineStage::ValidateParity,
        PipelineStage::EmitArtifact,
        PipelineStage::Done,
    ];

    /// `None` once [`PipelineStage::Done`] is reached.
    pub fn next(self) -> Option<Self> {
        match self {
            PipelineStage::Init => Some(PipelineStage::FetchOrLoadCache),
            PipelineStage::FetchOrLoadCache => Some(PipelineStage::Retrieve),
            PipelineStage::Retrieve => Some(PipelineStage::Fuse),
            PipelineStage::Fuse => Some(PipelineStage::ValidateParity),
            PipelineStage::ValidateParity => Some(PipelineStage::EmitArtifact),
            PipelineStage::EmitArtifact => Some(PipelineStage::Done),
            PipelineStage::Done => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Init => "INIT",
            PipelineStage::FetchOrLoadCache => "FETCH_OR_LOAD_CACHE",
            PipelineStage::Retrieve => "RETRIEVE",
            PipelineStage::Fuse => "FUSE",
            PipelineStage::ValidateParity => "VALIDATE_PARITY",
            PipelineStage::EmitArtifact => "EMIT_ARTIFACT",
            PipelineStage::Done => "DONE",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
