//! Test fixtures for integration tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anchor::cache::{EmbeddingCache, FsCacheStore};
use anchor::corpus::{Chunk, Corpus};
use anchor::determinism::{DeterminismHarness, FixedClock};
use anchor::embedding::MockEmbeddingProvider;
use anchor::fusion::{FusionConfig, FusionRetriever};
use anchor::parity::ArtifactStore;
use anchor::pipeline::{Pipeline, PipelineRequest};
use tempfile::TempDir;

pub const FIXED_TIME: &str = "2024-01-01T00:00:00Z";

pub const SEED: u64 = 42;

pub const MODEL_ID: &str = "test-model";

pub const EMBEDDING_DIM: usize = 64;

pub const QUERY: &str = "climate risk";

pub type FsPipeline = Pipeline<Arc<MockEmbeddingProvider>, FsCacheStore>;

pub fn sample_chunks() -> Vec<Chunk> {
    vec![
        Chunk::new("d1", "c1", 3, "The board oversees climate risk and its disclosure."),
        Chunk::new("d2", "c1", 7, "Scope 1 and scope 2 emissions fell by twelve percent."),
        Chunk::new("d3", "c1", 9, "Physical climate risk scenarios cover flooding and heat."),
        Chunk::new("d4", "c1", 11, "Executive remuneration is reviewed annually."),
        Chunk::new("d5", "c1", 14, "Transition risk arises from carbon pricing."),
        Chunk::new("d6", "c1", 18, "Water use is tracked at every site."),
    ]
}

pub fn sample_corpus() -> Corpus {
    Corpus::new(sample_chunks()).expect("sample corpus")
}

pub fn request(evidence: &[&str]) -> PipelineRequest {
    PipelineRequest::new(QUERY, evidence)
}

pub fn harness(runs: usize) -> DeterminismHarness {
    let clock = FixedClock::parse(FIXED_TIME).expect("fixed time");
    DeterminismHarness::new(Arc::new(clock), SEED, runs)
}

/// Filesystem-backed cache and artifact store under one temp dir.
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.dir.path().join("artifacts")
    }

    pub fn artifacts(&self) -> ArtifactStore {
        ArtifactStore::new(self.artifact_dir())
    }

    pub fn store(&self) -> FsCacheStore {
        FsCacheStore::new(self.cache_dir())
    }

    /// A fresh pipeline over the shared cache dir, as a new process would build it.
    pub fn pipeline(&self, provider: Arc<MockEmbeddingProvider>) -> FsPipeline {
        self.pipeline_with(provider, FusionConfig::default())
    }

    pub fn pipeline_with(&self, provider: Arc<MockEmbeddingProvider>, config: FusionConfig) -> FsPipeline {
        let clock = FixedClock::parse(FIXED_TIME).expect("fixed time");
        let cache = Arc::new(EmbeddingCache::new(provider, self.store(), Arc::new(clock)));
        let config = FusionConfig {
            model_id: MODEL_ID.to_string(),
            ..config
        };
        Pipeline::new(FusionRetriever::new(cache, config).expect("retriever"))
    }
}

pub fn provider() -> Arc<MockEmbeddingProvider> {
    Arc::new(MockEmbeddingProvider::with_dim(EMBEDDING_DIM))
}

pub fn ledger_path(root: &Path) -> PathBuf {
    root.join("ledger.jsonl")
}
