//! Call-counting provider for tests (optionally slow or failing).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::error::{EmbeddingError, EmbeddingResult};
use super::provider::EmbeddingProvider;
use super::stub::StubEmbeddingProvider;

#[derive(Debug, Default)]
pub struct MockEmbeddingProvider {
    inner: StubEmbeddingProvider,
    calls: AtomicUsize,
    delay: Option<Duration>,
    failing: AtomicBool,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dim(dim: usize) -> Self {
        Self {
            inner: StubEmbeddingProvider::new(dim),
            ..Self::default()
        }
    }

    /// Sleeps for `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    /// Number of `embed` calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, model_id: &str, text: &str) -> EmbeddingResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::Acquire) {
            return Err(EmbeddingError::Unavailable {
                reason: "mock provider set to fail".to_string(),
            });
        }
        self.inner.embed_sync(model_id, text)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
