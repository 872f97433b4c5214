//! Embedding providers.
//!
//! - [`EmbeddingProvider`] is the capability the cache calls on an online miss.
//! - [`HttpEmbeddingProvider`] talks to an OpenAI-compatible endpoint.
//! - [`StubEmbeddingProvider`] is deterministic and needs no network.

mod error;
/// OpenAI-compatible HTTP provider.
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod provider;
/// Deterministic hashing embedder.
pub mod stub;


pub use error::{EmbeddingError, EmbeddingResult};
pub use http::HttpEmbeddingProvider;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockEmbeddingProvider;
pub use provider::EmbeddingProvider;
pub use stub::StubEmbeddingProvider;
