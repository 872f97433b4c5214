//! Weighted fusion of lexical and semantic scores into one total order.

pub mod config;
pub mod error;
pub mod normalize;
pub mod retriever;
pub mod types;


pub use config::FusionConfig;
pub use error::{FusionError, RetrieveResult};
pub use normalize::Normalization;
pub use retriever::{FusionRetriever, ScoredCandidates, SemanticScores, cosine_similarity};
pub use types::{FusedEntry, FusionResult, ScoredResult, Signal};
