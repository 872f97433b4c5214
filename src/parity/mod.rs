//! Parity verdicts and their write-once artifact store.

pub mod error;
pub mod report;
pub mod store;
pub mod validator;

#[cfg(test)]
mod tests;

pub use error::{ArtifactError, ArtifactResult};
pub use report::ParityReport;
pub use store::{ArtifactStore, PersistOutcome};
pub use validator::ParityValidator;
