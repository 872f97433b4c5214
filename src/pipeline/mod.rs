//! Stage runner and validation entry point.

pub mod error;
pub mod exit;
pub mod request;
pub mod runner;
pub mod stage;
pub mod validation;


pub use error::{PipelineError, PipelineResult};
pub use exit::ExitStatus;
pub use request::PipelineRequest;
pub use runner::{Pipeline, PipelineArtifact};
pub use stage::PipelineStage;
pub use validation::{ValidationOutcome, run_validation};
