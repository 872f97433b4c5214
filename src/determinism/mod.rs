//! Fixed time, seeded randomness and the repeated-run comparator.

pub mod clock;
pub mod error;
pub mod harness;
pub mod random;

#[cfg(test)]
mod tests;

pub use clock::{Clock, FixedClock, SystemClock, format_timestamp};
pub use error::{DeterminismViolation, HarnessError, HarnessResult, RunMismatch};
pub use harness::{DeterminismHarness, HarnessRun, RunContext, RunTrace, assert_identical, run_n_times};
pub use random::SeededRandom;
