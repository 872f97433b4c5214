use std::process::ExitCode;

/// Exit codes of the validation entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatus {
    Passed,
    ParityFailed,
    DeterminismFailed,
    /// Bad configuration, including offline replay against a cold cache.
    ConfigError,
    RuntimeFailure,
}

impl ExitStatus {
    pub fn code(&self) -> u8 {
        match self {
            ExitStatus::Passed => 0,
            ExitStatus::ParityFailed => 1,
            ExitStatus::DeterminismFailed => 2,
            ExitStatus::ConfigError => 3,
            ExitStatus::RuntimeFailure => 4,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitStatus::Passed)
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}
