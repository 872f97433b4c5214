//! Injected time sources.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

/// Time source read for every persisted timestamp.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;

    /// RFC 3339 with millisecond precision and a `Z` suffix.
    fn timestamp(&self) -> String {
        format_timestamp(self.now())
    }
}

pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    instant: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }

    /// Parses an RFC 3339 timestamp; offsets are converted to UTC.
    pub fn parse(value: &str) -> Result<Self, chrono::ParseError> {
        let instant = DateTime::parse_from_rfc3339(value.trim())?.with_timezone(&Utc);
        Ok(Self::new(instant))
    }

    /// Freezes the current wall-clock time.
    pub fn frozen_now() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }
}
