//! Job modes for StartTransientUnit
//!
//! See systemctl(1) `--job-mode`. The wire value is passed through verbatim.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// How systemd resolves conflicts with already queued jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobMode {
    #[default]
    Fail,
    Replace,
    Isolate,
    IgnoreDependencies,
    IgnoreRequirements,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job mode {0:?} (expected fail, replace, isolate, ignore-dependencies or ignore-requirements)")]
pub struct ParseJobModeError(pub String);

impl JobMode {
    pub const ALL: [JobMode; 5] = [
        Self::Fail,
        Self::Replace,
        Self::Isolate,
        Self::IgnoreDependencies,
        Self::IgnoreRequirements,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Replace => "replace",
            Self::Isolate => "isolate",
            Self::IgnoreDependencies => "ignore-dependencies",
            Self::IgnoreRequirements => "ignore-requirements",
        }
    }
}

impl FromStr for JobMode {
    type Err = ParseJobModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ParseJobModeError(s.to_string()))
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
