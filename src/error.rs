//! Error type shared by scope creation and delegation checks

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::dbus::BusError;
use crate::units::UnitType;

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("Invalid unit name {name:?}: {reason}")]
    InvalidUnitName { name: String, reason: &'static str },

    #[error("Wrong unit type for {name:?}: expected a .{} unit, got .{}", .expected.suffix(), .found.suffix())]
    WrongUnitType {
        name: String,
        expected: UnitType,
        found: UnitType,
    },

    #[error("Failed to fork sentinel process: {0}")]
    Fork(#[source] nix::Error),

    #[error("Failed to terminate sentinel {pid}: {source}")]
    Terminate {
        pid: i32,
        #[source]
        source: nix::Error,
    },

    #[error("Invalid PID: {0}")]
    InvalidPid(i32),

    #[error("Scope {scope} or slice {slice} already exists")]
    UnitExists { scope: String, slice: String },

    #[error("D-Bus request failed: {0}")]
    Bus(#[from] BusError),

    #[error("cgroup hierarchy is not mounted")]
    NotMounted,

    #[error("Unknown cgroup mount configuration")]
    UnknownMount,

    #[error("statfs on {path} failed: {source}")]
    StatfsFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read {attribute} on {path}: {source}")]
    Attribute {
        path: PathBuf,
        attribute: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read process name of PID {pid}: {source}")]
    ProcessName {
        pid: i32,
        #[source]
        source: io::Error,
    },

    #[error("PID {pid} is {comm:?}, not a sentinel")]
    NotSentinel { pid: i32, comm: String },

    #[error("Timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    #[error("Cancelled while waiting for {0}")]
    Cancelled(String),
}

pub type Result<T> = std::result::Result<T, ScopeError>;

fn neg_errno(err: &io::Error) -> i32 {
    -err.raw_os_error().unwrap_or(libc::EIO)
}

impl ScopeError {
    /// Negative errno-style code, one per failure category.
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidUnitName { .. } => -libc::EINVAL,
            Self::WrongUnitType { .. } => -libc::EMEDIUMTYPE,
            Self::Fork(e) => -(*e as i32),
            Self::Terminate { source, .. } => -(*source as i32),
            Self::InvalidPid(_) => -libc::EINVAL,
            Self::UnitExists { .. } => -libc::EEXIST,
            Self::Bus(e) => e.code(),
            Self::NotMounted => -libc::ENODEV,
            Self::UnknownMount => -libc::EOPNOTSUPP,
            Self::StatfsFailed { source, .. } => neg_errno(source),
            Self::Attribute { source, .. } => neg_errno(source),
            Self::ProcessName { source, .. } => neg_errno(source),
            Self::NotSentinel { .. } => -libc::EPERM,
            Self::Timeout { .. } => -libc::ETIMEDOUT,
            Self::Cancelled(_) => -libc::ECANCELED,
        }
    }

    /// Validation failures are detected before any process or bus side effect.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidUnitName { .. } | Self::WrongUnitType { .. })
    }
}
