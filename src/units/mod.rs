//! Unit names and job modes
//!
//! Only the pieces of systemd's unit naming that matter for transient scopes:
//! recognising a unit's type from its suffix and rejecting names systemd
//! would refuse (or worse, interpret as a different unit type).

mod job;
mod name;

pub use job::{JobMode, ParseJobModeError};
pub use name::validate;

use std::fmt;

/// Unit types systemd knows about, identified by name suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitType {
    Service,
    Socket,
    Target,
    Device,
    Mount,
    Automount,
    Swap,
    Timer,
    Path,
    Slice,
    Scope,
}

impl UnitType {
    pub const ALL: [UnitType; 11] = [
        Self::Service,
        Self::Socket,
        Self::Target,
        Self::Device,
        Self::Mount,
        Self::Automount,
        Self::Swap,
        Self::Timer,
        Self::Path,
        Self::Slice,
        Self::Scope,
    ];

    /// Suffix without the leading dot, e.g. "scope"
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Socket => "socket",
            Self::Target => "target",
            Self::Device => "device",
            Self::Mount => "mount",
            Self::Automount => "automount",
            Self::Swap => "swap",
            Self::Timer => "timer",
            Self::Path => "path",
            Self::Slice => "slice",
            Self::Scope => "scope",
        }
    }

    /// Determine the unit type from a name like "foo.scope"
    pub fn from_name(name: &str) -> Option<Self> {
        let (_, suffix) = name.rsplit_once('.')?;
        Self::ALL.into_iter().find(|t| t.suffix() == suffix)
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}
