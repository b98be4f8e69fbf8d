//! Runtime settings for a [`ScopeManager`](crate::scope::ScopeManager)

use std::path::PathBuf;
use std::time::Duration;

use crate::cgroups::CGROUP_ROOT;
use crate::dbus::BusKind;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Which manager to talk to: the system instance or the user's
    pub bus: BusKind,
    pub cgroup_root: PathBuf,
    pub proc_root: PathBuf,
    /// Polling for cgroup lookups and scope attach/removal
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus: BusKind::System,
            cgroup_root: PathBuf::from(CGROUP_ROOT),
            proc_root: PathBuf::from("/proc"),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Apply a timeout given in whole seconds; 0 waits forever
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        let timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self.retry = self.retry.with_timeout(timeout);
        self
    }
}
