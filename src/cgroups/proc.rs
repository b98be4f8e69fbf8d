//! cgroup membership of a process, from /proc/<pid>/cgroup

use std::fs;
use std::io;
use std::path::PathBuf;

use nix::unistd::Pid;

use crate::error::{Result, ScopeError};
use crate::retry::{CancelToken, RetryPolicy};

/// Pick systemd's entry out of /proc/<pid>/cgroup.
///
/// Lines look like `hierarchy-id:controllers:path`. On legacy and hybrid
/// hosts systemd tracks units in the `name=systemd` hierarchy; on unified
/// hosts only the `0::` line exists.
pub fn parse_proc_cgroup(content: &str) -> Option<&str> {
    let mut unified = None;
    for line in content.lines() {
        let mut fields = line.splitn(3, ':');
        let (Some(id), Some(controllers), Some(path)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        if controllers.split(',').any(|c| c == "name=systemd") {
            return Some(path);
        }
        if id == "0" && controllers.is_empty() {
            unified = Some(path);
        }
    }
    unified
}

/// Reads cgroup membership from a procfs mount
#[derive(Debug, Clone)]
pub struct ProcCgroups {
    proc_root: PathBuf,
}

impl Default for ProcCgroups {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcCgroups {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    /// Current cgroup path of `pid` within systemd's hierarchy.
    ///
    /// A process without a proc entry is `ESRCH`; a cgroup file lacking
    /// systemd's hierarchy is `ENODATA`.
    pub fn lookup(&self, pid: Pid) -> io::Result<String> {
        let path = self.proc_root.join(pid.as_raw().to_string()).join("cgroup");
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(io::Error::from_raw_os_error(libc::ESRCH))
            }
            Err(e) => return Err(e),
        };
        parse_proc_cgroup(&content)
            .map(str::to_string)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENODATA))
    }

    /// Look up `pid`, retrying until the lookup succeeds.
    ///
    /// "No such process" is expected while systemd is still attaching the
    /// PID and is retried quietly. Other failures are logged on every
    /// attempt and retried as well.
    pub fn wait_for(&self, pid: Pid, policy: &RetryPolicy, cancel: &CancelToken) -> Result<String> {
        let mut backoff = policy.start(format!("cgroup of PID {}", pid), cancel);
        loop {
            match self.lookup(pid) {
                Ok(path) => return Ok(path),
                Err(e) if e.raw_os_error() == Some(libc::ESRCH) => {}
                Err(e) => {
                    log::error!("cgroup lookup for PID {} failed: {}", pid, e);
                }
            }
            backoff.wait()?;
        }
    }

    /// Process name of `pid` as the kernel reports it in `comm`
    pub fn comm(&self, pid: Pid) -> Result<String> {
        let path = self.proc_root.join(pid.as_raw().to_string()).join("comm");
        match fs::read_to_string(&path) {
            Ok(comm) => Ok(comm.trim_end_matches('\n').to_string()),
            Err(e) => {
                let source = if e.kind() == io::ErrorKind::NotFound {
                    io::Error::from_raw_os_error(libc::ESRCH)
                } else {
                    e
                };
                Err(ScopeError::ProcessName {
                    pid: pid.as_raw(),
                    source,
                })
            }
        }
    }
}
