//! Sentinel processes
//!
//! systemd garbage-collects a scope as soon as its cgroup is empty. A scope is
//! created with a sentinel as its only member: a forked child that does
//! nothing but sleep until it is killed. Whoever holds the [`Sentinel`] owns
//! the scope's lifetime.

use std::fmt;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::{fork, ForkResult, Pid};

use crate::error::{Result, ScopeError};

/// Process name shown in ps/top and /proc/<pid>/comm for sentinels
pub const SENTINEL_NAME: &str = "sysd-sentinel";

const SENTINEL_COMM: &[u8] = b"sysd-sentinel\0";

/// Highest signal number on Linux (SIGRTMAX)
const MAX_SIGNAL: libc::c_int = 64;

/// Body of the forked child. Only async-signal-safe calls from here on.
fn sentinel_main() -> ! {
    unsafe {
        // Handlers installed by the parent (e.g. tokio's) must not outlive
        // the fork: SIGTERM from systemd has to end the sentinel.
        for sig in 1..=MAX_SIGNAL {
            if sig != libc::SIGKILL && sig != libc::SIGSTOP {
                libc::signal(sig, libc::SIG_DFL);
            }
        }
        let mut empty: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut empty);
        libc::sigprocmask(libc::SIG_SETMASK, &empty, std::ptr::null_mut());

        // Drop the parent's stdio and descriptors so the sentinel does not
        // keep pipes or the bus socket open.
        let null = libc::open(b"/dev/null\0".as_ptr() as *const libc::c_char, libc::O_RDWR);
        if null >= 0 {
            libc::dup2(null, 0);
            libc::dup2(null, 1);
            libc::dup2(null, 2);
        }
        libc::syscall(libc::SYS_close_range, 3u32, u32::MAX, 0u32);

        // Renamed last: a sentinel that shows its name is fully set up
        libc::prctl(libc::PR_SET_NAME, SENTINEL_COMM.as_ptr() as libc::c_ulong, 0, 0, 0);
    }
    loop {
        nix::unistd::sleep(10_000);
    }
}

/// A sleeping child process that keeps a scope populated.
///
/// Dropping a sentinel kills it. Use [`Sentinel::detach`] to leave it
/// running, e.g. when the scope must outlive this process.
pub struct Sentinel {
    pid: Pid,
    scope_name: String,
    slice_name: String,
    armed: bool,
}

impl Sentinel {
    /// Fork a sentinel for the scope `scope_name` in `slice_name`.
    ///
    /// The child never returns into the caller's code.
    pub fn spawn(scope_name: &str, slice_name: &str) -> Result<Self> {
        // SAFETY: the child only runs sentinel_main, which sticks to
        // async-signal-safe syscalls.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => sentinel_main(),
            Ok(ForkResult::Parent { child }) => {
                log::debug!("Spawned sentinel {} for {}", child, scope_name);
                Ok(Self {
                    pid: child,
                    scope_name: scope_name.to_string(),
                    slice_name: slice_name.to_string(),
                    armed: true,
                })
            }
            Err(e) => {
                log::error!("fork() failed: {}", e);
                Err(ScopeError::Fork(e))
            }
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn scope_name(&self) -> &str {
        &self.scope_name
    }

    pub fn slice_name(&self) -> &str {
        &self.slice_name
    }

    /// Kill the sentinel and reap it. The scope disappears once systemd
    /// notices its cgroup is empty.
    pub fn terminate(mut self) -> Result<()> {
        self.armed = false;
        kill_and_reap(self.pid)
    }

    /// Give up ownership and leave the sentinel running
    pub fn detach(mut self) -> Pid {
        self.armed = false;
        log::debug!("Detached sentinel {} for {}", self.pid, self.scope_name);
        self.pid
    }
}

impl fmt::Debug for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sentinel")
            .field("pid", &self.pid)
            .field("scope", &self.scope_name)
            .field("slice", &self.slice_name)
            .finish()
    }
}

impl Drop for Sentinel {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = kill_and_reap(self.pid) {
                log::warn!("Failed to kill sentinel {}: {}", self.pid, e);
            }
        }
    }
}

fn kill_and_reap(pid: Pid) -> Result<()> {
    terminate_pid(pid)?;
    match waitpid(pid, None) {
        Ok(_) | Err(Errno::ECHILD) => Ok(()),
        Err(source) => Err(ScopeError::Terminate {
            pid: pid.as_raw(),
            source,
        }),
    }
}

/// Kill a sentinel by PID, e.g. one detached by an earlier invocation.
///
/// A process that is already gone counts as terminated.
pub fn terminate_pid(pid: Pid) -> Result<()> {
    if pid.as_raw() <= 0 {
        return Err(ScopeError::InvalidPid(pid.as_raw()));
    }
    match kill(pid, Signal::SIGKILL) {
        Ok(()) => {
            log::debug!("Killed sentinel {}", pid);
            Ok(())
        }
        Err(Errno::ESRCH) => Ok(()),
        Err(source) => Err(ScopeError::Terminate {
            pid: pid.as_raw(),
            source,
        }),
    }
}
