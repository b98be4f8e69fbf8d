//! Scope creation and delegation queries
//!
//! A [`ScopeManager`] creates transient scopes by asking systemd to wrap a
//! freshly forked [`Sentinel`], and answers whether a cgroup was delegated.
//! Scopes don't have unit files; they only live as long as their sentinel.

use std::path::{Path, PathBuf};

use nix::unistd::Pid;

use crate::cgroups::{
    join_cgroup, DelegationChecker, DelegationStatus, HierarchyResolver, HierarchyRoot, ProcCgroups,
};
use crate::config::Config;
use crate::dbus::{request_transient_scope, UnitBus};
use crate::error::{Result, ScopeError};
use crate::retry::{CancelToken, RetryPolicy};
use crate::sentinel::{terminate_pid, Sentinel, SENTINEL_NAME};
use crate::units::{self, JobMode, UnitType};

/// Slice used when the caller does not name one
pub const DEFAULT_SLICE: &str = "user.slice";

/// What to create: a scope, its parent slice and how to start it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRequest {
    pub scope_name: String,
    pub slice_name: String,
    pub delegated: bool,
    pub mode: JobMode,
}

impl ScopeRequest {
    pub fn new(scope_name: impl Into<String>, slice_name: impl Into<String>) -> Self {
        Self {
            scope_name: scope_name.into(),
            slice_name: slice_name.into(),
            delegated: false,
            mode: JobMode::default(),
        }
    }

    pub fn delegated(mut self, delegated: bool) -> Self {
        self.delegated = delegated;
        self
    }

    pub fn mode(mut self, mode: JobMode) -> Self {
        self.mode = mode;
        self
    }

    /// Check both names; the scope first
    pub fn validate(&self) -> Result<()> {
        units::validate(&self.scope_name, UnitType::Scope)?;
        units::validate(&self.slice_name, UnitType::Slice)
    }
}

/// Creates scopes through `B` and answers delegation queries.
///
/// Queries never touch the bus, so `ScopeManager<()>` is enough for them.
pub struct ScopeManager<B> {
    bus: B,
    resolver: HierarchyResolver,
    checker: DelegationChecker,
    proc: ProcCgroups,
    retry: RetryPolicy,
    cancel: CancelToken,
}

impl<B> ScopeManager<B> {
    pub fn new(bus: B) -> Self {
        Self::with_config(bus, &Config::default())
    }

    pub fn with_config(bus: B, config: &Config) -> Self {
        Self {
            bus,
            resolver: HierarchyResolver::new(&config.cgroup_root),
            checker: DelegationChecker::default(),
            proc: ProcCgroups::new(&config.proc_root),
            retry: config.retry.clone(),
            cancel: CancelToken::new(),
        }
    }

    pub fn set_resolver(&mut self, resolver: HierarchyResolver) {
        self.resolver = resolver;
    }

    pub fn set_checker(&mut self, checker: DelegationChecker) {
        self.checker = checker;
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Token that aborts any wait in progress on this manager
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn resolve_root(&self) -> Result<HierarchyRoot> {
        self.resolver.resolve_root()
    }

    /// Absolute cgroup directory of `pid`, waiting while it has none yet
    pub fn path_for_pid(&self, pid: Pid) -> Result<PathBuf> {
        let root = self.resolver.resolve_root()?;
        let cgroup = self.proc.wait_for(pid, &self.retry, &self.cancel)?;
        Ok(join_cgroup(&root.path, &cgroup))
    }

    pub fn is_delegated(&self, path: &Path) -> Result<DelegationStatus> {
        self.checker.is_delegated(path)
    }

    /// Delegation state of the cgroup `pid` is in right now.
    ///
    /// A sentinel fresh from [`create`](Self::create) still sits in its
    /// parent's cgroup until systemd moves it, so this would report on the
    /// parent. Use [`delegation_of`](Self::delegation_of) or
    /// [`wait_until_attached`](Self::wait_until_attached) for a scope that
    /// was just created.
    pub fn is_delegated_by_pid(&self, pid: Pid) -> Result<DelegationStatus> {
        let path = self.path_for_pid(pid)?;
        self.checker.is_delegated(&path)
    }

    /// Wait until systemd has moved `sentinel` into its scope and the
    /// scope's cgroup directory exists.
    ///
    /// Right after creation the sentinel still sits in its parent's cgroup,
    /// so the path is only accepted once it names the scope.
    pub fn wait_until_attached(&self, sentinel: &Sentinel) -> Result<PathBuf> {
        let root = self.resolver.resolve_root()?;
        let suffix = format!("/{}", sentinel.scope_name());
        let mut backoff = self
            .retry
            .start(format!("{} to appear", sentinel.scope_name()), &self.cancel);
        loop {
            match self.proc.lookup(sentinel.pid()) {
                Ok(cgroup) if cgroup.ends_with(&suffix) => {
                    let path = join_cgroup(&root.path, &cgroup);
                    if path.is_dir() {
                        return Ok(path);
                    }
                }
                Ok(cgroup) => {
                    log::debug!("Sentinel {} still in {}", sentinel.pid(), cgroup);
                }
                Err(e) if e.raw_os_error() == Some(libc::ESRCH) => {}
                Err(e) => {
                    log::error!("cgroup lookup for PID {} failed: {}", sentinel.pid(), e);
                }
            }
            backoff.wait()?;
        }
    }

    /// Wait until a scope's cgroup directory is gone
    pub fn wait_until_removed(&self, path: &Path) -> Result<()> {
        let mut backoff = self
            .retry
            .start(format!("{} to be removed", path.display()), &self.cancel);
        while path.exists() {
            backoff.wait()?;
        }
        Ok(())
    }

    /// Fail with `NotSentinel` unless `pid` is named `sysd-sentinel`
    pub fn check_sentinel(&self, pid: Pid) -> Result<()> {
        let comm = self.proc.comm(pid)?;
        if comm != SENTINEL_NAME {
            return Err(ScopeError::NotSentinel {
                pid: pid.as_raw(),
                comm,
            });
        }
        Ok(())
    }

    /// Kill the sentinel `pid`, e.g. one detached by an earlier invocation.
    ///
    /// Any other process is left alone.
    pub fn stop_sentinel(&self, pid: Pid) -> Result<()> {
        if let Err(e) = self.check_sentinel(pid) {
            log::error!("Refusing to kill PID {}: {}", pid, e);
            return Err(e);
        }
        terminate_pid(pid)
    }

    /// Delegation state of the scope a sentinel was created for
    pub fn delegation_of(&self, sentinel: &Sentinel) -> Result<DelegationStatus> {
        let path = self.wait_until_attached(sentinel)?;
        self.checker.is_delegated(&path)
    }
}

impl<B: UnitBus> ScopeManager<B> {
    /// Create a scope holding a new sentinel.
    ///
    /// Names are validated before anything is forked or sent. If systemd
    /// rejects the request the sentinel is killed before returning.
    pub fn create(&self, request: &ScopeRequest) -> Result<Sentinel> {
        request.validate()?;

        let sentinel = Sentinel::spawn(&request.scope_name, &request.slice_name)?;
        match request_transient_scope(&self.bus, sentinel.pid(), request) {
            Ok(job) => {
                log::info!(
                    "Created scope {} in {} (sentinel {}, job {})",
                    request.scope_name,
                    request.slice_name,
                    sentinel.pid(),
                    job.as_str()
                );
                Ok(sentinel)
            }
            Err(e) => {
                let pid = sentinel.pid();
                if let Err(kill_err) = sentinel.terminate() {
                    log::warn!("Failed to kill sentinel {}: {}", pid, kill_err);
                }
                Err(e)
            }
        }
    }

    pub fn create_scope_and_slice(
        &self,
        scope_name: &str,
        slice_name: &str,
        delegated: bool,
        mode: JobMode,
    ) -> Result<Sentinel> {
        self.create(
            &ScopeRequest::new(scope_name, slice_name)
                .delegated(delegated)
                .mode(mode),
        )
    }

    /// Like [`create_scope_and_slice`](Self::create_scope_and_slice) in `user.slice`
    pub fn create_scope_in_default_slice(
        &self,
        scope_name: &str,
        delegated: bool,
        mode: JobMode,
    ) -> Result<Sentinel> {
        self.create_scope_and_slice(scope_name, DEFAULT_SLICE, delegated, mode)
    }
}
