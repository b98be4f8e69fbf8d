//! org.freedesktop.systemd1.Manager.StartTransientUnit for scopes
//!
//! Builds the property array for a scope that holds a single PID and
//! translates the manager's reply into [`ScopeError`]s.

use nix::unistd::Pid;
use zbus::zvariant::{OwnedObjectPath, Value};

use super::UnitBus;
use crate::error::{Result, ScopeError};
use crate::scope::ScopeRequest;

pub const SYSTEMD_DESTINATION: &str = "org.freedesktop.systemd1";
pub const SYSTEMD_OBJECT_PATH: &str = "/org/freedesktop/systemd1";
pub const SYSTEMD_MANAGER_INTERFACE: &str = "org.freedesktop.systemd1.Manager";

/// Unit properties sent with StartTransientUnit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeProperty {
    /// `PIDs` (au): processes to move into the scope
    Pids(Vec<u32>),
    /// `Delegate` (b): hand the cgroup subtree to the caller
    Delegate(bool),
    /// `Slice` (s): parent slice
    Slice(String),
}

impl ScopeProperty {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pids(_) => "PIDs",
            Self::Delegate(_) => "Delegate",
            Self::Slice(_) => "Slice",
        }
    }

    /// `(sv)` entry for the property array
    pub fn to_dbus(&self) -> (&'static str, Value<'_>) {
        let value = match self {
            Self::Pids(pids) => Value::new(pids.clone()),
            Self::Delegate(on) => Value::new(*on),
            Self::Slice(slice) => Value::new(slice.as_str()),
        };
        (self.name(), value)
    }
}

/// Properties for a scope holding exactly `pid`, in the order systemd gets them
pub fn scope_properties(pid: u32, request: &ScopeRequest) -> Vec<ScopeProperty> {
    let mut properties = vec![ScopeProperty::Pids(vec![pid])];
    if request.delegated {
        properties.push(ScopeProperty::Delegate(true));
    }
    properties.push(ScopeProperty::Slice(request.slice_name.clone()));
    properties
}

/// Ask systemd to create `request.scope_name` inside `request.slice_name`
/// containing only `pid`.
///
/// A reply only means the job was queued; the cgroup shows up later.
pub fn request_transient_scope<B: UnitBus + ?Sized>(
    bus: &B,
    pid: Pid,
    request: &ScopeRequest,
) -> Result<OwnedObjectPath> {
    let raw = u32::try_from(pid.as_raw()).map_err(|_| ScopeError::InvalidPid(pid.as_raw()))?;
    if raw == 0 {
        return Err(ScopeError::InvalidPid(0));
    }

    let properties = scope_properties(raw, request);
    log::debug!(
        "StartTransientUnit: name={} mode={} properties={:?}",
        request.scope_name,
        request.mode,
        properties
    );

    match bus.start_transient_unit(&request.scope_name, request.mode, &properties) {
        Ok(job) => Ok(job),
        Err(e) if e.is_unit_exists() => {
            // systemd does not say whether the scope or the slice collided
            log::error!("StartTransientUnit {} failed: {}", request.scope_name, e);
            Err(ScopeError::UnitExists {
                scope: request.scope_name.clone(),
                slice: request.slice_name.clone(),
            })
        }
        Err(e) => {
            log::error!(
                "StartTransientUnit {} failed: {} ({})",
                request.scope_name,
                e,
                e.code()
            );
            Err(ScopeError::Bus(e))
        }
    }
}
