//! sysd-scope - transient systemd scopes with delegated cgroups
//!
//! Creates scope units through systemd's D-Bus API and checks whether a
//! cgroup was delegated to its owner.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  ScopeManager                    │
//! ├──────────────┬──────────────────┬───────────────┤
//! │  Unit names  │ Sentinel process │  D-Bus (zbus) │
//! ├──────────────┴──────────────────┴───────────────┤
//! │   cgroup hierarchy / proc lookup / delegation    │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! A scope stays alive while its [`Sentinel`] does: terminate the sentinel
//! and systemd garbage-collects the scope.

pub mod cgroups;
pub mod config;
pub mod dbus;
pub mod error;
pub mod retry;
pub mod scope;
pub mod sentinel;
pub mod signals;
pub mod units;

pub use cgroups::{DelegationStatus, HierarchyRoot, Layout};
pub use config::Config;
pub use dbus::{BusKind, SystemdBus, UnitBus};
pub use error::{Result, ScopeError};
pub use retry::{CancelToken, RetryPolicy};
pub use scope::{ScopeManager, ScopeRequest, DEFAULT_SLICE};
pub use sentinel::{terminate_pid, Sentinel};
pub use units::{JobMode, UnitType};
