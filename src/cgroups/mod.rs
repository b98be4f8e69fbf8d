//! Read-only view of the cgroup hierarchy
//!
//! Where systemd's tree lives depends on how cgroups are mounted:
//!
//! /sys/fs/cgroup/                 unified: cgroup2 mounted directly
//! /sys/fs/cgroup/unified/         hybrid: tmpfs at the root, cgroup2 below
//! /sys/fs/cgroup/systemd/         legacy: tmpfs at the root, named v1 hierarchy
//!
//! Nothing here writes to the tree; scopes are created by systemd.

pub mod delegation;
pub mod hierarchy;
pub mod proc;

pub use delegation::{
    AttributeReader, DelegationChecker, DelegationStatus, Getxattr, TRUSTED_DELEGATE_XATTR,
    USER_DELEGATE_XATTR,
};
pub use hierarchy::{FsKind, FsTypeReader, HierarchyResolver, HierarchyRoot, Layout, Statfs};
pub use proc::{parse_proc_cgroup, ProcCgroups};

use std::path::{Path, PathBuf};

pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Join a cgroup path as reported in /proc (absolute, e.g.
/// "/testing.slice/foo.scope") onto a hierarchy root.
pub fn join_cgroup(root: &Path, cgroup: &str) -> PathBuf {
    let relative = cgroup.trim_start_matches('/');
    if relative.is_empty() {
        root.to_path_buf()
    } else {
        root.join(relative)
    }
}
