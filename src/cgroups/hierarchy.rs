//! Locate the root of systemd's cgroup hierarchy
//!
//! The layout is detected on every call; it is not cached.

use std::io;
use std::path::{Path, PathBuf};

use nix::sys::statfs::{statfs, CGROUP2_SUPER_MAGIC, CGROUP_SUPER_MAGIC, SYSFS_MAGIC, TMPFS_MAGIC};

use super::CGROUP_ROOT;
use crate::error::{Result, ScopeError};

const UNIFIED_DIR: &str = "unified";
const SYSTEMD_DIR: &str = "systemd";

/// Filesystem types that matter for layout detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsKind {
    Cgroup2,
    Cgroup1,
    Tmpfs,
    Sysfs,
    Other(i64),
}

/// Reports the filesystem type of a path
pub trait FsTypeReader: Send + Sync {
    fn fs_kind(&self, path: &Path) -> io::Result<FsKind>;
}

/// statfs(2) magic numbers
#[derive(Debug, Clone, Copy, Default)]
pub struct Statfs;

impl FsTypeReader for Statfs {
    fn fs_kind(&self, path: &Path) -> io::Result<FsKind> {
        let fs = statfs(path)?;
        let kind = match fs.filesystem_type() {
            t if t == CGROUP2_SUPER_MAGIC => FsKind::Cgroup2,
            t if t == CGROUP_SUPER_MAGIC => FsKind::Cgroup1,
            t if t == TMPFS_MAGIC => FsKind::Tmpfs,
            t if t == SYSFS_MAGIC => FsKind::Sysfs,
            t => FsKind::Other(t.0 as i64),
        };
        Ok(kind)
    }
}

/// How cgroups are mounted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Unified,
    Hybrid,
    Legacy,
}

/// Directory under which systemd's units appear
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyRoot {
    pub layout: Layout,
    pub path: PathBuf,
}

pub struct HierarchyResolver {
    root: PathBuf,
    fs: Box<dyn FsTypeReader>,
}

impl Default for HierarchyResolver {
    fn default() -> Self {
        Self::new(CGROUP_ROOT)
    }
}

impl HierarchyResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_fs_reader(root, Statfs)
    }

    pub fn with_fs_reader(root: impl Into<PathBuf>, fs: impl FsTypeReader + 'static) -> Self {
        Self {
            root: root.into(),
            fs: Box::new(fs),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// statfs a sub-mount; errors count as "not this layout"
    fn sub_mount(&self, dir: &str) -> Option<(PathBuf, FsKind)> {
        let path = self.root.join(dir);
        match self.fs.fs_kind(&path) {
            Ok(kind) => Some((path, kind)),
            Err(e) => {
                log::debug!("statfs on {} failed: {}", path.display(), e);
                None
            }
        }
    }

    /// Find the active hierarchy root.
    ///
    /// 1. root is cgroup2: unified layout
    /// 2. root is tmpfs and `unified/` is cgroup2: hybrid layout
    /// 3. root is tmpfs and `systemd/` is cgroup1 or cgroup2: legacy layout
    /// 4. root is sysfs or missing: not mounted; anything else is unknown
    pub fn resolve_root(&self) -> Result<HierarchyRoot> {
        let kind = match self.fs.fs_kind(&self.root) {
            Ok(kind) => kind,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("{} does not exist", self.root.display());
                return Err(ScopeError::NotMounted);
            }
            Err(e) => {
                return Err(ScopeError::StatfsFailed {
                    path: self.root.clone(),
                    source: e,
                })
            }
        };

        let found = match kind {
            FsKind::Cgroup2 => HierarchyRoot {
                layout: Layout::Unified,
                path: self.root.clone(),
            },
            FsKind::Tmpfs => {
                if let Some((path, FsKind::Cgroup2)) = self.sub_mount(UNIFIED_DIR) {
                    HierarchyRoot {
                        layout: Layout::Hybrid,
                        path,
                    }
                } else {
                    match self.sub_mount(SYSTEMD_DIR) {
                        Some((path, FsKind::Cgroup1 | FsKind::Cgroup2)) => HierarchyRoot {
                            layout: Layout::Legacy,
                            path,
                        },
                        _ => return Err(ScopeError::UnknownMount),
                    }
                }
            }
            FsKind::Sysfs => return Err(ScopeError::NotMounted),
            FsKind::Cgroup1 | FsKind::Other(_) => {
                log::debug!("{} has unexpected type {:?}", self.root.display(), kind);
                return Err(ScopeError::UnknownMount);
            }
        };

        log::debug!(
            "cgroup hierarchy: {:?} at {}",
            found.layout,
            found.path.display()
        );
        Ok(found)
    }
}
