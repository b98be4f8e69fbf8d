//! Delegation marker on a cgroup directory
//!
//! systemd 251 and later mark delegated cgroups with the `trusted.delegate`
//! extended attribute, and additionally `user.delegate` so unprivileged
//! readers can see it. Older versions set neither, which reads as "not
//! delegated" here.

use std::ffi::CString;
use std::fmt;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::error::{Result, ScopeError};

pub const TRUSTED_DELEGATE_XATTR: &str = "trusted.delegate";
pub const USER_DELEGATE_XATTR: &str = "user.delegate";

/// Reads one extended attribute; `Ok(None)` when it is not set
pub trait AttributeReader: Send + Sync {
    fn get(&self, path: &Path, name: &str) -> io::Result<Option<Vec<u8>>>;
}

/// getxattr(2)
#[derive(Debug, Clone, Copy, Default)]
pub struct Getxattr;

impl AttributeReader for Getxattr {
    fn get(&self, path: &Path, name: &str) -> io::Result<Option<Vec<u8>>> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let c_name =
            CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // Retry if the value grows between the size query and the read
        for _ in 0..3 {
            let size = unsafe {
                libc::getxattr(c_path.as_ptr(), c_name.as_ptr(), std::ptr::null_mut(), 0)
            };
            if size < 0 {
                let err = io::Error::last_os_error();
                return match err.raw_os_error() {
                    Some(libc::ENODATA) => Ok(None),
                    _ => Err(err),
                };
            }

            let mut buf = vec![0u8; size as usize];
            let read = unsafe {
                libc::getxattr(
                    c_path.as_ptr(),
                    c_name.as_ptr(),
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                )
            };
            if read < 0 {
                let err = io::Error::last_os_error();
                match err.raw_os_error() {
                    Some(libc::ERANGE) => continue,
                    Some(libc::ENODATA) => return Ok(None),
                    _ => return Err(err),
                }
            }
            buf.truncate(read as usize);
            return Ok(Some(buf));
        }
        Err(io::Error::from_raw_os_error(libc::ERANGE))
    }
}

/// Whether a cgroup has been handed over to its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegationStatus {
    Delegated,
    NotDelegated,
}

impl DelegationStatus {
    pub fn is_delegated(self) -> bool {
        self == Self::Delegated
    }

    /// 1 for delegated, 0 otherwise
    pub fn as_code(self) -> i32 {
        match self {
            Self::Delegated => 1,
            Self::NotDelegated => 0,
        }
    }
}

impl fmt::Display for DelegationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delegated => f.write_str("delegated"),
            Self::NotDelegated => f.write_str("not-delegated"),
        }
    }
}

fn parse_flag(value: &[u8]) -> bool {
    let value = std::str::from_utf8(value)
        .unwrap_or_default()
        .trim_end_matches(&['\0', '\n'][..]);
    matches!(value, "1" | "yes" | "y" | "true" | "t" | "on")
}

pub struct DelegationChecker {
    reader: Box<dyn AttributeReader>,
}

impl Default for DelegationChecker {
    fn default() -> Self {
        Self::with_reader(Getxattr)
    }
}

impl DelegationChecker {
    pub fn with_reader(reader: impl AttributeReader + 'static) -> Self {
        Self {
            reader: Box::new(reader),
        }
    }

    /// Check the delegation marker on the cgroup directory `path`.
    ///
    /// A missing path is an error, not "not delegated".
    pub fn is_delegated(&self, path: &Path) -> Result<DelegationStatus> {
        for attribute in [TRUSTED_DELEGATE_XATTR, USER_DELEGATE_XATTR] {
            match self.reader.get(path, attribute) {
                Ok(Some(value)) => {
                    let status = if parse_flag(&value) {
                        DelegationStatus::Delegated
                    } else {
                        DelegationStatus::NotDelegated
                    };
                    log::debug!("{} {}={:?}: {}", path.display(), attribute, value, status);
                    return Ok(status);
                }
                Ok(None) => continue,
                Err(source) => {
                    log::error!(
                        "getxattr {} on {} failed: {}",
                        attribute,
                        path.display(),
                        source
                    );
                    return Err(ScopeError::Attribute {
                        path: path.to_path_buf(),
                        attribute,
                        source,
                    });
                }
            }
        }
        log::debug!("{} carries no delegation marker", path.display());
        Ok(DelegationStatus::NotDelegated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[derive(Default)]
    struct FakeAttributes {
        values: HashMap<(PathBuf, &'static str), Vec<u8>>,
        /// Paths that fail every read with this errno
        broken: HashMap<PathBuf, i32>,
    }

    impl FakeAttributes {
        fn set(mut self, path: &str, name: &'static str, value: &[u8]) -> Self {
            self.values.insert((PathBuf::from(path), name), value.to_vec());
            self
        }

        fn broken(mut self, path: &str, errno: i32) -> Self {
            self.broken.insert(PathBuf::from(path), errno);
            self
        }
    }

    impl AttributeReader for FakeAttributes {
        fn get(&self, path: &Path, name: &str) -> io::Result<Option<Vec<u8>>> {
            if let Some(errno) = self.broken.get(path) {
                return Err(io::Error::from_raw_os_error(*errno));
            }
            Ok(self
                .values
                .iter()
                .find(|((p, n), _)| p == path && *n == name)
                .map(|(_, v)| v.clone()))
        }
    }

    const SCOPE: &str = "/sys/fs/cgroup/testing.slice/a.scope";

    #[test]
    fn test_trusted_attribute() {
        let attrs = FakeAttributes::default().set(SCOPE, TRUSTED_DELEGATE_XATTR, b"1");
        let checker = DelegationChecker::with_reader(attrs);
        assert_eq!(
            checker.is_delegated(Path::new(SCOPE)).unwrap(),
            DelegationStatus::Delegated
        );
    }

    #[test]
    fn test_falls_back_to_user_attribute() {
        let attrs = FakeAttributes::default().set(SCOPE, USER_DELEGATE_XATTR, b"1");
        let checker = DelegationChecker::with_reader(attrs);
        assert!(checker.is_delegated(Path::new(SCOPE)).unwrap().is_delegated());
    }

    #[test]
    fn test_trusted_wins_over_user() {
        let checker = DelegationChecker::with_reader(
            FakeAttributes::default()
                .set(SCOPE, TRUSTED_DELEGATE_XATTR, b"0")
                .set(SCOPE, USER_DELEGATE_XATTR, b"1"),
        );
        assert_eq!(
            checker.is_delegated(Path::new(SCOPE)).unwrap(),
            DelegationStatus::NotDelegated
        );
    }

    #[test]
    fn test_no_attributes_is_not_delegated() {
        let checker = DelegationChecker::with_reader(FakeAttributes::default());
        let status = checker.is_delegated(Path::new(SCOPE)).unwrap();
        assert_eq!(status, DelegationStatus::NotDelegated);
        assert_eq!(status.as_code(), 0);
    }

    #[test]
    fn test_read_error_is_not_not_delegated() {
        let checker =
            DelegationChecker::with_reader(FakeAttributes::default().broken(SCOPE, libc::EACCES));
        let err = checker.is_delegated(Path::new(SCOPE)).unwrap_err();
        assert!(matches!(
            err,
            ScopeError::Attribute {
                attribute: TRUSTED_DELEGATE_XATTR,
                ..
            }
        ));
        assert_eq!(err.code(), -libc::EACCES);
    }

    #[test]
    fn test_nonexistent_path_with_getxattr() {
        let checker = DelegationChecker::default();
        let err = checker
            .is_delegated(Path::new("/nonexistent/sysd-scope/test.scope"))
            .unwrap_err();
        assert!(matches!(err, ScopeError::Attribute { .. }));
        assert_eq!(err.code(), -libc::ENOENT);
    }

    #[test]
    fn test_parse_flag_variants() {
        assert!(parse_flag(b"1"));
        assert!(parse_flag(b"1\0"));
        assert!(parse_flag(b"yes\n"));
        assert!(!parse_flag(b"0"));
        assert!(!parse_flag(b""));
        assert!(!parse_flag(&[0xff, 0xfe]));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(DelegationStatus::Delegated.to_string(), "delegated");
        assert_eq!(DelegationStatus::NotDelegated.to_string(), "not-delegated");
        assert_eq!(DelegationStatus::Delegated.as_code(), 1);
    }
}
