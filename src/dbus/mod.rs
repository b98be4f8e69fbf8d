//! D-Bus client side of org.freedesktop.systemd1
//!
//! The scope core only needs one method, StartTransientUnit. It reaches the
//! bus through the [`UnitBus`] trait so callers can hand in an existing
//! connection (or a fake one in tests).

mod manager;

pub use manager::{
    request_transient_scope, ScopeProperty, SYSTEMD_DESTINATION, SYSTEMD_MANAGER_INTERFACE,
    SYSTEMD_OBJECT_PATH,
};

use std::fmt;

use zbus::blocking::Connection;
use zbus::zvariant::{OwnedObjectPath, Value};

use crate::units::JobMode;

/// D-Bus error name systemd uses when a unit with the same name is loaded
pub const UNIT_EXISTS_ERROR: &str = "org.freedesktop.systemd1.UnitExists";

/// Which bus to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusKind {
    /// System manager; can place units anywhere but needs privileges
    #[default]
    System,
    /// Per-user manager; units land below the user's own slice
    User,
}

/// A failed bus operation, with the errno sd-bus would have reported
#[derive(Debug, Clone)]
pub struct BusError {
    /// D-Bus error name, when the peer replied with an error
    pub name: Option<String>,
    pub message: String,
    pub errno: i32,
}

impl BusError {
    /// Error reply received from the peer
    pub fn method_error(name: &str, message: Option<&str>) -> Self {
        Self {
            name: Some(name.to_string()),
            message: message.unwrap_or_default().to_string(),
            errno: errno_for_error_name(name),
        }
    }

    /// Failure below the method call itself (connect, I/O, marshalling)
    pub fn transport(message: impl Into<String>, errno: i32) -> Self {
        Self {
            name: None,
            message: message.into(),
            errno,
        }
    }

    pub fn code(&self) -> i32 {
        -self.errno
    }

    pub fn is_unit_exists(&self) -> bool {
        self.errno == libc::EEXIST
    }
}

/// Map a D-Bus error name onto an errno, following sd-bus's table
pub fn errno_for_error_name(name: &str) -> i32 {
    match name {
        UNIT_EXISTS_ERROR => libc::EEXIST,
        "org.freedesktop.systemd1.NoSuchUnit" => libc::ENOENT,
        "org.freedesktop.systemd1.UnitMasked" => libc::ERFKILL,
        "org.freedesktop.systemd1.JobTypeNotApplicable" => libc::EBADR,
        "org.freedesktop.systemd1.TransactionIsDestructive" => libc::EDEADLK,
        "org.freedesktop.DBus.Error.AccessDenied" | "org.freedesktop.DBus.Error.AuthFailed" => {
            libc::EACCES
        }
        "org.freedesktop.DBus.Error.InvalidArgs"
        | "org.freedesktop.DBus.Error.InvalidSignature" => libc::EINVAL,
        "org.freedesktop.DBus.Error.ServiceUnknown"
        | "org.freedesktop.DBus.Error.NameHasNoOwner" => libc::EHOSTUNREACH,
        "org.freedesktop.DBus.Error.NoReply" | "org.freedesktop.DBus.Error.Timeout" => {
            libc::ETIMEDOUT
        }
        "org.freedesktop.DBus.Error.NoMemory" => libc::ENOMEM,
        "org.freedesktop.DBus.Error.UnknownMethod" | "org.freedesktop.DBus.Error.UnknownObject" => {
            libc::EBADR
        }
        _ => libc::EIO,
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}: {}", name, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for BusError {}

impl From<zbus::Error> for BusError {
    fn from(err: zbus::Error) -> Self {
        match err {
            zbus::Error::MethodError(name, message, _) => {
                Self::method_error(name.as_str(), message.as_deref())
            }
            zbus::Error::InputOutput(io) => {
                let errno = io.raw_os_error().unwrap_or(libc::EIO);
                Self::transport(io.to_string(), errno)
            }
            other => Self::transport(other.to_string(), libc::EIO),
        }
    }
}

/// The one systemd manager call the scope core depends on
pub trait UnitBus {
    /// Ask the manager to create and start a transient unit.
    ///
    /// Returns the job object path. The unit's cgroup may not exist yet when
    /// this returns.
    fn start_transient_unit(
        &self,
        name: &str,
        mode: JobMode,
        properties: &[ScopeProperty],
    ) -> Result<OwnedObjectPath, BusError>;
}

impl<B: UnitBus + ?Sized> UnitBus for &B {
    fn start_transient_unit(
        &self,
        name: &str,
        mode: JobMode,
        properties: &[ScopeProperty],
    ) -> Result<OwnedObjectPath, BusError> {
        (**self).start_transient_unit(name, mode, properties)
    }
}

/// Blocking connection to a systemd manager
pub struct SystemdBus {
    connection: Connection,
}

impl SystemdBus {
    /// Wrap an already opened connection
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Open a connection to the system or user bus
    pub fn connect(kind: BusKind) -> Result<Self, BusError> {
        let connection = match kind {
            BusKind::System => Connection::system(),
            BusKind::User => Connection::session(),
        }
        .map_err(BusError::from)?;
        log::debug!("Connected to {:?} bus", kind);
        Ok(Self::new(connection))
    }
}

impl UnitBus for SystemdBus {
    fn start_transient_unit(
        &self,
        name: &str,
        mode: JobMode,
        properties: &[ScopeProperty],
    ) -> Result<OwnedObjectPath, BusError> {
        let props: Vec<(&str, Value<'_>)> =
            properties.iter().map(ScopeProperty::to_dbus).collect();
        // No auxiliary units
        let aux: Vec<(&str, Vec<(&str, Value<'_>)>)> = Vec::new();

        let reply = self.connection.call_method(
            Some(SYSTEMD_DESTINATION),
            SYSTEMD_OBJECT_PATH,
            Some(SYSTEMD_MANAGER_INTERFACE),
            "StartTransientUnit",
            &(name, mode.as_str(), props, aux),
        )?;

        let job: OwnedObjectPath = reply.body().deserialize()?;
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_exists_maps_to_eexist() {
        let err = BusError::method_error(UNIT_EXISTS_ERROR, Some("Unit foo.scope already exists."));
        assert!(err.is_unit_exists());
        assert_eq!(err.code(), -libc::EEXIST);
        assert_eq!(
            err.to_string(),
            "org.freedesktop.systemd1.UnitExists: Unit foo.scope already exists."
        );
    }

    #[test]
    fn test_errno_table() {
        assert_eq!(
            errno_for_error_name("org.freedesktop.DBus.Error.AccessDenied"),
            libc::EACCES
        );
        assert_eq!(
            errno_for_error_name("org.freedesktop.DBus.Error.InvalidArgs"),
            libc::EINVAL
        );
        assert_eq!(
            errno_for_error_name("org.freedesktop.systemd1.NoSuchUnit"),
            libc::ENOENT
        );
        assert_eq!(errno_for_error_name("com.example.Whatever"), libc::EIO);
    }

    #[test]
    fn test_transport_error_display() {
        let err = BusError::transport("connection refused", libc::ECONNREFUSED);
        assert_eq!(err.to_string(), "connection refused");
        assert_eq!(err.code(), -libc::ECONNREFUSED);
        assert!(!err.is_unit_exists());
    }

    #[test]
    fn test_from_zbus_io_error() {
        let io = std::io::Error::from_raw_os_error(libc::ENOENT);
        let err = BusError::from(zbus::Error::InputOutput(std::sync::Arc::new(io)));
        assert_eq!(err.errno, libc::ENOENT);
        assert!(err.name.is_none());
    }
}
