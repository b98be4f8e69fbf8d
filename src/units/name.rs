//! Unit name validation

use super::UnitType;
use crate::error::{Result, ScopeError};

/// Longest unit name systemd accepts (UNIT_NAME_MAX minus the NUL)
const UNIT_NAME_MAX: usize = 255;

fn is_valid_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ':' | '-' | '_' | '.' | '\\' | '@')
}

fn invalid(name: &str, reason: &'static str) -> ScopeError {
    ScopeError::InvalidUnitName {
        name: name.to_string(),
        reason,
    }
}

/// Check that `name` is a well-formed unit of type `expected`.
///
/// A name carrying the suffix of another unit type (a slice given where a
/// scope is needed, a service anywhere) is `WrongUnitType`; every other
/// problem is `InvalidUnitName`.
pub fn validate(name: &str, expected: UnitType) -> Result<()> {
    let prefix = match name
        .strip_suffix(expected.suffix())
        .and_then(|rest| rest.strip_suffix('.'))
    {
        Some(prefix) => prefix,
        None => {
            return Err(match UnitType::from_name(name) {
                Some(found) => ScopeError::WrongUnitType {
                    name: name.to_string(),
                    expected,
                    found,
                },
                None => match expected {
                    UnitType::Scope => invalid(name, "missing .scope suffix"),
                    UnitType::Slice => invalid(name, "missing .slice suffix"),
                    _ => invalid(name, "missing unit type suffix"),
                },
            });
        }
    };

    if prefix.is_empty() {
        return Err(invalid(name, "empty unit name"));
    }
    if name.len() > UNIT_NAME_MAX {
        return Err(invalid(name, "unit name too long"));
    }
    if !prefix.chars().all(is_valid_char) {
        return Err(invalid(name, "unit name contains invalid characters"));
    }
    if prefix.ends_with('@') {
        return Err(invalid(name, "template units cannot be transient"));
    }

    if expected == UnitType::Slice && prefix != "-" {
        if prefix.starts_with('-') || prefix.ends_with('-') || prefix.contains("--") {
            return Err(invalid(name, "malformed slice hierarchy"));
        }
    }

    Ok(())
}
