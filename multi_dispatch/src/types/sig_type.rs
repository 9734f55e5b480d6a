//! Signature entries: real class names plus the `ANY` and `MISSING` pseudo-types.

use serde::{Deserialize, Serialize};

/// Name of the wildcard pseudo-type.
pub const ANY: &str = "ANY";

/// Name of the pseudo-type matching an absent optional argument.
pub const MISSING: &str = "MISSING";

/// One position of a method signature.
///
/// Ordering is by rendered name, so a tuple of `SigType`s sorts the same way
/// its display strings do. The resolver relies on this for tie-breaking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigType {
    /// Wildcard: matches any present argument, least specific.
    Any,
    /// Matches only an argument that was not supplied.
    Missing,
    /// A registered class, matching itself and its descendants.
    Class(String),
}

impl SigType {
    /// Build a class entry.
    pub fn class<S: Into<String>>(name: S) -> Self {
        SigType::Class(name.into())
    }

    /// Get the display name for this entry.
    pub fn name(&self) -> &str {
        match self {
            SigType::Any => ANY,
            SigType::Missing => MISSING,
            SigType::Class(name) => name,
        }
    }

    /// True for `ANY` and `MISSING`.
    pub fn is_pseudo(&self) -> bool {
        !matches!(self, SigType::Class(_))
    }

    /// Parse a signature entry. `ANY` and `MISSING` map to the pseudo-types;
    /// anything else names a class.
    pub fn from_name(name: &str) -> Self {
        match name {
            ANY => SigType::Any,
            MISSING => SigType::Missing,
            other => SigType::Class(other.to_string()),
        }
    }
}

impl From<&str> for SigType {
    fn from(name: &str) -> Self {
        SigType::from_name(name)
    }
}

impl From<String> for SigType {
    fn from(name: String) -> Self {
        match name.as_str() {
            ANY => SigType::Any,
            MISSING => SigType::Missing,
            _ => SigType::Class(name),
        }
    }
}

impl PartialOrd for SigType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SigType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name().cmp(other.name())
    }
}

impl std::fmt::Display for SigType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
