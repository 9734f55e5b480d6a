//! Observed argument kinds at a call site.

use serde::{Deserialize, Serialize};

use super::sig_type::MISSING;

/// What a call site supplied at one dispatch position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgType {
    /// A value whose concrete runtime class is the given name.
    Present(String),
    /// An optional argument that was not supplied.
    Absent,
}

impl ArgType {
    /// An argument of the named class.
    pub fn of<S: Into<String>>(name: S) -> Self {
        ArgType::Present(name.into())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, ArgType::Absent)
    }

    /// Display name; absent arguments render as `MISSING`.
    pub fn name(&self) -> &str {
        match self {
            ArgType::Present(name) => name,
            ArgType::Absent => MISSING,
        }
    }
}

impl From<&str> for ArgType {
    fn from(name: &str) -> Self {
        ArgType::Present(name.to_string())
    }
}

impl From<String> for ArgType {
    fn from(name: String) -> Self {
        ArgType::Present(name)
    }
}

impl From<Option<&str>> for ArgType {
    fn from(name: Option<&str>) -> Self {
        name.map_or(ArgType::Absent, ArgType::from)
    }
}

impl std::fmt::Display for ArgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
