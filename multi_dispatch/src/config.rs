//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, DispatchResult};

/// Tunables for a [`DispatchContext`](crate::DispatchContext).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Memoize resolutions. When off, every resolve is computed afresh and
    /// ambiguities are reported on every call.
    pub cache_enabled: bool,
    /// Also memoize dispatch failures.
    pub cache_failures: bool,
    /// How many ambiguity reports to keep in memory. Oldest are dropped
    /// first; the ambiguity counter is not bounded.
    pub max_recorded_ambiguities: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_failures: true,
            max_recorded_ambiguities: 256,
        }
    }
}

impl DispatchConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(src: &str) -> DispatchResult<Self> {
        serde_json::from_str(src).map_err(|e| DispatchError::InvalidConfig(e.to_string()))
    }

    pub fn without_cache(mut self) -> Self {
        self.cache_enabled = false;
        self
    }
}
