//! Resolution cache keyed by (generic, observed class tuple).
//!
//! Invalidation is wholesale: a method change clears every entry of that
//! generic, a class graph change clears everything. Entries are only
//! inserted while the caller holds the registry read lock, so an insert can
//! never race with the mutation that would have invalidated it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::generic::GenericId;
use crate::method_table::{ImplHandle, MethodId};
use crate::resolver::ObservedKey;
use crate::types::SigType;

/// Memoized outcome of one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CachedOutcome {
    Method {
        method: MethodId,
        handle: ImplHandle,
        signature: Vec<SigType>,
        score: u64,
        tied: Vec<Vec<SigType>>,
    },
    Failure,
}

/// Hit/miss counters and current size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
pub(crate) struct ResolutionCache {
    entries: RwLock<HashMap<GenericId, HashMap<ObservedKey, CachedOutcome>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<GenericId, HashMap<ObservedKey, CachedOutcome>>>
    {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<GenericId, HashMap<ObservedKey, CachedOutcome>>>
    {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Probe the cache, counting the hit or miss.
    pub fn get(&self, generic: GenericId, key: &ObservedKey) -> Option<CachedOutcome> {
        let found = self
            .read()
            .get(&generic)
            .and_then(|per_generic| per_generic.get(key))
            .cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(generic = generic.index(), hit = found.is_some(), "resolution cache probe");
        found
    }

    pub fn insert(&self, generic: GenericId, key: ObservedKey, outcome: CachedOutcome) {
        self.write().entry(generic).or_default().insert(key, outcome);
    }

    /// Drop every entry of one generic.
    pub fn invalidate_generic(&self, generic: GenericId) {
        self.write().remove(&generic);
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.write().clear();
    }

    /// Drop every entry and zero the counters.
    pub fn reset(&self) {
        self.invalidate_all();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.read().values().map(HashMap::len).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generic(n: u32) -> GenericId {
        GenericId::from_raw(n)
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let cache = ResolutionCache::new();
        let g = generic(0);
        let key: ObservedKey = vec![None];
        assert_eq!(cache.get(g, &key), None);
        cache.insert(g, key.clone(), CachedOutcome::Failure);
        assert_eq!(cache.get(g, &key), Some(CachedOutcome::Failure));
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn test_invalidate_generic_leaves_others() {
        let cache = ResolutionCache::new();
        let key: ObservedKey = vec![None];
        cache.insert(generic(0), key.clone(), CachedOutcome::Failure);
        cache.insert(generic(1), key.clone(), CachedOutcome::Failure);
        cache.invalidate_generic(generic(0));
        assert_eq!(cache.stats().entries, 1);
        assert!(cache.get(generic(1), &key).is_some());
        cache.invalidate_all();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_reset_zeroes_counters() {
        let cache = ResolutionCache::new();
        let _ = cache.get(generic(0), &vec![]);
        cache.reset();
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
