//! Dispatch context: the class graph, generic table, method table and
//! resolution cache as one unit.
//!
//! # Locking
//!
//! The registries sit behind a single `RwLock`. Resolution takes the read
//! side, so any number of calls resolve concurrently; every mutation takes
//! the write side and clears the affected cache entries before releasing
//! it. Cache inserts happen under the read side, which keeps a stale
//! outcome from being stored after a mutation has cleared the cache.
//!
//! Lock order is registry, then cache. The ambiguity hook runs after the
//! registry lock is released.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::cache::{CacheStats, CachedOutcome, ResolutionCache};
use crate::class_graph::{ClassDescriptor, ClassGraph, ClassId};
use crate::config::DispatchConfig;
use crate::diagnostics::{AmbiguityReport, DiagnosticsLog};
use crate::error::{DispatchError, DispatchResult};
use crate::generic::{GenericId, GenericShape, GenericTable};
use crate::method_table::{ImplHandle, MethodEntry, MethodId, MethodTable};
use crate::resolver::{self, ObservedKey, Outcome, RankedMethod};
use crate::snapshot::RegistrySnapshot;
use crate::types::{ArgType, SigType};

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub handle: ImplHandle,
    pub method: MethodId,
    pub signature: Vec<SigType>,
    /// Sum of per-slot distances of the chosen signature.
    pub score: u64,
    /// All signatures that tied for the lowest score, in tie-break order.
    /// Empty when the choice was unique.
    pub tied: Vec<Vec<SigType>>,
    /// True when the outcome was served from the resolution cache.
    pub from_cache: bool,
}

impl Resolution {
    pub fn is_ambiguous(&self) -> bool {
        !self.tied.is_empty()
    }
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    pub classes: ClassGraph,
    pub generics: GenericTable,
    pub methods: MethodTable,
}

/// Independent dispatch engine instance.
#[derive(Debug)]
pub struct DispatchContext {
    registry: RwLock<Registry>,
    cache: ResolutionCache,
    diagnostics: DiagnosticsLog,
    config: DispatchConfig,
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchContext {
    pub fn new() -> Self {
        Self::with_config(DispatchConfig::default())
    }

    pub fn with_config(config: DispatchConfig) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            cache: ResolutionCache::new(),
            diagnostics: DiagnosticsLog::new(config.max_recorded_ambiguities),
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ==================== Classes ====================

    /// Register (or redefine) an instantiable class.
    pub fn register_class<I, S>(&self, name: &str, parents: I) -> DispatchResult<ClassId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register_descriptor(ClassDescriptor::new(name).with_parents(parents))
    }

    /// Register (or redefine) a virtual class.
    pub fn register_virtual_class<I, S>(&self, name: &str, parents: I) -> DispatchResult<ClassId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register_descriptor(
            ClassDescriptor::new(name)
                .with_parents(parents)
                .virtual_class(),
        )
    }

    /// Register (or redefine) a class from a full descriptor.
    ///
    /// Any change to the class graph clears the whole resolution cache.
    pub fn register_descriptor(&self, descriptor: ClassDescriptor) -> DispatchResult<ClassId> {
        let mut registry = self.write();
        let id = registry.classes.register(descriptor)?;
        self.cache.invalidate_all();
        Ok(id)
    }

    pub fn class(&self, name: &str) -> Option<ClassDescriptor> {
        self.read().classes.get(name).cloned()
    }

    pub fn class_count(&self) -> usize {
        self.read().classes.len()
    }

    /// Shortest parent-edge distance from `from` up to `to`; `None` when
    /// unrelated.
    pub fn distance(&self, from: &str, to: &str) -> DispatchResult<Option<u32>> {
        let registry = self.read();
        let from = class_id(&registry.classes, from)?;
        let to = class_id(&registry.classes, to)?;
        Ok(registry.classes.distance(from, to))
    }

    /// `name` and its ancestors with their shortest distances, nearest first.
    pub fn ancestors_by_distance(&self, name: &str) -> DispatchResult<Vec<(String, u32)>> {
        let registry = self.read();
        let id = class_id(&registry.classes, name)?;
        Ok(registry
            .classes
            .ancestors(id)
            .map(|(ancestor, d)| (registry.classes.name(ancestor).to_string(), d))
            .collect())
    }

    pub fn is_subclass(&self, sub: &str, sup: &str) -> DispatchResult<bool> {
        Ok(self.distance(sub, sup)?.is_some())
    }

    // ==================== Generics ====================

    /// Define a generic with `arity` parameters, of which
    /// `dispatch_positions` take part in dispatch and `optional_positions`
    /// may be omitted.
    pub fn define_generic(
        &self,
        name: &str,
        arity: usize,
        dispatch_positions: &[usize],
        optional_positions: &[usize],
    ) -> DispatchResult<GenericId> {
        self.define_generic_shape(
            name,
            GenericShape::new(
                arity,
                dispatch_positions.to_vec(),
                optional_positions.to_vec(),
            ),
        )
    }

    pub fn define_generic_shape(&self, name: &str, shape: GenericShape) -> DispatchResult<GenericId> {
        self.write().generics.define(name, shape)
    }

    pub fn generic_shape(&self, name: &str) -> DispatchResult<GenericShape> {
        self.read().generics.lookup(name).cloned()
    }

    // ==================== Methods ====================

    /// Register an implementation for a signature, replacing any method with
    /// the identical signature. Clears the generic's cached resolutions.
    pub fn define_method<I, T>(
        &self,
        generic: &str,
        signature: I,
        handle: ImplHandle,
    ) -> DispatchResult<MethodId>
    where
        I: IntoIterator<Item = T>,
        T: Into<SigType>,
    {
        let signature: Vec<SigType> = signature.into_iter().map(Into::into).collect();
        let mut guard = self.write();
        let registry = &mut *guard;
        let gid = generic_id(&registry.generics, generic)?;
        let id = registry.methods.add(
            gid,
            generic,
            registry.generics.shape(gid),
            signature,
            handle,
            &registry.classes,
        )?;
        self.cache.invalidate_generic(gid);
        Ok(id)
    }

    /// Remove the method with exactly this signature. Returns whether one
    /// was registered; removing an absent signature changes nothing.
    pub fn remove_method<I, T>(&self, generic: &str, signature: I) -> DispatchResult<bool>
    where
        I: IntoIterator<Item = T>,
        T: Into<SigType>,
    {
        let signature: Vec<SigType> = signature.into_iter().map(Into::into).collect();
        let mut registry = self.write();
        let gid = generic_id(&registry.generics, generic)?;
        let removed = registry.methods.remove(gid, &signature).is_some();
        if removed {
            self.cache.invalidate_generic(gid);
        }
        Ok(removed)
    }

    /// Registered methods of a generic, in registration order.
    pub fn methods(&self, generic: &str) -> DispatchResult<Vec<MethodEntry>> {
        let registry = self.read();
        let gid = generic_id(&registry.generics, generic)?;
        Ok(registry.methods.methods(gid))
    }

    // ==================== Resolution ====================

    /// Resolve a call to the implementation handle of the most specific
    /// applicable method.
    ///
    /// `observed` holds one entry per dispatch slot: the concrete class of
    /// the argument, or [`ArgType::Absent`] for an omitted optional argument.
    /// Ties are broken deterministically and reported as an ambiguity
    /// diagnostic the first time they are computed.
    pub fn resolve<I, A>(&self, generic: &str, observed: I) -> DispatchResult<ImplHandle>
    where
        I: IntoIterator<Item = A>,
        A: Into<ArgType>,
    {
        self.resolve_method(generic, observed).map(|r| r.handle)
    }

    /// Like [`resolve`](Self::resolve) but returns the full resolution.
    pub fn resolve_method<I, A>(&self, generic: &str, observed: I) -> DispatchResult<Resolution>
    where
        I: IntoIterator<Item = A>,
        A: Into<ArgType>,
    {
        let observed: Vec<ArgType> = observed.into_iter().map(Into::into).collect();
        let (resolution, report) = {
            let registry = self.read();
            self.resolve_locked(&registry, generic, &observed)?
        };
        if let Some(report) = report {
            self.diagnostics.record(report);
        }
        Ok(resolution)
    }

    /// Like [`resolve`](Self::resolve) but treats a tie as an error.
    pub fn resolve_strict<I, A>(&self, generic: &str, observed: I) -> DispatchResult<ImplHandle>
    where
        I: IntoIterator<Item = A>,
        A: Into<ArgType>,
    {
        let observed: Vec<ArgType> = observed.into_iter().map(Into::into).collect();
        let resolution = self.resolve_method(generic, observed.iter().cloned())?;
        if resolution.is_ambiguous() {
            return Err(DispatchError::AmbiguousDispatch {
                generic: generic.to_string(),
                observed: arg_names(&observed),
                candidates: resolution
                    .tied
                    .iter()
                    .map(|sig| sig.iter().map(|t| t.name().to_string()).collect())
                    .collect(),
            });
        }
        Ok(resolution.handle)
    }

    /// Every applicable method for the observed types, ranked the way the
    /// resolver ranks them. Bypasses the cache.
    pub fn applicable_methods<I, A>(
        &self,
        generic: &str,
        observed: I,
    ) -> DispatchResult<Vec<RankedMethod>>
    where
        I: IntoIterator<Item = A>,
        A: Into<ArgType>,
    {
        let observed: Vec<ArgType> = observed.into_iter().map(Into::into).collect();
        let registry = self.read();
        let gid = generic_id(&registry.generics, generic)?;
        let key = observe(&registry, gid, generic, &observed)?;
        Ok(resolver::rank(
            &registry.classes,
            registry.methods.candidates(gid),
            &key,
        ))
    }

    fn resolve_locked(
        &self,
        registry: &Registry,
        generic: &str,
        observed: &[ArgType],
    ) -> DispatchResult<(Resolution, Option<AmbiguityReport>)> {
        let gid = generic_id(&registry.generics, generic)?;
        let key = observe(registry, gid, generic, observed)?;

        if self.config.cache_enabled {
            if let Some(cached) = self.cache.get(gid, &key) {
                return match cached {
                    CachedOutcome::Method {
                        method,
                        handle,
                        signature,
                        score,
                        tied,
                    } => Ok((
                        Resolution {
                            handle,
                            method,
                            signature,
                            score,
                            tied,
                            from_cache: true,
                        },
                        None,
                    )),
                    CachedOutcome::Failure => Err(DispatchError::dispatch_failure(
                        generic,
                        arg_names(observed),
                    )),
                };
            }
        }

        let outcome =
            resolver::resolve_uncached(&registry.classes, registry.methods.candidates(gid), &key);
        match outcome {
            Outcome::NoMethod => {
                if self.config.cache_enabled && self.config.cache_failures {
                    self.cache.insert(gid, key, CachedOutcome::Failure);
                }
                Err(DispatchError::dispatch_failure(
                    generic,
                    arg_names(observed),
                ))
            }
            Outcome::Resolved { winner, tied } => {
                let report = (!tied.is_empty()).then(|| AmbiguityReport {
                    generic: generic.to_string(),
                    observed: arg_names(observed),
                    candidates: tied.clone(),
                    chosen: winner.signature.clone(),
                    score: winner.score,
                });
                if self.config.cache_enabled {
                    self.cache.insert(
                        gid,
                        key,
                        CachedOutcome::Method {
                            method: winner.method,
                            handle: winner.handle,
                            signature: winner.signature.clone(),
                            score: winner.score,
                            tied: tied.clone(),
                        },
                    );
                }
                Ok((
                    Resolution {
                        handle: winner.handle,
                        method: winner.method,
                        signature: winner.signature,
                        score: winner.score,
                        tied,
                        from_cache: false,
                    },
                    report,
                ))
            }
        }
    }

    // ==================== Diagnostics ====================

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of ambiguous resolutions computed since creation or reset.
    pub fn ambiguity_count(&self) -> u64 {
        self.diagnostics.total()
    }

    /// Drain the recorded ambiguity reports, oldest first.
    pub fn take_ambiguities(&self) -> Vec<AmbiguityReport> {
        self.diagnostics.take()
    }

    /// Install a callback run for every ambiguity report, on the resolving
    /// thread, after the registry lock has been released.
    pub fn set_ambiguity_hook<F>(&self, hook: F)
    where
        F: Fn(&AmbiguityReport) + Send + Sync + 'static,
    {
        self.diagnostics.set_hook(Some(Arc::new(hook)));
    }

    pub fn clear_ambiguity_hook(&self) {
        self.diagnostics.set_hook(None);
    }

    /// Export the registries.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot::capture(&self.read())
    }

    /// Clear every class, generic, method, cached resolution and recorded
    /// diagnostic. Configuration and the ambiguity hook are kept.
    pub fn reset(&self) {
        let mut registry = self.write();
        registry.classes.clear();
        registry.generics.clear();
        registry.methods.clear();
        self.cache.reset();
        self.diagnostics.reset();
        tracing::debug!("dispatch context reset");
    }
}

fn class_id(classes: &ClassGraph, name: &str) -> DispatchResult<ClassId> {
    classes
        .id(name)
        .ok_or_else(|| DispatchError::UnknownType(name.to_string()))
}

fn generic_id(generics: &GenericTable, name: &str) -> DispatchResult<GenericId> {
    generics
        .id(name)
        .ok_or_else(|| DispatchError::UnknownGeneric(name.to_string()))
}

fn arg_names(observed: &[ArgType]) -> Vec<String> {
    observed.iter().map(|a| a.name().to_string()).collect()
}

/// Validate an observed tuple against the generic's shape and map it to
/// class ids.
fn observe(
    registry: &Registry,
    gid: GenericId,
    generic: &str,
    observed: &[ArgType],
) -> DispatchResult<ObservedKey> {
    let shape = registry.generics.shape(gid);
    if observed.len() != shape.dispatch_arity() {
        return Err(DispatchError::ArityMismatch {
            generic: generic.to_string(),
            expected: shape.dispatch_arity(),
            found: observed.len(),
        });
    }
    observed
        .iter()
        .enumerate()
        .map(|(slot, arg)| match arg {
            ArgType::Present(name) => class_id(&registry.classes, name).map(Some),
            ArgType::Absent if shape.is_optional_slot(slot) => Ok(None),
            ArgType::Absent => Err(DispatchError::MissingArgument {
                generic: generic.to_string(),
                position: shape.dispatch_positions[slot],
            }),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn shapes() -> DispatchContext {
        let ctx = DispatchContext::new();
        ctx.register_class("Shape", Vec::<String>::new()).unwrap();
        ctx.register_class("Square", ["Shape"]).unwrap();
        // area(shape, unit=nothing): parameter 1 dispatches and may be omitted
        ctx.define_generic("area", 2, &[0, 1], &[1]).unwrap();
        ctx
    }

    #[test]
    fn test_observed_tuple_must_match_dispatch_arity() {
        let ctx = shapes();
        ctx.define_method("area", ["Shape", "MISSING"], ImplHandle(1))
            .unwrap();
        let err = ctx.resolve("area", [ArgType::of("Square")]).unwrap_err();
        assert_eq!(
            err,
            DispatchError::ArityMismatch {
                generic: "area".to_string(),
                expected: 2,
                found: 1,
            }
        );
    }

    #[test]
    fn test_absent_required_argument_is_rejected_before_lookup() {
        let ctx = shapes();
        ctx.define_method("area", ["Shape", "MISSING"], ImplHandle(1))
            .unwrap();
        let err = ctx
            .resolve("area", [ArgType::Absent, ArgType::Absent])
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::MissingArgument {
                generic: "area".to_string(),
                position: 0,
            }
        );
        // Call-shape errors never reach the cache
        assert_eq!(ctx.cache_stats(), CacheStats::default());
    }

    #[test]
    fn test_unknown_observed_type() {
        let ctx = shapes();
        let err = ctx
            .resolve("area", [ArgType::of("Circle"), ArgType::Absent])
            .unwrap_err();
        assert_eq!(err, DispatchError::UnknownType("Circle".to_string()));
    }

    #[test]
    fn test_failures_cached_only_when_configured() {
        let cached = shapes();
        let uncached = DispatchContext::with_config(DispatchConfig {
            cache_failures: false,
            ..DispatchConfig::default()
        });
        uncached.register_class("Shape", Vec::<String>::new()).unwrap();
        uncached.define_generic("area", 2, &[0, 1], &[1]).unwrap();

        for ctx in [&cached, &uncached] {
            for _ in 0..2 {
                assert!(matches!(
                    ctx.resolve("area", [ArgType::of("Shape"), ArgType::Absent]),
                    Err(DispatchError::DispatchFailure { .. })
                ));
            }
        }
        assert_eq!(cached.cache_stats().hits, 1);
        assert_eq!(uncached.cache_stats().hits, 0);
        assert_eq!(uncached.cache_stats().entries, 0);
    }

    #[test]
    fn test_disabled_cache_never_probes() {
        let ctx = DispatchContext::with_config(DispatchConfig::default().without_cache());
        ctx.register_class("Shape", Vec::<String>::new()).unwrap();
        ctx.define_generic("area", 1, &[0], &[]).unwrap();
        ctx.define_method("area", ["Shape"], ImplHandle(7)).unwrap();
        for _ in 0..3 {
            let r = ctx.resolve_method("area", ["Shape"]).unwrap();
            assert!(!r.from_cache);
        }
        assert_eq!(ctx.cache_stats(), CacheStats::default());
    }

    #[test]
    fn test_remove_absent_signature_keeps_cache() {
        let ctx = shapes();
        ctx.define_method("area", ["Shape", "MISSING"], ImplHandle(1))
            .unwrap();
        ctx.resolve("area", [ArgType::of("Square"), ArgType::Absent])
            .unwrap();
        assert!(!ctx.remove_method("area", ["Square", "MISSING"]).unwrap());
        assert_eq!(ctx.cache_stats().entries, 1);
        assert!(ctx.remove_method("area", ["Shape", "MISSING"]).unwrap());
        assert_eq!(ctx.cache_stats().entries, 0);
    }

    #[test]
    fn test_reset_keeps_config() {
        let ctx = DispatchContext::with_config(DispatchConfig::default().without_cache());
        ctx.register_class("Shape", Vec::<String>::new()).unwrap();
        ctx.reset();
        assert_eq!(ctx.class_count(), 0);
        assert!(!ctx.config().cache_enabled);
        assert!(matches!(
            ctx.generic_shape("area"),
            Err(DispatchError::UnknownGeneric(_))
        ));
    }
}
