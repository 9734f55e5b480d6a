//! Method table for multiple dispatch support.
//!
//! Stores, per generic, the registered signatures and their implementation
//! handles. Adding a method with a signature that already exists replaces
//! the old entry in place; identity is the exact signature tuple.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::class_graph::{ClassGraph, ClassId};
use crate::error::{DispatchError, DispatchResult};
use crate::generic::{GenericId, GenericShape};
use crate::types::{render_tuple, SigType};

/// Opaque implementation handle supplied by the caller at registration.
///
/// The engine never interprets it; embedders typically use it as an index
/// into their own function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImplHandle(pub usize);

/// Stable identity of a registered method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodId(u32);

impl MethodId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// A signature entry with its class resolved to an arena id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Slot {
    Any,
    Missing,
    Class(ClassId),
}

/// Public view of a registered method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodEntry {
    pub id: MethodId,
    pub signature: Vec<SigType>,
    pub handle: ImplHandle,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredMethod {
    pub id: MethodId,
    pub signature: Vec<SigType>,
    pub slots: Vec<Slot>,
    pub handle: ImplHandle,
}

impl StoredMethod {
    pub fn entry(&self) -> MethodEntry {
        MethodEntry {
            id: self.id,
            signature: self.signature.clone(),
            handle: self.handle,
        }
    }
}

/// Registered methods of every generic.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    methods: HashMap<GenericId, Vec<StoredMethod>>,
    next_id: u32,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method, replacing any method with the identical signature.
    ///
    /// Every class named in the signature must be registered in `classes`.
    /// `MISSING` is accepted only at optional slots, since a required
    /// argument is never absent.
    pub fn add(
        &mut self,
        generic: GenericId,
        generic_name: &str,
        shape: &GenericShape,
        signature: Vec<SigType>,
        handle: ImplHandle,
        classes: &ClassGraph,
    ) -> DispatchResult<MethodId> {
        let slots = Self::resolve_slots(generic_name, shape, &signature, classes)?;
        let methods = self.methods.entry(generic).or_default();

        if let Some(existing) = methods.iter_mut().find(|m| m.signature == signature) {
            existing.slots = slots;
            existing.handle = handle;
            tracing::debug!(
                generic = generic_name,
                signature = %render_tuple(&signature),
                "replaced method"
            );
            return Ok(existing.id);
        }

        let id = MethodId(self.next_id);
        self.next_id += 1;
        tracing::debug!(
            generic = generic_name,
            signature = %render_tuple(&signature),
            method = id.0,
            "added method"
        );
        methods.push(StoredMethod {
            id,
            signature,
            slots,
            handle,
        });
        Ok(id)
    }

    fn resolve_slots(
        generic_name: &str,
        shape: &GenericShape,
        signature: &[SigType],
        classes: &ClassGraph,
    ) -> DispatchResult<Vec<Slot>> {
        if signature.len() != shape.dispatch_arity() {
            return Err(DispatchError::invalid_signature(
                generic_name,
                render_tuple(signature),
                format!(
                    "expected {} dispatch type(s), got {}",
                    shape.dispatch_arity(),
                    signature.len()
                ),
            ));
        }
        signature
            .iter()
            .enumerate()
            .map(|(slot, ty)| match ty {
                SigType::Any => Ok(Slot::Any),
                SigType::Missing if shape.is_optional_slot(slot) => Ok(Slot::Missing),
                SigType::Missing => Err(DispatchError::invalid_signature(
                    generic_name,
                    render_tuple(signature),
                    format!("MISSING at required slot {}", slot),
                )),
                SigType::Class(name) => classes.id(name).map(Slot::Class).ok_or_else(|| {
                    DispatchError::invalid_signature(
                        generic_name,
                        render_tuple(signature),
                        format!("unknown type `{}`", name),
                    )
                }),
            })
            .collect()
    }

    /// Remove the method with exactly this signature. Returns its id if one
    /// was registered.
    pub fn remove(&mut self, generic: GenericId, signature: &[SigType]) -> Option<MethodId> {
        let methods = self.methods.get_mut(&generic)?;
        let pos = methods.iter().position(|m| m.signature == signature)?;
        let removed = methods.remove(pos);
        tracing::debug!(
            signature = %render_tuple(signature),
            method = removed.id.0,
            "removed method"
        );
        Some(removed.id)
    }

    /// All registered methods of a generic, in registration order.
    pub(crate) fn candidates(&self, generic: GenericId) -> &[StoredMethod] {
        self.methods.get(&generic).map_or(&[], Vec::as_slice)
    }

    /// Public listing of a generic's methods.
    pub fn methods(&self, generic: GenericId) -> Vec<MethodEntry> {
        self.candidates(generic)
            .iter()
            .map(StoredMethod::entry)
            .collect()
    }

    /// Registered signature tuples of a generic (unordered).
    pub fn signatures(&self, generic: GenericId) -> Vec<Vec<SigType>> {
        self.candidates(generic)
            .iter()
            .map(|m| m.signature.clone())
            .collect()
    }

    pub fn len(&self, generic: GenericId) -> usize {
        self.candidates(generic).len()
    }

    pub fn clear(&mut self) {
        self.methods.clear();
        self.next_id = 0;
    }
}
