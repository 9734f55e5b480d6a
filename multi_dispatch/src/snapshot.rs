//! Serializable export of a context's registries.
//!
//! A snapshot lists every class after its parents, then generics and methods
//! in registration order, so replaying it into an empty context rebuilds the
//! same dispatch behaviour.
//! Resolution cache contents and diagnostics are not part of a snapshot.

use serde::{Deserialize, Serialize};

use crate::class_graph::{ClassDescriptor, ClassGraph, ClassId};
use crate::context::{DispatchContext, Registry};
use crate::error::{DispatchError, DispatchResult};
use crate::generic::GenericShape;
use crate::method_table::ImplHandle;
use crate::types::SigType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSnapshot {
    /// Signature type names, `ANY`/`MISSING` included.
    pub signature: Vec<String>,
    pub handle: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericSnapshot {
    pub name: String,
    pub shape: GenericShape,
    pub methods: Vec<MethodSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub classes: Vec<ClassDescriptor>,
    pub generics: Vec<GenericSnapshot>,
}

impl RegistrySnapshot {
    pub(crate) fn capture(registry: &Registry) -> Self {
        let classes = parents_first(&registry.classes);
        let generics = registry
            .generics
            .iter()
            .map(|(gid, name, shape)| GenericSnapshot {
                name: name.to_string(),
                shape: shape.clone(),
                methods: registry
                    .methods
                    .methods(gid)
                    .into_iter()
                    .map(|m| MethodSnapshot {
                        signature: m.signature.iter().map(|t| t.name().to_string()).collect(),
                        handle: m.handle.0,
                    })
                    .collect(),
            })
            .collect();
        Self { classes, generics }
    }

    pub fn method_count(&self) -> usize {
        self.generics.iter().map(|g| g.methods.len()).sum()
    }

    pub fn to_json(&self) -> DispatchResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| DispatchError::Snapshot(e.to_string()))
    }

    pub fn from_json(src: &str) -> DispatchResult<Self> {
        serde_json::from_str(src).map_err(|e| DispatchError::Snapshot(e.to_string()))
    }

    /// Compact binary encoding.
    pub fn to_bytes(&self) -> DispatchResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| DispatchError::Snapshot(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> DispatchResult<Self> {
        bincode::deserialize(bytes).map_err(|e| DispatchError::Snapshot(e.to_string()))
    }

    /// Register everything in this snapshot into `ctx`, through the same
    /// calls a program would make. Stops at the first registration error.
    pub fn replay(&self, ctx: &DispatchContext) -> DispatchResult<()> {
        for class in &self.classes {
            ctx.register_descriptor(class.clone())?;
        }
        for generic in &self.generics {
            ctx.define_generic_shape(&generic.name, generic.shape.clone())?;
            for method in &generic.methods {
                ctx.define_method(
                    &generic.name,
                    method.signature.iter().map(|name| SigType::from_name(name)),
                    ImplHandle(method.handle),
                )?;
            }
        }
        tracing::debug!(
            classes = self.classes.len(),
            generics = self.generics.len(),
            methods = self.method_count(),
            "replayed registry snapshot"
        );
        Ok(())
    }
}

/// Class descriptors ordered so every parent precedes its children.
///
/// Arena order is not enough: a redefined class keeps its slot but may now
/// name a parent registered after it.
fn parents_first(classes: &ClassGraph) -> Vec<ClassDescriptor> {
    let mut emitted = vec![false; classes.len()];
    let mut out = Vec::with_capacity(classes.len());
    // Post-order walk; each frame is (class, index of the next parent to visit).
    let mut stack: Vec<(ClassId, usize)> = Vec::new();
    for (root, _) in classes.iter() {
        if std::mem::replace(&mut emitted[root.index()], true) {
            continue;
        }
        stack.push((root, 0));
        while let Some((id, next)) = stack.last_mut() {
            let id = *id;
            match classes.parents(id).get(*next) {
                Some(&parent) => {
                    *next += 1;
                    if !std::mem::replace(&mut emitted[parent.index()], true) {
                        stack.push((parent, 0));
                    }
                }
                None => {
                    stack.pop();
                    out.push(classes.descriptor(id).clone());
                }
            }
        }
    }
    out
}
