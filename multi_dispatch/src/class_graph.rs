//! Class graph for multiple-inheritance dispatch.
//!
//! Classes live in an arena addressed by [`ClassId`]; each node keeps its
//! direct parents as ids. The parent relation is a DAG, checked when a class
//! is registered, so traversals need no cycle guards.
//!
//! ```text
//!        ANY (implicit, not stored)
//!         |
//!         R
//!        / \
//!       B   C
//!        \ /
//!         D        distance(D, R) == 2 along either path
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, DispatchResult};
use crate::types::{ANY, MISSING};

/// Arena index of a registered class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(u32);

impl ClassId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Registration metadata for a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    /// Unique class name.
    pub name: String,
    /// Direct parents, in declaration order. Empty means the class derives
    /// only from the universal root.
    #[serde(default)]
    pub parents: Vec<String>,
    /// Virtual classes carry shared behaviour and are never instantiated.
    #[serde(default)]
    pub is_virtual: bool,
}

impl ClassDescriptor {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            parents: Vec::new(),
            is_virtual: false,
        }
    }

    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parents = parents.into_iter().map(Into::into).collect();
        self
    }

    pub fn virtual_class(mut self) -> Self {
        self.is_virtual = true;
        self
    }
}

#[derive(Debug, Clone)]
struct ClassNode {
    descriptor: ClassDescriptor,
    parents: Vec<ClassId>,
}

/// Registered classes and their direct parent edges.
#[derive(Debug, Clone, Default)]
pub struct ClassGraph {
    nodes: Vec<ClassNode>,
    by_name: HashMap<String, ClassId>,
}

impl ClassGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class, or redefine it if the name is already taken.
    ///
    /// Redefinition keeps the class id, so descendants and registered method
    /// signatures follow the new parent list. Values tagged before the
    /// redefinition are not revisited.
    pub fn register(&mut self, descriptor: ClassDescriptor) -> DispatchResult<ClassId> {
        let name = descriptor.name.clone();
        if name == ANY || name == MISSING {
            return Err(DispatchError::ReservedName(name));
        }

        let mut seen = HashSet::new();
        let mut parent_names = Vec::with_capacity(descriptor.parents.len());
        let mut parent_ids = Vec::with_capacity(descriptor.parents.len());
        for parent in &descriptor.parents {
            if !seen.insert(parent.as_str()) {
                continue;
            }
            let existing = self.by_name.get(parent).copied();
            let Some(pid) = existing else {
                return Err(DispatchError::UnknownParent {
                    class: name,
                    parent: parent.clone(),
                });
            };
            parent_names.push(parent.clone());
            parent_ids.push(pid);
        }

        if let Some(&id) = self.by_name.get(&name) {
            // The new edge id -> p closes a cycle iff id is already reachable
            // from p (including p == id).
            for (pid, pname) in parent_ids.iter().zip(&parent_names) {
                if self.distance(*pid, id).is_some() {
                    return Err(DispatchError::CyclicInheritance {
                        class: name,
                        parent: pname.clone(),
                    });
                }
            }
            let node = &mut self.nodes[id.index()];
            node.descriptor = ClassDescriptor {
                name,
                parents: parent_names,
                is_virtual: descriptor.is_virtual,
            };
            node.parents = parent_ids;
            tracing::debug!(class = %node.descriptor.name, "redefined class");
            return Ok(id);
        }

        let id = ClassId(self.nodes.len() as u32);
        self.nodes.push(ClassNode {
            descriptor: ClassDescriptor {
                name: name.clone(),
                parents: parent_names,
                is_virtual: descriptor.is_virtual,
            },
            parents: parent_ids,
        });
        tracing::debug!(class = %name, id = id.0, "registered class");
        self.by_name.insert(name, id);
        Ok(id)
    }

    pub fn id(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Name of a registered class.
    pub fn name(&self, id: ClassId) -> &str {
        &self.nodes[id.index()].descriptor.name
    }

    pub fn descriptor(&self, id: ClassId) -> &ClassDescriptor {
        &self.nodes[id.index()].descriptor
    }

    pub fn get(&self, name: &str) -> Option<&ClassDescriptor> {
        self.id(name).map(|id| self.descriptor(id))
    }

    pub fn parents(&self, id: ClassId) -> &[ClassId] {
        &self.nodes[id.index()].parents
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &ClassDescriptor)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (ClassId(i as u32), &node.descriptor))
    }

    /// Minimum number of parent edges from `from` up to `to`.
    ///
    /// `Some(0)` when the classes are the same, `None` when `to` is not an
    /// ancestor of `from`.
    pub fn distance(&self, from: ClassId, to: ClassId) -> Option<u32> {
        self.ancestors(from)
            .find(|(ancestor, _)| *ancestor == to)
            .map(|(_, d)| d)
    }

    /// True when `sub` is `sup` or one of its descendants.
    pub fn is_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        self.distance(sub, sup).is_some()
    }

    /// Breadth-first walk over `class` and its ancestors.
    ///
    /// Yields `(ancestor, distance)` in non-decreasing distance order,
    /// starting with `(class, 0)`. Each ancestor appears once, at its
    /// shortest distance. Every call starts a fresh walk.
    pub fn ancestors(&self, class: ClassId) -> Ancestors<'_> {
        let mut queue = VecDeque::new();
        queue.push_back((class, 0));
        let mut visited = HashSet::new();
        visited.insert(class);
        Ancestors {
            graph: self,
            queue,
            visited,
        }
    }

    /// Shortest distance to every ancestor of `class`, itself included.
    pub fn ancestor_distances(&self, class: ClassId) -> HashMap<ClassId, u32> {
        self.ancestors(class).collect()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.by_name.clear();
    }
}

/// Lazy breadth-first ancestor sequence. See [`ClassGraph::ancestors`].
#[derive(Debug)]
pub struct Ancestors<'g> {
    graph: &'g ClassGraph,
    queue: VecDeque<(ClassId, u32)>,
    visited: HashSet<ClassId>,
}

impl Iterator for Ancestors<'_> {
    type Item = (ClassId, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let (class, dist) = self.queue.pop_front()?;
        for &parent in self.graph.parents(class) {
            if self.visited.insert(parent) {
                self.queue.push_back((parent, dist + 1));
            }
        }
        Some((class, dist))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> (ClassGraph, [ClassId; 4]) {
        let mut g = ClassGraph::new();
        let r = g.register(ClassDescriptor::new("R")).unwrap();
        let b = g
            .register(ClassDescriptor::new("B").with_parents(["R"]))
            .unwrap();
        let c = g
            .register(ClassDescriptor::new("C").with_parents(["R"]))
            .unwrap();
        let d = g
            .register(ClassDescriptor::new("D").with_parents(["B", "C"]))
            .unwrap();
        (g, [r, b, c, d])
    }

    #[test]
    fn test_distance_self_and_parent() {
        let mut g = ClassGraph::new();
        let animal = g.register(ClassDescriptor::new("Animal")).unwrap();
        let dog = g
            .register(ClassDescriptor::new("Dog").with_parents(["Animal"]))
            .unwrap();
        assert_eq!(g.distance(dog, dog), Some(0));
        assert_eq!(g.distance(dog, animal), Some(1));
        // Distances only go upward
        assert_eq!(g.distance(animal, dog), None);
    }

    #[test]
    fn test_diamond_distance_is_minimum() {
        let (g, [r, b, c, d]) = diamond();
        assert_eq!(g.distance(d, r), Some(2));
        assert_eq!(g.distance(d, b), Some(1));
        assert_eq!(g.distance(d, c), Some(1));
        assert_eq!(g.distance(b, c), None);
    }

    #[test]
    fn test_shortcut_edge_wins() {
        // E -> D -> B -> R, and E -> R directly
        let (mut g, [r, _, _, _]) = diamond();
        let e = g
            .register(ClassDescriptor::new("E").with_parents(["D", "R"]))
            .unwrap();
        assert_eq!(g.distance(e, r), Some(1));
    }

    #[test]
    fn test_ancestors_in_distance_order() {
        let (g, [r, b, c, d]) = diamond();
        let walk: Vec<(ClassId, u32)> = g.ancestors(d).collect();
        assert_eq!(walk, vec![(d, 0), (b, 1), (c, 1), (r, 2)]);
        // Restartable: a second walk yields the same sequence
        assert_eq!(g.ancestors(d).collect::<Vec<_>>(), walk);
        let distances: Vec<u32> = walk.iter().map(|(_, dist)| *dist).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_unknown_parent_rejected_without_effect() {
        let mut g = ClassGraph::new();
        let err = g
            .register(ClassDescriptor::new("Dog").with_parents(["Animal"]))
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::UnknownParent {
                class: "Dog".to_string(),
                parent: "Animal".to_string(),
            }
        );
        assert!(g.is_empty());
    }

    #[test]
    fn test_reserved_names_rejected() {
        let mut g = ClassGraph::new();
        assert!(matches!(
            g.register(ClassDescriptor::new("ANY")),
            Err(DispatchError::ReservedName(_))
        ));
        assert!(matches!(
            g.register(ClassDescriptor::new("MISSING")),
            Err(DispatchError::ReservedName(_))
        ));
    }

    #[test]
    fn test_redefinition_cycle_rejected() {
        let (mut g, [_, _, _, d]) = diamond();
        let err = g
            .register(ClassDescriptor::new("R").with_parents(["D"]))
            .unwrap_err();
        assert!(matches!(err, DispatchError::CyclicInheritance { .. }));
        // Rejected redefinition leaves the old edges in place
        assert_eq!(g.get("R").unwrap().parents, Vec::<String>::new());
        assert_eq!(g.distance(d, g.id("R").unwrap()), Some(2));
    }

    #[test]
    fn test_self_parent_rejected_on_redefinition() {
        let mut g = ClassGraph::new();
        g.register(ClassDescriptor::new("A")).unwrap();
        let err = g
            .register(ClassDescriptor::new("A").with_parents(["A"]))
            .unwrap_err();
        assert!(matches!(err, DispatchError::CyclicInheritance { .. }));
    }

    #[test]
    fn test_redefinition_keeps_id_and_updates_edges() {
        let (mut g, [r, b, _, d]) = diamond();
        g.register(ClassDescriptor::new("X")).unwrap();
        let redefined = g
            .register(ClassDescriptor::new("B").with_parents(["X"]))
            .unwrap();
        assert_eq!(redefined, b);
        let x = g.id("X").unwrap();
        assert_eq!(g.distance(d, x), Some(2));
        // D still reaches R through C
        assert_eq!(g.distance(d, r), Some(2));
        assert_eq!(g.distance(b, r), None);
    }

    #[test]
    fn test_duplicate_parents_collapsed() {
        let mut g = ClassGraph::new();
        g.register(ClassDescriptor::new("A")).unwrap();
        let b = g
            .register(ClassDescriptor::new("B").with_parents(["A", "A"]))
            .unwrap();
        assert_eq!(g.parents(b).len(), 1);
        assert_eq!(g.descriptor(b).parents, vec!["A".to_string()]);
    }

    #[test]
    fn test_virtual_flag_recorded() {
        let mut g = ClassGraph::new();
        let shape = g
            .register(ClassDescriptor::new("Shape").virtual_class())
            .unwrap();
        assert!(g.descriptor(shape).is_virtual);
        assert_eq!(g.name(shape), "Shape");
    }
}
