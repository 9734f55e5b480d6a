//! Generic operations and their dispatch shapes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, DispatchResult};

/// Index of a defined generic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GenericId(u32);

impl GenericId {
    #[cfg(test)]
    pub(crate) fn from_raw(raw: u32) -> Self {
        GenericId(raw)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which parameters of a generic take part in dispatch.
///
/// Signatures and observed tuples are indexed by *slot*: slot `i` corresponds
/// to parameter `dispatch_positions[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenericShape {
    /// Total number of parameters.
    pub arity: usize,
    /// Parameter positions that participate in dispatch, in slot order.
    pub dispatch_positions: Vec<usize>,
    /// Parameter positions whose argument may be omitted at a call site.
    #[serde(default)]
    pub optional_positions: Vec<usize>,
}

impl GenericShape {
    pub fn new(arity: usize, dispatch_positions: Vec<usize>, optional_positions: Vec<usize>) -> Self {
        Self {
            arity,
            dispatch_positions,
            optional_positions,
        }
    }

    /// Shape where every parameter dispatches and none is optional.
    pub fn all_positions(arity: usize) -> Self {
        Self::new(arity, (0..arity).collect(), Vec::new())
    }

    /// Number of dispatch slots (signature tuple length).
    pub fn dispatch_arity(&self) -> usize {
        self.dispatch_positions.len()
    }

    /// True if the argument for dispatch slot `slot` may be absent.
    pub fn is_optional_slot(&self, slot: usize) -> bool {
        self.dispatch_positions
            .get(slot)
            .is_some_and(|pos| self.optional_positions.contains(pos))
    }

    /// Pick the dispatch arguments out of a full argument list.
    ///
    /// Returns `None` if `args` does not have exactly `arity` entries, or if
    /// a dispatch position falls outside them.
    pub fn project<'a, T>(&self, args: &'a [T]) -> Option<Vec<&'a T>> {
        if args.len() != self.arity {
            return None;
        }
        self.dispatch_positions.iter().map(|&p| args.get(p)).collect()
    }

    fn validate(&self, name: &str) -> DispatchResult<()> {
        let mut seen = vec![false; self.arity];
        for &pos in &self.dispatch_positions {
            if pos >= self.arity {
                return Err(DispatchError::invalid_shape(
                    name,
                    format!("dispatch position {} is outside arity {}", pos, self.arity),
                ));
            }
            if std::mem::replace(&mut seen[pos], true) {
                return Err(DispatchError::invalid_shape(
                    name,
                    format!("dispatch position {} listed twice", pos),
                ));
            }
        }
        let mut optional = vec![false; self.arity];
        for &pos in &self.optional_positions {
            if !self.dispatch_positions.contains(&pos) {
                return Err(DispatchError::invalid_shape(
                    name,
                    format!("optional position {} is not a dispatch position", pos),
                ));
            }
            if std::mem::replace(&mut optional[pos], true) {
                return Err(DispatchError::invalid_shape(
                    name,
                    format!("optional position {} listed twice", pos),
                ));
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for GenericShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "arity {}, dispatch {:?}, optional {:?}",
            self.arity, self.dispatch_positions, self.optional_positions
        )
    }
}

#[derive(Debug, Clone)]
struct GenericEntry {
    name: String,
    shape: GenericShape,
}

/// Defined generics, addressed by name or id.
#[derive(Debug, Clone, Default)]
pub struct GenericTable {
    entries: Vec<GenericEntry>,
    by_name: HashMap<String, GenericId>,
}

impl GenericTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a generic. Redefining with an identical shape is a no-op that
    /// returns the existing id; a different shape is rejected.
    pub fn define(&mut self, name: &str, shape: GenericShape) -> DispatchResult<GenericId> {
        shape.validate(name)?;
        if let Some(&id) = self.by_name.get(name) {
            let existing = &self.entries[id.index()].shape;
            if *existing != shape {
                return Err(DispatchError::DuplicateGeneric {
                    name: name.to_string(),
                    existing: existing.to_string(),
                });
            }
            return Ok(id);
        }
        let id = GenericId(self.entries.len() as u32);
        self.entries.push(GenericEntry {
            name: name.to_string(),
            shape,
        });
        self.by_name.insert(name.to_string(), id);
        tracing::debug!(generic = name, id = id.0, "defined generic");
        Ok(id)
    }

    pub fn id(&self, name: &str) -> Option<GenericId> {
        self.by_name.get(name).copied()
    }

    /// Shape of a generic by name.
    pub fn lookup(&self, name: &str) -> DispatchResult<&GenericShape> {
        self.id(name)
            .map(|id| self.shape(id))
            .ok_or_else(|| DispatchError::UnknownGeneric(name.to_string()))
    }

    pub fn shape(&self, id: GenericId) -> &GenericShape {
        &self.entries[id.index()].shape
    }

    pub fn name(&self, id: GenericId) -> &str {
        &self.entries[id.index()].name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Generics in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (GenericId, &str, &GenericShape)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (GenericId(i as u32), e.name.as_str(), &e.shape))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_name.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_is_idempotent_for_identical_shape() {
        let mut table = GenericTable::new();
        let first = table
            .define("area", GenericShape::new(2, vec![0, 1], vec![1]))
            .unwrap();
        let again = table
            .define("area", GenericShape::new(2, vec![0, 1], vec![1]))
            .unwrap();
        assert_eq!(first, again);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_define_rejects_different_shape() {
        let mut table = GenericTable::new();
        table.define("area", GenericShape::all_positions(1)).unwrap();
        let err = table
            .define("area", GenericShape::all_positions(2))
            .unwrap_err();
        assert!(matches!(err, DispatchError::DuplicateGeneric { ref name, .. } if name == "area"));
        assert_eq!(table.lookup("area").unwrap().arity, 1);
    }

    #[test]
    fn test_shape_validation() {
        let mut table = GenericTable::new();
        assert!(matches!(
            table.define("f", GenericShape::new(2, vec![2], vec![])),
            Err(DispatchError::InvalidShape { .. })
        ));
        assert!(matches!(
            table.define("f", GenericShape::new(2, vec![0, 0], vec![])),
            Err(DispatchError::InvalidShape { .. })
        ));
        assert!(matches!(
            table.define("f", GenericShape::new(3, vec![0], vec![2])),
            Err(DispatchError::InvalidShape { .. })
        ));
        assert!(matches!(
            table.define("f", GenericShape::new(2, vec![0, 1], vec![1, 1])),
            Err(DispatchError::InvalidShape { .. })
        ));
        assert!(table.is_empty());
        // The single-listing form is then accepted as a fresh definition
        table
            .define("f", GenericShape::new(2, vec![0, 1], vec![1]))
            .unwrap();
    }

    #[test]
    fn test_lookup_unknown_generic() {
        let table = GenericTable::new();
        assert_eq!(
            table.lookup("nope").unwrap_err(),
            DispatchError::UnknownGeneric("nope".to_string())
        );
    }

    #[test]
    fn test_optional_slots_follow_dispatch_order() {
        // Parameters 3 and 1 dispatch, in that slot order; parameter 1 is optional.
        let shape = GenericShape::new(4, vec![3, 1], vec![1]);
        assert_eq!(shape.dispatch_arity(), 2);
        assert!(!shape.is_optional_slot(0));
        assert!(shape.is_optional_slot(1));
        assert!(!shape.is_optional_slot(2));
    }

    #[test]
    fn test_project_picks_dispatch_arguments() {
        let shape = GenericShape::new(3, vec![2, 0], vec![]);
        let args = ["x", "y", "z"];
        assert_eq!(shape.project(&args), Some(vec![&"z", &"x"]));
        assert_eq!(shape.project(&args[..2]), None);
    }

    #[test]
    fn test_project_unvalidated_shape_returns_none() {
        // Shapes built directly are not validated until defined
        let shape = GenericShape::new(1, vec![5], vec![]);
        assert_eq!(shape.project(&["x"]), None);
    }
}
