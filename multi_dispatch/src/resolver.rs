//! Dispatch resolution: pick the most specific applicable method.
//!
//! # Scoring
//!
//! Each dispatch slot contributes a distance:
//!
//! | signature entry | observed      | distance              |
//! |-----------------|---------------|-----------------------|
//! | `MISSING`       | absent        | 0                     |
//! | class `T`       | `T`           | 0                     |
//! | class `A`       | descendant    | graph distance        |
//! | `ANY`           | any present   | [`ANY_DISTANCE`]      |
//!
//! Any other pairing does not match. The total score is the sum over slots
//! and the lowest score wins. Equal lowest scores are an ambiguity, broken by
//! the lexicographically smallest signature tuple (compared by type name).

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::class_graph::{ClassGraph, ClassId};
use crate::method_table::{ImplHandle, MethodId, Slot, StoredMethod};
use crate::types::SigType;

/// Distance contributed by an `ANY` match.
///
/// Class ids are `u32`, so a graph path has fewer than `u32::MAX` edges and
/// any finite graph distance is strictly smaller than this.
pub const ANY_DISTANCE: u64 = u32::MAX as u64;

/// Observed classes at each slot; `None` marks an absent argument.
pub(crate) type ObservedKey = Vec<Option<ClassId>>;

/// An applicable method with its per-slot distances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedMethod {
    pub method: MethodId,
    pub handle: ImplHandle,
    pub signature: Vec<SigType>,
    pub distances: Vec<u64>,
    pub score: u64,
}

/// Result of an uncached resolution.
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    /// A winner, plus every signature that tied with it (empty when unique).
    Resolved {
        winner: RankedMethod,
        tied: Vec<Vec<SigType>>,
    },
    NoMethod,
}

/// Distance of one signature slot from one observed argument.
fn slot_distance(slot: Slot, observed: Option<&HashMap<ClassId, u32>>) -> Option<u64> {
    match (slot, observed) {
        (Slot::Missing, None) => Some(0),
        (_, None) | (Slot::Missing, Some(_)) => None,
        (Slot::Any, Some(_)) => Some(ANY_DISTANCE),
        (Slot::Class(class), Some(ancestors)) => ancestors.get(&class).map(|&d| u64::from(d)),
    }
}

/// Score every candidate against the observed classes and return those that
/// match at all slots, most specific first.
///
/// Order is `(score, signature)`, so the first entry is the resolver's
/// choice and ties appear in tie-break order.
pub(crate) fn rank(
    classes: &ClassGraph,
    candidates: &[StoredMethod],
    observed: &ObservedKey,
) -> Vec<RankedMethod> {
    // One breadth-first walk per present argument, shared by all candidates.
    let ancestors: Vec<Option<HashMap<ClassId, u32>>> = observed
        .iter()
        .map(|class| class.map(|c| classes.ancestor_distances(c)))
        .collect();

    let mut ranked: Vec<RankedMethod> = candidates
        .iter()
        .filter(|m| m.slots.len() == observed.len())
        .filter_map(|m| {
            let distances = m
                .slots
                .iter()
                .zip(&ancestors)
                .map(|(&slot, anc)| slot_distance(slot, anc.as_ref()))
                .collect::<Option<Vec<u64>>>()?;
            let score: u64 = distances.iter().sum();
            tracing::trace!(signature = ?m.signature, score, "applicable method");
            Some(RankedMethod {
                method: m.id,
                handle: m.handle,
                signature: m.signature.clone(),
                distances,
                score,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.score
            .cmp(&b.score)
            .then_with(|| a.signature.cmp(&b.signature))
    });
    ranked
}

/// Pick the winner out of a ranked list.
pub(crate) fn select(ranked: Vec<RankedMethod>) -> Outcome {
    let Some(best_score) = ranked.first().map(|m| m.score) else {
        return Outcome::NoMethod;
    };
    let mut best = ranked.into_iter().take_while(|m| m.score == best_score);
    let Some(winner) = best.next() else {
        return Outcome::NoMethod;
    };
    let rest: Vec<Vec<SigType>> = best.map(|m| m.signature).collect();
    let tied = if rest.is_empty() {
        Vec::new()
    } else {
        std::iter::once(winner.signature.clone())
            .chain(rest)
            .collect()
    };
    Outcome::Resolved { winner, tied }
}

/// Rank and select in one step.
pub(crate) fn resolve_uncached(
    classes: &ClassGraph,
    candidates: &[StoredMethod],
    observed: &ObservedKey,
) -> Outcome {
    select(rank(classes, candidates, observed))
}
