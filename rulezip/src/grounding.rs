//! This module defines the grounding layer: for every candidate rule it
//! tracks which facts the rule entails, either by full recomputation or
//! through an incremental, copy-on-write compliance-set cache.

use std::collections::HashSet;

use enum_dispatch::enum_dispatch;
use thiserror::Error;

use crate::kb::{ConstantId, FactIndex, GroundFact, KnowledgeBase};
use crate::model::argument::Argument;
use crate::model::predicate::{ArgPos, Predicate};

/// Module to define [ComplianceBlock][block::ComplianceBlock]
pub(crate) mod block;
/// Module to define [IncrementalGrounding]
pub mod incremental;
pub use incremental::IncrementalGrounding;
/// Module to define [RecalculatingGrounding]
pub mod recalculating;
pub use recalculating::RecalculatingGrounding;

/// Requested direction is not supported by the grounding backend.
/// The incremental cache cannot undo a binding; only the recalculating
/// backend accepts [CacheUpdate::Relax].
#[derive(Debug, Clone, Copy, Error)]
#[error("the incremental grounding cache does not support generalization")]
pub struct UnsupportedUpdate;

/// One structural change of a rule, phrased as a cache maintenance step.
/// A specialization operator translates into one or two of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheUpdate {
    /// A new body atom of `relation` was appended; add its unrestricted
    /// fact set to every cache row.
    Extend {
        /// Relation of the appended atom.
        relation: crate::kb::RelationId,
    },
    /// Two slots are now forced equal; split every row by the values
    /// shared between both slots' compliance sets.
    Join {
        /// The slot that was just bound.
        first: ArgPos,
        /// A previously existing occurrence of the same variable.
        second: ArgPos,
    },
    /// A slot was bound to a constant; narrow its compliance set.
    Restrict {
        /// The bound slot.
        position: ArgPos,
        /// The constant it was bound to.
        constant: ConstantId,
    },
    /// A slot was unbound (generalization).
    Relax {
        /// The freed slot.
        position: ArgPos,
    },
}

/// Entailment counts of one rule, read off the grounding backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntailmentCounts {
    /// Distinct facts of the target relation the rule entails.
    pub covered: usize,
    /// Covered facts not already marked entailed by an earlier rule.
    pub positives: usize,
    /// Covered facts that were already marked entailed.
    pub already_entailed: usize,
    /// Reachable head instantiations, already-entailed facts subtracted.
    pub total: f64,
}

/// One grounding witness: a covered head fact together with one body fact
/// per body atom that derives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence {
    /// Index of the derived fact within the head relation.
    pub head: FactIndex,
    /// Supporting facts, one per body atom in atom order.
    pub body: Vec<GroundFact>,
}

/// The operations a rule needs from its grounding strategy.
#[enum_dispatch]
pub trait GroundingBackend {
    /// Applies one structural change. Fails only for directions the
    /// backend does not support.
    fn apply(
        &mut self,
        update: &CacheUpdate,
        predicates: &[Predicate],
        kb: &KnowledgeBase,
    ) -> Result<(), UnsupportedUpdate>;

    /// Computes the entailment counts of the current rule state.
    fn entailment_counts(&self, predicates: &[Predicate], kb: &KnowledgeBase) -> EntailmentCounts;

    /// Extracts one grounding witness per distinct covered head fact.
    fn evidence(&self, predicates: &[Predicate], kb: &KnowledgeBase) -> Vec<Evidence>;
}

/// The grounding strategy of one rule, selected once at construction.
#[enum_dispatch(GroundingBackend)]
#[derive(Debug, Clone)]
pub enum Grounding {
    /// Stateless reference backend; recomputes everything on demand.
    Recalculating(RecalculatingGrounding),
    /// Incremental copy-on-write compliance-set cache.
    Incremental(IncrementalGrounding),
}

/// Strategy selector passed to rule constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroundingMode {
    /// Use [RecalculatingGrounding].
    Recalculating,
    /// Use [IncrementalGrounding].
    #[default]
    Incremental,
}

/// How the head of a rule is instantiated from a body grounding:
/// which head variables take their values from the body, and how many
/// independent free choices over the constant domain remain.
#[derive(Debug, Clone)]
pub(crate) struct HeadProfile {
    /// Distinct head variables with a body occurrence, in head order,
    /// each with one representative body slot.
    pub(crate) linked: Vec<(usize, ArgPos)>,
    /// Number of empty head slots plus distinct head-only variables;
    /// each contributes a factor of `|constants|` to the total.
    pub(crate) free_exponent: usize,
}

impl HeadProfile {
    /// Derives the profile from a rule's predicates.
    pub(crate) fn of(predicates: &[Predicate]) -> Self {
        let head = &predicates[0];

        let mut linked = Vec::new();
        let mut seen = HashSet::new();
        let mut head_only = HashSet::new();
        let mut empty_slots = 0;

        for argument in &head.args {
            match argument {
                Argument::Empty => empty_slots += 1,
                Argument::Constant(_) => {}
                Argument::Variable(id) => {
                    if seen.insert(*id) {
                        match body_occurrence(predicates, *id) {
                            Some(position) => linked.push((*id, position)),
                            None => {
                                head_only.insert(*id);
                            }
                        }
                    }
                }
            }
        }

        Self {
            linked,
            free_exponent: empty_slots + head_only.len(),
        }
    }

    /// Expands a body-binding count into the total number of reachable
    /// head instantiations, subtracting the already-entailed ones.
    pub(crate) fn expanded_total(
        &self,
        base: usize,
        kb: &KnowledgeBase,
        already_entailed: usize,
    ) -> f64 {
        base as f64 * (kb.constant_count() as f64).powi(self.free_exponent as i32)
            - already_entailed as f64
    }
}

/// Returns the first body occurrence of a variable, if any.
pub(crate) fn body_occurrence(predicates: &[Predicate], variable: usize) -> Option<ArgPos> {
    predicates
        .iter()
        .enumerate()
        .skip(1)
        .find_map(|(predicate_index, predicate)| {
            predicate
                .args
                .iter()
                .position(|argument| argument.variable() == Some(variable))
                .map(|argument_index| ArgPos::new(predicate_index, argument_index))
        })
}

#[cfg(test)]
mod test {
    use crate::model::argument::Argument::{Constant, Empty, Variable};
    use crate::model::predicate::{ArgPos, Predicate};

    use super::{body_occurrence, HeadProfile};

    fn predicate(relation: usize, args: &[super::Argument]) -> Predicate {
        Predicate {
            relation,
            args: args.to_vec(),
        }
    }

    #[test]
    fn profile_of_linked_head() {
        // h(X0,X1) :- p(X0,X2), p(X2,X1)
        let predicates = [
            predicate(0, &[Variable(0), Variable(1)]),
            predicate(1, &[Variable(0), Variable(2)]),
            predicate(1, &[Variable(2), Variable(1)]),
        ];
        let profile = HeadProfile::of(&predicates);

        assert_eq!(
            profile.linked,
            vec![(0, ArgPos::new(1, 0)), (1, ArgPos::new(2, 1))]
        );
        assert_eq!(profile.free_exponent, 0);
    }

    #[test]
    fn profile_of_free_head() {
        // h(X0,?,#2) :- (fact rule, X0 occurs twice in the head only)
        let predicates = [predicate(0, &[Variable(0), Empty, Constant(2), Variable(0)])];
        let profile = HeadProfile::of(&predicates);

        assert!(profile.linked.is_empty());
        // one empty slot and one head-only variable
        assert_eq!(profile.free_exponent, 2);
    }

    #[test]
    fn first_body_occurrence_wins() {
        let predicates = [
            predicate(0, &[Variable(0), Empty]),
            predicate(1, &[Empty, Variable(0)]),
            predicate(2, &[Variable(0), Empty]),
        ];
        assert_eq!(body_occurrence(&predicates, 0), Some(ArgPos::new(1, 1)));
        assert_eq!(body_occurrence(&predicates, 3), None);
    }
}
