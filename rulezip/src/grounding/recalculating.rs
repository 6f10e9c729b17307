//! This module defines [RecalculatingGrounding], the stateless reference
//! backend that recomputes a rule's groundings from the knowledge base on
//! every query. It is the only backend that supports generalization.

use std::collections::{HashMap, HashSet};

use crate::kb::{ConstantId, FactIndex, GroundFact, KnowledgeBase};
use crate::model::argument::Argument;
use crate::model::predicate::Predicate;

use super::{
    CacheUpdate, EntailmentCounts, Evidence, GroundingBackend, HeadProfile, UnsupportedUpdate,
};

/// Stateless grounding backend: every query enumerates the body groundings
/// by a backtracking join over the knowledge base.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecalculatingGrounding;

impl RecalculatingGrounding {
    /// Creates the backend; it holds no state.
    pub fn new() -> Self {
        Self
    }
}

impl GroundingBackend for RecalculatingGrounding {
    fn apply(
        &mut self,
        _update: &CacheUpdate,
        _predicates: &[Predicate],
        _kb: &KnowledgeBase,
    ) -> Result<(), UnsupportedUpdate> {
        // Nothing is cached, so every direction is fine.
        Ok(())
    }

    fn entailment_counts(&self, predicates: &[Predicate], kb: &KnowledgeBase) -> EntailmentCounts {
        let profile = HeadProfile::of(predicates);
        let store = kb.relation(predicates[0].relation);

        let mut covered: HashSet<FactIndex> = HashSet::new();
        let mut tuples: HashSet<Vec<ConstantId>> = HashSet::new();

        for_each_body_grounding(predicates, kb, &mut |assignment, _chosen| {
            tuples.insert(
                profile
                    .linked
                    .iter()
                    .map(|(variable, _)| assignment[variable])
                    .collect(),
            );
            for fact in matching_head_facts(&predicates[0], assignment, kb) {
                covered.insert(fact);
            }
        });

        let already_entailed = covered
            .iter()
            .filter(|&&fact| store.is_entailed(fact))
            .count();
        let positives = covered.len() - already_entailed;

        EntailmentCounts {
            covered: covered.len(),
            positives,
            already_entailed,
            total: profile.expanded_total(tuples.len(), kb, already_entailed),
        }
    }

    fn evidence(&self, predicates: &[Predicate], kb: &KnowledgeBase) -> Vec<Evidence> {
        let mut seen: HashSet<FactIndex> = HashSet::new();
        let mut result = Vec::new();

        for_each_body_grounding(predicates, kb, &mut |assignment, chosen| {
            let body: Vec<GroundFact> = chosen
                .iter()
                .enumerate()
                .map(|(atom, &index)| GroundFact {
                    relation: predicates[atom + 1].relation,
                    index,
                })
                .collect();
            for fact in matching_head_facts(&predicates[0], assignment, kb) {
                if seen.insert(fact) {
                    result.push(Evidence {
                        head: fact,
                        body: body.clone(),
                    });
                }
            }
        });

        result
    }
}

/// Enumerates every assignment of facts to the body atoms that satisfies
/// the rule's shared variables, calling `visit` with the variable
/// assignment and the chosen fact per body atom.
pub(crate) fn for_each_body_grounding(
    predicates: &[Predicate],
    kb: &KnowledgeBase,
    visit: &mut dyn FnMut(&HashMap<usize, ConstantId>, &[FactIndex]),
) {
    let mut assignment = HashMap::new();
    let mut chosen = Vec::new();
    descend(predicates, kb, 1, &mut assignment, &mut chosen, visit);
}

fn descend(
    predicates: &[Predicate],
    kb: &KnowledgeBase,
    atom: usize,
    assignment: &mut HashMap<usize, ConstantId>,
    chosen: &mut Vec<FactIndex>,
    visit: &mut dyn FnMut(&HashMap<usize, ConstantId>, &[FactIndex]),
) {
    if atom == predicates.len() {
        visit(assignment, chosen);
        return;
    }

    let predicate = &predicates[atom];
    let store = kb.relation(predicate.relation);

    // Use a column index if some argument is already determined.
    let candidates: Vec<FactIndex> = predicate
        .args
        .iter()
        .enumerate()
        .find_map(|(column, argument)| match argument {
            Argument::Constant(value) => Some(store.with_value(column, *value).to_vec()),
            Argument::Variable(id) => assignment
                .get(id)
                .map(|&value| store.with_value(column, value).to_vec()),
            Argument::Empty => None,
        })
        .unwrap_or_else(|| (0..store.len()).collect());

    for fact_index in candidates {
        let fact = store.fact(fact_index);
        let mut newly_bound = Vec::new();
        let mut consistent = true;

        for (argument, &value) in predicate.args.iter().zip(fact) {
            match argument {
                Argument::Empty => {}
                Argument::Constant(expected) => {
                    if *expected != value {
                        consistent = false;
                        break;
                    }
                }
                Argument::Variable(id) => match assignment.get(id) {
                    Some(&bound) if bound != value => {
                        consistent = false;
                        break;
                    }
                    Some(_) => {}
                    None => {
                        assignment.insert(*id, value);
                        newly_bound.push(*id);
                    }
                },
            }
        }

        if consistent {
            chosen.push(fact_index);
            descend(predicates, kb, atom + 1, assignment, chosen, visit);
            chosen.pop();
        }
        for id in newly_bound {
            assignment.remove(&id);
        }
    }
}

/// Returns the facts of the head relation that match the head pattern under
/// the given body-variable assignment. Unassigned head variables and empty
/// slots match anything, but repeated head-only variables must agree.
pub(crate) fn matching_head_facts(
    head: &Predicate,
    assignment: &HashMap<usize, ConstantId>,
    kb: &KnowledgeBase,
) -> Vec<FactIndex> {
    let store = kb.relation(head.relation);

    let candidates: Vec<FactIndex> = head
        .args
        .iter()
        .enumerate()
        .find_map(|(column, argument)| match argument {
            Argument::Constant(value) => Some(store.with_value(column, *value).to_vec()),
            Argument::Variable(id) => assignment
                .get(id)
                .map(|&value| store.with_value(column, value).to_vec()),
            Argument::Empty => None,
        })
        .unwrap_or_else(|| (0..store.len()).collect());

    candidates
        .into_iter()
        .filter(|&fact_index| {
            let fact = store.fact(fact_index);
            let mut local: HashMap<usize, ConstantId> = HashMap::new();
            head.args
                .iter()
                .zip(fact)
                .all(|(argument, &value)| match argument {
                    Argument::Empty => true,
                    Argument::Constant(expected) => *expected == value,
                    Argument::Variable(id) => match assignment.get(id) {
                        Some(&bound) => bound == value,
                        None => *local.entry(*id).or_insert(value) == value,
                    },
                })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use crate::grounding::GroundingBackend;
    use crate::kb::KnowledgeBase;
    use crate::model::argument::Argument::{Constant, Empty, Variable};
    use crate::model::predicate::Predicate;

    use super::{for_each_body_grounding, RecalculatingGrounding};

    /// parent = {(a,b),(a,c),(b,d)}, father = {(a,b),(b,d)}, five constants.
    fn sample_kb() -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        for symbol in ["a", "b", "c", "d", "e"] {
            kb.symbols_mut().add_str(symbol);
        }
        let parent = kb.add_relation("parent", 2).unwrap();
        kb.add_fact(parent, &[0, 1]).unwrap();
        kb.add_fact(parent, &[0, 2]).unwrap();
        kb.add_fact(parent, &[1, 3]).unwrap();
        let father = kb.add_relation("father", 2).unwrap();
        kb.add_fact(father, &[0, 1]).unwrap();
        kb.add_fact(father, &[1, 3]).unwrap();
        kb
    }

    fn predicate(relation: usize, args: &[crate::model::argument::Argument]) -> Predicate {
        Predicate {
            relation,
            args: args.to_vec(),
        }
    }

    #[test]
    fn counts_simple_copy_rule() {
        let kb = sample_kb();
        // parent(X0,X1) :- father(X0,X1)
        let predicates = [
            predicate(0, &[Variable(0), Variable(1)]),
            predicate(1, &[Variable(0), Variable(1)]),
        ];

        let counts = RecalculatingGrounding::new().entailment_counts(&predicates, &kb);
        assert_eq!(counts.covered, 2);
        assert_eq!(counts.positives, 2);
        assert_eq!(counts.total, 2.0);
    }

    #[test]
    fn counts_projection_rule() {
        let kb = sample_kb();
        // parent(X0,?) :- father(X0,?)
        let predicates = [
            predicate(0, &[Variable(0), Empty]),
            predicate(1, &[Variable(0), Empty]),
        ];

        let counts = RecalculatingGrounding::new().entailment_counts(&predicates, &kb);
        // father subjects are a and b; all three parent facts match
        assert_eq!(counts.covered, 3);
        // two subjects, one free head slot over five constants
        assert_eq!(counts.total, 10.0);
    }

    #[test]
    fn constants_narrow_the_body() {
        let kb = sample_kb();
        // parent(#0,X0) :- father(#0,X0)
        let predicates = [
            predicate(0, &[Constant(0), Variable(0)]),
            predicate(1, &[Constant(0), Variable(0)]),
        ];

        let counts = RecalculatingGrounding::new().entailment_counts(&predicates, &kb);
        assert_eq!(counts.covered, 1);
        assert_eq!(counts.total, 1.0);
    }

    #[test]
    fn agreement_with_incremental_backend() {
        use crate::grounding::{CacheUpdate, IncrementalGrounding};
        use crate::model::predicate::ArgPos;

        let kb = sample_kb();
        // parent(X0,?) :- father(?,X0)
        let predicates = [
            predicate(0, &[Variable(0), Empty]),
            predicate(1, &[Empty, Variable(0)]),
        ];

        let recalculated = RecalculatingGrounding::new().entailment_counts(&predicates, &kb);

        let mut incremental = IncrementalGrounding::new(0, &kb);
        incremental
            .apply(&CacheUpdate::Extend { relation: 1 }, &predicates, &kb)
            .unwrap();
        incremental
            .apply(
                &CacheUpdate::Join {
                    first: ArgPos::new(1, 1),
                    second: ArgPos::new(0, 0),
                },
                &predicates,
                &kb,
            )
            .unwrap();
        let cached = incremental.entailment_counts(&predicates, &kb);

        assert_eq!(recalculated, cached);
    }

    #[test]
    fn body_enumeration_respects_shared_variables() {
        let kb = sample_kb();
        // :- parent(X0,X1), father(X1,?)
        let predicates = [
            predicate(0, &[Empty, Empty]),
            predicate(0, &[Variable(0), Variable(1)]),
            predicate(1, &[Variable(1), Empty]),
        ];

        let mut groundings = 0;
        for_each_body_grounding(&predicates, &kb, &mut |assignment, chosen| {
            groundings += 1;
            assert_eq!(chosen.len(), 2);
            assert_eq!(assignment.len(), 2);
        });
        // parent facts ending in b: (a,b); father subjects: a, b -> only (a,b)+father(b,d)
        assert_eq!(groundings, 1);
    }
}
