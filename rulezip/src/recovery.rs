//! This module defines the recovery side of the compressor: re-deriving
//! the original knowledge base from a [CompressionResult] and checking the
//! round trip for exactness.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;

use crate::compress::CompressionResult;
use crate::error::Error;
use crate::grounding::recalculating::for_each_body_grounding;
use crate::kb::{ConstantId, KnowledgeBase, RelationId};
use crate::model::argument::Argument;
use crate::model::predicate::Predicate;

/// One head slot of an instantiation template: either already determined
/// or a free choice over the constant domain.
enum Slot {
    Fixed(ConstantId),
    Choice(usize),
}

/// Computes every head tuple a rule derives over the given knowledge base.
/// Vacant head slots and head variables without a body occurrence range
/// over `domain`; repeated occurrences of the same head variable stay equal.
pub(crate) fn derive_head_facts(
    predicates: &[Predicate],
    kb: &KnowledgeBase,
    domain: &[ConstantId],
) -> HashSet<Box<[ConstantId]>> {
    let mut derived = HashSet::new();

    for_each_body_grounding(predicates, kb, &mut |assignment, _chosen| {
        let head = &predicates[0];
        let mut free_vars: HashMap<usize, usize> = HashMap::new();
        let mut choices = 0;
        let slots: Vec<Slot> = head
            .args
            .iter()
            .map(|argument| match argument {
                Argument::Constant(value) => Slot::Fixed(*value),
                Argument::Variable(id) => match assignment.get(id) {
                    Some(&value) => Slot::Fixed(value),
                    None => {
                        let index = *free_vars.entry(*id).or_insert_with(|| {
                            choices += 1;
                            choices - 1
                        });
                        Slot::Choice(index)
                    }
                },
                Argument::Empty => {
                    choices += 1;
                    Slot::Choice(choices - 1)
                }
            })
            .collect();

        if choices == 0 {
            derived.insert(
                slots
                    .iter()
                    .map(|slot| match slot {
                        Slot::Fixed(value) => *value,
                        Slot::Choice(_) => 0,
                    })
                    .collect(),
            );
            return;
        }

        for combination in (0..choices)
            .map(|_| domain.iter().copied())
            .multi_cartesian_product()
        {
            derived.insert(
                slots
                    .iter()
                    .map(|slot| match slot {
                        Slot::Fixed(value) => *value,
                        Slot::Choice(index) => combination[*index],
                    })
                    .collect(),
            );
        }
    });

    derived
}

/// Re-derives a knowledge base from a compression result: the necessary
/// facts are taken as given and the rules are applied to a fixpoint, with
/// the recorded counterexamples withheld as they come up.
pub fn reconstruct(
    original: &KnowledgeBase,
    result: &CompressionResult,
) -> Result<KnowledgeBase, Error> {
    let mut kb = KnowledgeBase::empty_like(original);
    for &fact in &result.necessary {
        kb.add_fact(fact.relation, original.fact(fact))?;
    }

    let domain = constant_domain(original, result);
    let counterexamples: HashSet<(RelationId, &[ConstantId])> = result
        .counterexamples
        .iter()
        .map(|(relation, tuple)| (*relation, tuple.as_ref()))
        .collect();

    // Every grounding witness rests on original facts only, so skipping
    // the counterexample tuples keeps the closure inside the original
    // fact set; letting them in would feed later rule applications.
    let mut changed = true;
    while changed {
        changed = false;
        for rule in &result.rules {
            let relation = rule.head().relation;
            for tuple in derive_head_facts(rule.predicates(), &kb, &domain) {
                if counterexamples.contains(&(relation, &tuple[..])) {
                    continue;
                }
                if kb.add_fact(relation, &tuple)? {
                    changed = true;
                }
            }
        }
    }

    Ok(kb)
}

/// True if reconstructing from `result` yields exactly the facts of
/// `original`, relation by relation.
pub fn validate(original: &KnowledgeBase, result: &CompressionResult) -> Result<bool, Error> {
    let recovered = reconstruct(original, result)?;

    for (expected, actual) in original.relations().zip(recovered.relations()) {
        let expected_facts: HashSet<&[ConstantId]> = expected.facts().collect();
        let actual_facts: HashSet<&[ConstantId]> = actual.facts().collect();
        if expected_facts != actual_facts {
            log::warn!(
                "relation {} recovered {} of {} facts",
                expected.name(),
                (&expected_facts & &actual_facts).len(),
                expected.len()
            );
            return Ok(false);
        }
    }
    Ok(true)
}

/// The constant domain free head slots range over: every constant that is
/// mentioned by the compression result itself.
fn constant_domain(original: &KnowledgeBase, result: &CompressionResult) -> Vec<ConstantId> {
    let mut domain: HashSet<ConstantId> = result.supplementary_constants.iter().copied().collect();

    for &fact in &result.necessary {
        domain.extend(original.fact(fact).iter().copied());
    }
    for (_, tuple) in &result.counterexamples {
        domain.extend(tuple.iter().copied());
    }
    for rule in &result.rules {
        for predicate in rule.predicates() {
            for argument in &predicate.args {
                if let Argument::Constant(value) = argument {
                    domain.insert(*value);
                }
            }
        }
    }

    let mut domain: Vec<ConstantId> = domain.into_iter().collect();
    domain.sort_unstable();
    domain
}
