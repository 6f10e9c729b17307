//! This module defines [IncrementalGrounding], the copy-on-write compliance
//! cache that keeps a rule's entailments current across specializations
//! without re-scanning the knowledge base.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use itertools::Itertools;

use crate::kb::{ConstantId, FactIndex, GroundFact, KnowledgeBase, RelationId};
use crate::model::predicate::Predicate;

use super::block::ComplianceBlock;
use super::{
    CacheUpdate, EntailmentCounts, Evidence, GroundingBackend, HeadProfile, UnsupportedUpdate,
};

/// One cache row: one [ComplianceBlock] per tracked predicate.
///
/// Rows are never mutated after creation; every update builds a replacement
/// row list, reusing the untouched blocks by reference. A cloned rule
/// therefore shares all of its parent's rows until one of them mutates.
#[derive(Debug, Clone, Default)]
struct CacheEntry {
    blocks: Vec<Rc<ComplianceBlock>>,
}

/// Incremental grounding cache of one rule.
///
/// Two caches are maintained: `positive_entries` includes the head block
/// and yields the covered facts of the target relation; `body_entries`
/// excludes the head and yields the body-binding combinations that the
/// total-entailment count is derived from. A variable with a single body
/// occurrence is never joined in `body_entries`; its values are only read
/// off when entailments are counted.
#[derive(Debug, Clone)]
pub struct IncrementalGrounding {
    /// Rows covering every predicate, head at block index 0.
    positive_entries: Vec<CacheEntry>,
    /// Rows covering the body only; block `i` belongs to predicate `i + 1`.
    body_entries: Vec<CacheEntry>,
}

impl IncrementalGrounding {
    /// Seeds the cache for a most-general rule of `relation`:
    /// one row per cache, the head restricted by nothing.
    pub fn new(relation: RelationId, kb: &KnowledgeBase) -> Self {
        Self {
            positive_entries: vec![CacheEntry {
                blocks: vec![ComplianceBlock::full(relation, kb)],
            }],
            body_entries: vec![CacheEntry::default()],
        }
    }

    /// Number of rows in the head-inclusive cache.
    pub(crate) fn positive_rows(&self) -> usize {
        self.positive_entries.len()
    }

    /// Number of rows in the head-exclusive cache.
    pub(crate) fn body_rows(&self) -> usize {
        self.body_entries.len()
    }

    /// Counts the distinct value combinations of the body-linked head
    /// variables across all body rows.
    fn distinct_linked_tuples(&self, profile: &HeadProfile, kb: &KnowledgeBase) -> usize {
        if profile.linked.is_empty() {
            return usize::from(!self.body_entries.is_empty());
        }

        // Group the representative columns by body block so each block is
        // projected once per row; joined variables are fixed per row, so one
        // representative column per variable is enough.
        let mut slot_columns: BTreeMap<usize, Vec<(usize, usize)>> = BTreeMap::new();
        for (tuple_index, &(_, position)) in profile.linked.iter().enumerate() {
            slot_columns
                .entry(position.predicate - 1)
                .or_default()
                .push((tuple_index, position.argument));
        }

        let mut tuples: HashSet<Vec<ConstantId>> = HashSet::new();
        for entry in &self.body_entries {
            let partials: Vec<Vec<Vec<ConstantId>>> = slot_columns
                .iter()
                .map(|(&slot, columns)| {
                    let block = &entry.blocks[slot];
                    let store = kb.relation(block.relation());
                    let mut seen: HashSet<Vec<ConstantId>> = HashSet::new();
                    for &fact in block.facts() {
                        seen.insert(
                            columns
                                .iter()
                                .map(|&(_, column)| store.fact(fact)[column])
                                .collect(),
                        );
                    }
                    seen.into_iter().collect()
                })
                .collect();

            for combination in partials.iter().map(|partial| partial.iter()).multi_cartesian_product() {
                let mut tuple = vec![0; profile.linked.len()];
                for (columns, partial) in slot_columns.values().zip(combination) {
                    for (&(tuple_index, _), &value) in columns.iter().zip(partial.iter()) {
                        tuple[tuple_index] = value;
                    }
                }
                tuples.insert(tuple);
            }
        }

        tuples.len()
    }
}

impl GroundingBackend for IncrementalGrounding {
    fn apply(
        &mut self,
        update: &CacheUpdate,
        _predicates: &[Predicate],
        kb: &KnowledgeBase,
    ) -> Result<(), UnsupportedUpdate> {
        match *update {
            CacheUpdate::Extend { relation } => {
                let block = ComplianceBlock::full(relation, kb);
                if block.facts().is_empty() {
                    // An atom over an empty relation kills every row.
                    self.positive_entries.clear();
                    self.body_entries.clear();
                    return Ok(());
                }
                for entry in &mut self.positive_entries {
                    entry.blocks.push(Rc::clone(&block));
                }
                for entry in &mut self.body_entries {
                    entry.blocks.push(Rc::clone(&block));
                }
                Ok(())
            }
            CacheUpdate::Join { first, second } => {
                self.positive_entries = join_entries(
                    std::mem::take(&mut self.positive_entries),
                    (first.predicate, first.argument),
                    (second.predicate, second.argument),
                    kb,
                );
                if !first.in_head() && !second.in_head() {
                    self.body_entries = join_entries(
                        std::mem::take(&mut self.body_entries),
                        (first.predicate - 1, first.argument),
                        (second.predicate - 1, second.argument),
                        kb,
                    );
                }
                Ok(())
            }
            CacheUpdate::Restrict { position, constant } => {
                self.positive_entries = restrict_entries(
                    std::mem::take(&mut self.positive_entries),
                    position.predicate,
                    position.argument,
                    constant,
                    kb,
                );
                if !position.in_head() {
                    self.body_entries = restrict_entries(
                        std::mem::take(&mut self.body_entries),
                        position.predicate - 1,
                        position.argument,
                        constant,
                        kb,
                    );
                }
                Ok(())
            }
            CacheUpdate::Relax { .. } => Err(UnsupportedUpdate),
        }
    }

    fn entailment_counts(&self, predicates: &[Predicate], kb: &KnowledgeBase) -> EntailmentCounts {
        let store = kb.relation(predicates[0].relation);

        let mut covered: HashSet<FactIndex> = HashSet::new();
        for entry in &self.positive_entries {
            covered.extend(entry.blocks[0].facts().iter().copied());
        }
        let already_entailed = covered
            .iter()
            .filter(|&&fact| store.is_entailed(fact))
            .count();
        let positives = covered.len() - already_entailed;

        let profile = HeadProfile::of(predicates);
        let base = self.distinct_linked_tuples(&profile, kb);

        EntailmentCounts {
            covered: covered.len(),
            positives,
            already_entailed,
            total: profile.expanded_total(base, kb, already_entailed),
        }
    }

    fn evidence(&self, predicates: &[Predicate], _kb: &KnowledgeBase) -> Vec<Evidence> {
        let mut seen: HashSet<FactIndex> = HashSet::new();
        let mut result = Vec::new();

        for entry in &self.positive_entries {
            // All shared variables are fixed per row, so any fact of each
            // body block supports every head fact of the row.
            let body: Vec<GroundFact> = (1..predicates.len())
                .map(|atom| GroundFact {
                    relation: entry.blocks[atom].relation(),
                    index: entry.blocks[atom].facts()[0],
                })
                .collect();
            for &head in entry.blocks[0].facts() {
                if seen.insert(head) {
                    result.push(Evidence {
                        head,
                        body: body.clone(),
                    });
                }
            }
        }

        result
    }
}

/// Replaces every row with one row per value shared between both slots'
/// compliance sets; rows without a shared value are dropped.
fn join_entries(
    entries: Vec<CacheEntry>,
    (first_block, first_column): (usize, usize),
    (second_block, second_column): (usize, usize),
    kb: &KnowledgeBase,
) -> Vec<CacheEntry> {
    let mut result = Vec::new();

    for entry in entries {
        if first_block == second_block {
            let block = &entry.blocks[first_block];
            let store = kb.relation(block.relation());
            let narrowed: Vec<FactIndex> = block
                .facts()
                .iter()
                .copied()
                .filter(|&fact| store.fact(fact)[first_column] == store.fact(fact)[second_column])
                .collect();
            if !narrowed.is_empty() {
                let mut blocks = entry.blocks.clone();
                blocks[first_block] = block.narrowed(narrowed);
                result.push(CacheEntry { blocks });
            }
            continue;
        }

        let first_index = entry.blocks[first_block].index(first_column, kb);
        let second_index = entry.blocks[second_block].index(second_column, kb);

        // Iterate the smaller side so cost tracks the number of shared
        // values actually present.
        let (outer, inner, outer_is_first): (
            &HashMap<ConstantId, Vec<FactIndex>>,
            &HashMap<ConstantId, Vec<FactIndex>>,
            bool,
        ) = if first_index.len() <= second_index.len() {
            (&first_index, &second_index, true)
        } else {
            (&second_index, &first_index, false)
        };

        for (value, outer_facts) in outer {
            let Some(inner_facts) = inner.get(value) else {
                continue;
            };
            let (first_facts, second_facts) = if outer_is_first {
                (outer_facts, inner_facts)
            } else {
                (inner_facts, outer_facts)
            };

            let mut blocks = entry.blocks.clone();
            blocks[first_block] = entry.blocks[first_block].narrowed(first_facts.clone());
            blocks[second_block] = entry.blocks[second_block].narrowed(second_facts.clone());
            result.push(CacheEntry { blocks });
        }
    }

    result
}

/// Narrows one slot of every row to the facts holding `constant`;
/// rows that become empty are dropped.
fn restrict_entries(
    entries: Vec<CacheEntry>,
    block_index: usize,
    column: usize,
    constant: ConstantId,
    kb: &KnowledgeBase,
) -> Vec<CacheEntry> {
    let mut result = Vec::new();

    for entry in entries {
        let index = entry.blocks[block_index].index(column, kb);
        let Some(facts) = index.get(&constant) else {
            continue;
        };

        let mut blocks = entry.blocks.clone();
        blocks[block_index] = entry.blocks[block_index].narrowed(facts.clone());
        result.push(CacheEntry { blocks });
    }

    result
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use quickcheck_macros::quickcheck;

    use crate::grounding::{CacheUpdate, GroundingBackend};
    use crate::kb::{FactIndex, KnowledgeBase};
    use crate::model::argument::Argument::{Empty, Variable};
    use crate::model::predicate::{ArgPos, Predicate};

    use super::IncrementalGrounding;

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
    fn fresh_cache_covers_the_whole_relation() {
        let kb = sample_kb();
        let grounding = IncrementalGrounding::new(0, &kb);
        let predicates = [predicate(0, &[Empty, Empty])];

        let counts = grounding.entailment_counts(&predicates, &kb);
        assert_eq!(counts.covered, 3);
        assert_eq!(counts.positives, 3);
        // one empty body row, two free head slots over five constants
        assert_eq!(counts.total, 25.0);
    }

    /// All facts a block position holds, across every row of the
    /// head-inclusive cache.
    fn compliance_union(grounding: &IncrementalGrounding, block: usize) -> HashSet<FactIndex> {
        grounding
            .positive_entries
            .iter()
            .flat_map(|entry| entry.blocks[block].facts().iter().copied())
            .collect()
    }

    #[test]
    fn joins_split_rows_and_narrow_counts() {
        let kb = sample_kb();
        let mut grounding = IncrementalGrounding::new(0, &kb);

        // parent(X0,X1) :- father(X0,X1)
        let predicates = [
            predicate(0, &[Variable(0), Variable(1)]),
            predicate(1, &[Variable(0), Variable(1)]),
        ];

        grounding
            .apply(&CacheUpdate::Extend { relation: 1 }, &predicates, &kb)
            .unwrap();
        let rows_before = grounding.positive_rows();
        grounding
            .apply(
                &CacheUpdate::Join {
                    first: ArgPos::new(1, 0),
                    second: ArgPos::new(0, 0),
                },
                &predicates,
                &kb,
            )
            .unwrap();
        // A split partitions, it never multiplies beyond the distinct
        // shared values; with two father subjects we get two rows.
        assert!(grounding.positive_rows() >= rows_before);
        let rows_after_first_join = grounding.positive_rows();

        grounding
            .apply(
                &CacheUpdate::Join {
                    first: ArgPos::new(1, 1),
                    second: ArgPos::new(0, 1),
                },
                &predicates,
                &kb,
            )
            .unwrap();
        assert!(grounding.positive_rows() <= rows_after_first_join * 2);

        let counts = grounding.entailment_counts(&predicates, &kb);
        assert_eq!(counts.covered, 2);
        assert_eq!(counts.positives, 2);
        assert_eq!(counts.total, 2.0);
    }

    #[test]
    fn updates_only_shrink_the_compliance_sets() {
        let kb = sample_kb();
        let mut grounding = IncrementalGrounding::new(0, &kb);
        let predicates = [
            predicate(0, &[Variable(0), Variable(1)]),
            predicate(1, &[Variable(0), Variable(1)]),
        ];

        grounding
            .apply(&CacheUpdate::Extend { relation: 1 }, &predicates, &kb)
            .unwrap();
        let mut before: Vec<_> = (0..2).map(|block| compliance_union(&grounding, block)).collect();

        let updates = [
            CacheUpdate::Join {
                first: ArgPos::new(1, 0),
                second: ArgPos::new(0, 0),
            },
            CacheUpdate::Join {
                first: ArgPos::new(1, 1),
                second: ArgPos::new(0, 1),
            },
            CacheUpdate::Restrict {
                position: ArgPos::new(1, 1),
                constant: 3,
            },
        ];
        for update in updates {
            grounding.apply(&update, &predicates, &kb).unwrap();
            let after: Vec<_> = (0..2).map(|block| compliance_union(&grounding, block)).collect();
            for (now, then) in after.iter().zip(&before) {
                assert!(now.is_subset(then));
            }
            before = after;
        }

        // Only parent(b,d) survives the restriction of father's object to d.
        assert_eq!(before[0], HashSet::from([2]));
        assert_eq!(before[1], HashSet::from([1]));
    }

    #[quickcheck]
    fn a_join_never_grows_the_compliance_union(first: bool, second: bool) -> bool {
        let kb = sample_kb();
        let mut grounding = IncrementalGrounding::new(0, &kb);
        let predicates = [
            predicate(0, &[Empty, Empty]),
            predicate(1, &[Empty, Empty]),
        ];

        grounding
            .apply(&CacheUpdate::Extend { relation: 1 }, &predicates, &kb)
            .unwrap();
        let before: Vec<_> = (0..2).map(|block| compliance_union(&grounding, block)).collect();

        let update = CacheUpdate::Join {
            first: ArgPos::new(1, usize::from(first)),
            second: ArgPos::new(0, usize::from(second)),
        };
        grounding.apply(&update, &predicates, &kb).unwrap();

        (0..2).all(|block| compliance_union(&grounding, block).is_subset(&before[block]))
    }

    #[test]
    fn restriction_to_missing_constant_empties_the_cache() {
        let kb = sample_kb();
        let mut grounding = IncrementalGrounding::new(0, &kb);
        let predicates = [predicate(0, &[crate::model::argument::Argument::Constant(4), Empty])];

        grounding
            .apply(
                &CacheUpdate::Restrict {
                    position: ArgPos::new(0, 0),
                    constant: 4,
                },
                &predicates,
                &kb,
            )
            .unwrap();

        assert_eq!(grounding.positive_rows(), 0);
        let counts = grounding.entailment_counts(&predicates, &kb);
        assert_eq!(counts.covered, 0);
    }

    #[test]
    fn relax_is_unsupported() {
        let kb = sample_kb();
        let mut grounding = IncrementalGrounding::new(0, &kb);
        let predicates = [predicate(0, &[Empty, Empty])];

        assert!(grounding
            .apply(
                &CacheUpdate::Relax {
                    position: ArgPos::new(0, 0)
                },
                &predicates,
                &kb,
            )
            .is_err());
    }

    #[test]
    fn evidence_yields_one_witness_per_head_fact() {
        let kb = sample_kb();
        let mut grounding = IncrementalGrounding::new(0, &kb);
        let predicates = [
            predicate(0, &[Variable(0), Variable(1)]),
            predicate(1, &[Variable(0), Variable(1)]),
        ];

        grounding
            .apply(&CacheUpdate::Extend { relation: 1 }, &predicates, &kb)
            .unwrap();
        grounding
            .apply(
                &CacheUpdate::Join {
                    first: ArgPos::new(1, 0),
                    second: ArgPos::new(0, 0),
                },
                &predicates,
                &kb,
            )
            .unwrap();
        grounding
            .apply(
                &CacheUpdate::Join {
                    first: ArgPos::new(1, 1),
                    second: ArgPos::new(0, 1),
                },
                &predicates,
                &kb,
            )
            .unwrap();

        let mut evidence = grounding.evidence(&predicates, &kb);
        evidence.sort_by_key(|witness| witness.head);

        assert_eq!(evidence.len(), 2);
        // parent(a,b) is supported by father(a,b)
        assert_eq!(evidence[0].head, 0);
        assert_eq!(evidence[0].body[0].relation, 1);
        assert_eq!(kb.relation(1).fact(evidence[0].body[0].index), &[0, 1]);
    }
}
