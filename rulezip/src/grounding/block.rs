//! This module defines [ComplianceBlock]: one resolved fact pattern of a
//! cache row, holding the subset of a relation's facts consistent with the
//! rule's current bindings.

use std::collections::HashMap;
use std::rc::Rc;

use once_cell::unsync::OnceCell;

use crate::kb::{ConstantId, FactIndex, KnowledgeBase, RelationId};

/// The compliance set of one predicate within one cache row.
///
/// Blocks are immutable once created and shared between rows (and between a
/// rule and its clones) through [Rc]; every narrowing produces a fresh
/// block. The per-column value indices are built lazily, so a block that is
/// never split pays nothing for them.
#[derive(Debug)]
pub(crate) struct ComplianceBlock {
    relation: RelationId,
    facts: Vec<FactIndex>,
    indices: Vec<OnceCell<Rc<HashMap<ConstantId, Vec<FactIndex>>>>>,
}

impl ComplianceBlock {
    /// Creates the unrestricted block holding every fact of `relation`.
    pub(crate) fn full(relation: RelationId, kb: &KnowledgeBase) -> Rc<Self> {
        let store = kb.relation(relation);
        Rc::new(Self {
            relation,
            facts: (0..store.len()).collect(),
            indices: (0..store.arity()).map(|_| OnceCell::new()).collect(),
        })
    }

    /// Creates a block over the same relation restricted to `facts`.
    pub(crate) fn narrowed(&self, facts: Vec<FactIndex>) -> Rc<Self> {
        Rc::new(Self {
            relation: self.relation,
            facts,
            indices: (0..self.indices.len()).map(|_| OnceCell::new()).collect(),
        })
    }

    /// Returns the relation this block belongs to.
    pub(crate) fn relation(&self) -> RelationId {
        self.relation
    }

    /// Returns the compliance set.
    pub(crate) fn facts(&self) -> &[FactIndex] {
        &self.facts
    }

    /// Returns the value -> facts index for one column, building it on
    /// first use and caching it for the lifetime of the block.
    pub(crate) fn index(
        &self,
        position: usize,
        kb: &KnowledgeBase,
    ) -> Rc<HashMap<ConstantId, Vec<FactIndex>>> {
        self.indices[position]
            .get_or_init(|| {
                let store = kb.relation(self.relation);
                let mut index: HashMap<ConstantId, Vec<FactIndex>> = HashMap::new();
                for &fact in &self.facts {
                    index
                        .entry(store.fact(fact)[position])
                        .or_default()
                        .push(fact);
                }
                Rc::new(index)
            })
            .clone()
    }
}

#[cfg(test)]
mod test {
    use crate::kb::KnowledgeBase;

    use super::ComplianceBlock;

    fn sample_kb() -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        for symbol in ["a", "b", "c"] {
            kb.symbols_mut().add_str(symbol);
        }
        let p = kb.add_relation("p", 2).unwrap();
        kb.add_fact(p, &[0, 1]).unwrap();
        kb.add_fact(p, &[0, 2]).unwrap();
        kb.add_fact(p, &[1, 2]).unwrap();
        kb
    }

    #[test]
    fn full_block_holds_every_fact() {
        let kb = sample_kb();
        let block = ComplianceBlock::full(0, &kb);
        assert_eq!(block.facts(), &[0, 1, 2]);
        assert_eq!(block.relation(), 0);
    }

    #[test]
    fn lazy_index_groups_by_value() {
        let kb = sample_kb();
        let block = ComplianceBlock::full(0, &kb);

        let index = block.index(0, &kb);
        assert_eq!(index.get(&0), Some(&vec![0, 1]));
        assert_eq!(index.get(&1), Some(&vec![2]));
        assert_eq!(index.get(&2), None);
    }

    #[test]
    fn narrowing_does_not_touch_the_source() {
        let kb = sample_kb();
        let block = ComplianceBlock::full(0, &kb);

        let narrowed = block.narrowed(vec![2]);
        assert_eq!(narrowed.facts(), &[2]);
        assert_eq!(block.facts(), &[0, 1, 2]);

        let index = narrowed.index(1, &kb);
        assert_eq!(index.get(&2), Some(&vec![2]));
        assert_eq!(index.get(&1), None);
    }
}
