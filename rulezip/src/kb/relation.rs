//! This module defines [Relation], the in-memory store for the facts of one relation.

use std::collections::HashMap;

use bitvec::vec::BitVec;

use crate::kb::{ConstantId, FactIndex};

static NO_FACTS: [FactIndex; 0] = [];

/// All facts of one relation, with per-argument indices and entailment marks.
///
/// Facts are stored append-only; a fact keeps its [FactIndex] for the lifetime
/// of the knowledge base, so indices can be used as stable fact identifiers.
#[derive(Debug, Clone)]
pub struct Relation {
    name: String,
    arity: usize,
    facts: Vec<Box<[ConstantId]>>,
    lookup: HashMap<Box<[ConstantId]>, FactIndex>,
    /// One value -> fact-indices map per argument position.
    columns: Vec<HashMap<ConstantId, Vec<FactIndex>>>,
    /// One bit per fact; set once the fact is entailed by an accepted rule.
    entailed: BitVec,
}

impl Relation {
    /// Creates an empty relation with the given name and arity.
    pub(crate) fn new(name: String, arity: usize) -> Self {
        Self {
            name,
            arity,
            facts: Vec::new(),
            lookup: HashMap::new(),
            columns: vec![HashMap::new(); arity],
            entailed: BitVec::new(),
        }
    }

    /// Returns the name of the relation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the arity of the relation.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Returns the number of facts.
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if the relation holds no facts.
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Returns the fact stored at the given index.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn fact(&self, index: FactIndex) -> &[ConstantId] {
        &self.facts[index]
    }

    /// Iterates over all facts in insertion order.
    pub fn facts(&self) -> impl Iterator<Item = &[ConstantId]> {
        self.facts.iter().map(|fact| &fact[..])
    }

    /// Looks up the index of an exact fact.
    pub fn find(&self, fact: &[ConstantId]) -> Option<FactIndex> {
        self.lookup.get(fact).copied()
    }

    /// Adds a fact, returning `false` if it was already present.
    /// The caller must have checked the arity.
    pub(crate) fn push(&mut self, fact: Box<[ConstantId]>) -> bool {
        debug_assert_eq!(fact.len(), self.arity);

        if self.lookup.contains_key(&fact) {
            return false;
        }

        let index = self.facts.len();
        for (position, &value) in fact.iter().enumerate() {
            self.columns[position].entry(value).or_default().push(index);
        }
        self.lookup.insert(fact.clone(), index);
        self.facts.push(fact);
        self.entailed.push(false);
        true
    }

    /// Returns the indices of all facts whose argument at `position` equals `value`.
    pub fn with_value(&self, position: usize, value: ConstantId) -> &[FactIndex] {
        self.columns[position]
            .get(&value)
            .map(Vec::as_slice)
            .unwrap_or(&NO_FACTS)
    }

    /// Iterates over the distinct values occurring at `position`,
    /// together with the number of facts holding each value.
    pub fn column_values(&self, position: usize) -> impl Iterator<Item = (ConstantId, usize)> + '_ {
        self.columns[position]
            .iter()
            .map(|(&value, indices)| (value, indices.len()))
    }

    /// Returns true if the fact at `index` has been marked entailed.
    pub fn is_entailed(&self, index: FactIndex) -> bool {
        self.entailed[index]
    }

    /// Marks the fact at `index` as entailed by an accepted rule.
    pub fn set_entailed(&mut self, index: FactIndex) {
        self.entailed.set(index, true);
    }

    /// Returns the number of facts marked entailed.
    pub fn entailed_count(&self) -> usize {
        self.entailed.count_ones()
    }
}
