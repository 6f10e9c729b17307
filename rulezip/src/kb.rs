//! This module defines [KnowledgeBase], the in-memory relational store the
//! miner runs against, together with the id types used to address its contents.

use std::collections::HashMap;

use crate::error::Error;

/// Module to define [SymbolTable]
pub mod symbol_table;
pub use symbol_table::SymbolTable;
/// Module to define [Relation]
pub mod relation;
pub use relation::Relation;
/// Module to load relation files into a [KnowledgeBase]
pub mod loader;

/// Id of an interned constant symbol.
pub type ConstantId = usize;
/// Id of a relation within a [KnowledgeBase].
pub type RelationId = usize;
/// Index of a fact within its [Relation].
pub type FactIndex = usize;

/// A fact addressed globally, as a value-equal key `(relation, index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroundFact {
    /// Relation the fact belongs to.
    pub relation: RelationId,
    /// Index of the fact within that relation.
    pub index: FactIndex,
}

/// The in-memory knowledge base: interned constants plus one [Relation] per functor.
///
/// The miner treats this as read-mostly; the only write channel during a
/// compression run is the per-fact entailment mark.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    symbols: SymbolTable,
    relations: Vec<Relation>,
    relation_ids: HashMap<String, RelationId>,
}

impl KnowledgeBase {
    /// Creates an empty knowledge base.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a knowledge base with the same constants and relation schemas
    /// as `other` but without any facts. Relation and constant ids carry over.
    pub fn empty_like(other: &KnowledgeBase) -> Self {
        let mut result = Self {
            symbols: other.symbols.clone(),
            relations: Vec::with_capacity(other.relations.len()),
            relation_ids: other.relation_ids.clone(),
        };
        for relation in &other.relations {
            result
                .relations
                .push(Relation::new(relation.name().to_string(), relation.arity()));
        }
        result
    }

    /// Declares a new relation and returns its id.
    pub fn add_relation(&mut self, name: &str, arity: usize) -> Result<RelationId, Error> {
        if self.relation_ids.contains_key(name) {
            return Err(Error::DuplicateRelation(name.to_string()));
        }

        let id = self.relations.len();
        self.relations.push(Relation::new(name.to_string(), arity));
        self.relation_ids.insert(name.to_string(), id);
        Ok(id)
    }

    /// Adds a fact to the given relation, returning `false` if it was already present.
    pub fn add_fact(&mut self, relation: RelationId, fact: &[ConstantId]) -> Result<bool, Error> {
        let store = &mut self.relations[relation];
        if fact.len() != store.arity() {
            return Err(Error::ArityMismatch {
                relation: store.name().to_string(),
                expected: store.arity(),
                found: fact.len(),
            });
        }
        Ok(store.push(fact.into()))
    }

    /// Returns the relation with the given id.
    ///
    /// # Panics
    /// Panics if `id` is out of bounds.
    pub fn relation(&self, id: RelationId) -> &Relation {
        &self.relations[id]
    }

    /// Returns a mutable reference to the relation with the given id.
    pub fn relation_mut(&mut self, id: RelationId) -> &mut Relation {
        &mut self.relations[id]
    }

    /// Looks up a relation id by name.
    pub fn find_relation(&self, name: &str) -> Option<RelationId> {
        self.relation_ids.get(name).copied()
    }

    /// Returns the number of relations.
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Iterates over all relations in declaration order.
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.iter()
    }

    /// Returns the symbol table of this knowledge base.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Returns a mutable reference to the symbol table.
    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    /// Returns the number of distinct constants, i.e. `|C|`.
    pub fn constant_count(&self) -> usize {
        self.symbols.len()
    }

    /// Returns the total number of facts across all relations.
    pub fn fact_count(&self) -> usize {
        self.relations.iter().map(Relation::len).sum()
    }

    /// Resolves a global fact key to its constant tuple.
    pub fn fact(&self, key: GroundFact) -> &[ConstantId] {
        self.relations[key.relation].fact(key.index)
    }

    /// Precomputes, per (relation, argument position), the constants whose
    /// frequency in that column reaches `min_coverage`. Only these constants
    /// are offered to the constant-binding specialization operator.
    pub fn promising_constants(&self, min_coverage: f64) -> PromisingConstants {
        let per_relation = self
            .relations
            .iter()
            .map(|relation| {
                let threshold = min_coverage * relation.len() as f64;
                (0..relation.arity())
                    .map(|position| {
                        let mut values: Vec<ConstantId> = relation
                            .column_values(position)
                            .filter(|&(_, count)| count as f64 >= threshold)
                            .map(|(value, _)| value)
                            .collect();
                        values.sort_unstable();
                        values
                    })
                    .collect()
            })
            .collect();

        PromisingConstants { per_relation }
    }
}

/// Per-(relation, position) sets of constants worth binding during specialization.
#[derive(Debug, Clone)]
pub struct PromisingConstants {
    per_relation: Vec<Vec<Vec<ConstantId>>>,
}

impl PromisingConstants {
    /// Returns the promising constants for one argument position of a relation.
    pub fn of(&self, relation: RelationId, position: usize) -> &[ConstantId] {
        &self.per_relation[relation][position]
    }
}
