//! This module defines [Predicate] and [ArgPos].

use std::fmt::Display;

use crate::kb::RelationId;

use super::argument::Argument;

/// A relation identifier plus a fixed-arity ordered sequence of [Argument]s.
///
/// The arity is immutable; arguments are rebound in place as a rule is
/// specialized or generalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Predicate {
    /// The relation this predicate refers to.
    pub relation: RelationId,
    /// The argument slots, one per relation column.
    pub args: Vec<Argument>,
}

impl Predicate {
    /// Creates a most-general predicate of the given relation: all slots empty.
    pub fn most_general(relation: RelationId, arity: usize) -> Self {
        Self {
            relation,
            args: vec![Argument::Empty; arity],
        }
    }

    /// Returns the arity of the predicate.
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Returns true if no slot is bound.
    pub fn is_most_general(&self) -> bool {
        self.args.iter().all(Argument::is_empty)
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}(", self.relation)?;
        for (index, arg) in self.args.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

/// Addresses one argument slot within a rule:
/// predicate index 0 is the head, indices >= 1 are body atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgPos {
    /// Index of the predicate within the rule.
    pub predicate: usize,
    /// Index of the argument within the predicate.
    pub argument: usize,
}

impl ArgPos {
    /// Creates a new slot address.
    pub fn new(predicate: usize, argument: usize) -> Self {
        Self {
            predicate,
            argument,
        }
    }

    /// Returns true if the slot belongs to the head predicate.
    pub fn in_head(&self) -> bool {
        self.predicate == 0
    }
}
