//! This module defines [Argument], the value stored in one predicate slot.

use std::fmt::Display;

use crate::kb::ConstantId;

/// One argument slot of a [Predicate][super::Predicate].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Argument {
    /// An unbound, existentially-local position; matches any value,
    /// not shared with any other slot. Printed as "?".
    Empty,
    /// A limited variable, shared with at least one other slot.
    Variable(usize),
    /// An interned constant symbol.
    Constant(ConstantId),
}

impl Argument {
    /// Returns true if the slot is unbound.
    pub fn is_empty(&self) -> bool {
        matches!(self, Argument::Empty)
    }

    /// Returns the variable id if the slot holds a limited variable.
    pub fn variable(&self) -> Option<usize> {
        match self {
            Argument::Variable(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the constant id if the slot holds a constant.
    pub fn constant(&self) -> Option<ConstantId> {
        match self {
            Argument::Constant(id) => Some(*id),
            _ => None,
        }
    }
}

impl Display for Argument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Argument::Empty => f.write_str("?"),
            Argument::Variable(id) => write!(f, "X{id}"),
            Argument::Constant(id) => write!(f, "#{id}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Argument;

    #[test]
    fn accessors() {
        assert!(Argument::Empty.is_empty());
        assert_eq!(Argument::Variable(2).variable(), Some(2));
        assert_eq!(Argument::Variable(2).constant(), None);
        assert_eq!(Argument::Constant(7).constant(), Some(7));
    }

    #[test]
    fn display() {
        assert_eq!(Argument::Empty.to_string(), "?");
        assert_eq!(Argument::Variable(0).to_string(), "X0");
        assert_eq!(Argument::Constant(3).to_string(), "#3");
    }
}
