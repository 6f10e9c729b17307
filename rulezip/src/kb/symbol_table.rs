//! This module defines [SymbolTable],
//! a bijective (invertible) mapping between constant symbols and numeric ids.

use std::collections::HashMap;

/// Result of adding a new symbol to a [SymbolTable].
/// It indicates whether the symbol was previously present or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddResult {
    /// Symbol was new and has been freshly assigned the given id.
    Fresh(usize),
    /// Symbol was already known and has the given id.
    Known(usize),
}

impl AddResult {
    /// Returns the assigned id regardless of freshness.
    pub fn value(&self) -> usize {
        match self {
            AddResult::Fresh(value) => *value,
            AddResult::Known(value) => *value,
        }
    }
}

/// Assigns numeric ids to constant symbols and provides the inverse lookup.
/// Ids are dense: the `n`-th distinct symbol receives id `n - 1`.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    store: Vec<String>,
    map: HashMap<String, usize>,
}

impl SymbolTable {
    /// Creates an empty [SymbolTable].
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new symbol. If the symbol is not known yet, it will
    /// be assigned the next free id.
    pub fn add_str(&mut self, symbol: &str) -> AddResult {
        if let Some(&id) = self.map.get(symbol) {
            return AddResult::Known(id);
        }

        let id = self.store.len();
        self.store.push(symbol.to_string());
        self.map.insert(symbol.to_string(), id);
        AddResult::Fresh(id)
    }

    /// Looks for a given symbol and returns `Some(id)` if it is known.
    pub fn fetch_id(&self, symbol: &str) -> Option<usize> {
        self.map.get(symbol).copied()
    }

    /// Returns the symbol associated with `id`, or `None` if `id` is out of bounds.
    pub fn get(&self, id: usize) -> Option<&str> {
        self.store.get(id).map(String::as_str)
    }

    /// Returns the number of symbols in the table.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true if the table contains no symbols.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
