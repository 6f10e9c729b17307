//! Error-handling module for the crate

use std::path::PathBuf;

use thiserror::Error;

/// Error-Collection for all the possible Errors occurring in this crate
#[derive(Error, Debug)]
pub enum Error {
    /// Error while reading a relation file
    #[error("failed to read \"{filename}\": {error}")]
    IoReading {
        /// Underlying IO error
        error: std::io::Error,
        /// Name of the file that could not be read
        filename: PathBuf,
    },
    /// CSV deserialization error
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Error if a relation name cannot be resolved
    #[error("unknown relation \"{0}\"")]
    UnknownRelation(String),
    /// Error if the same relation is declared twice
    #[error("relation \"{0}\" is declared more than once")]
    DuplicateRelation(String),
    /// Error if a row of a relation file does not match the relation's arity
    #[error("relation \"{relation}\" has arity {expected} but row {row} has {found} fields")]
    InconsistentArity {
        /// Name of the offending relation
        relation: String,
        /// Arity established by the first row
        expected: usize,
        /// Number of fields actually found
        found: usize,
        /// One-based row number within the file
        row: usize,
    },
    /// Error if a fact is added with the wrong number of arguments
    #[error("arity mismatch for relation \"{relation}\": expected {expected}, got {found}")]
    ArityMismatch {
        /// Name of the offending relation
        relation: String,
        /// Declared arity
        expected: usize,
        /// Number of arguments supplied
        found: usize,
    },
    /// Error if no relation files are found in the input directory
    #[error("no relation files found in \"{0}\"")]
    EmptyDirectory(PathBuf),
}
