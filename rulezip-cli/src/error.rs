//! Error-handling module for the binary

use std::path::PathBuf;

use thiserror::Error;

/// Error-Collection for all the possible Errors occurring in the binary
#[derive(Error, Debug)]
pub enum CliError {
    /// Error raised by the compression library
    #[error(transparent)]
    Rulezip(#[from] rulezip::error::Error),
    /// Error while writing the compression report
    #[error("failed to write \"{filename}\": {error}")]
    OutputWriting {
        /// Underlying IO error
        error: std::io::Error,
        /// Name of the file that could not be written
        filename: PathBuf,
    },
    /// JSON serialization error
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    /// Error if the recovery check finds a mismatch
    #[error("the recovered knowledge base differs from the input")]
    ValidationFailed,
}
