//! This module defines the logical rule model: arguments, predicates,
//! canonical fingerprints, and the [Rule] refined by the search.

/// Module to define [Argument][argument::Argument]
pub mod argument;
/// Module to define [Predicate][predicate::Predicate] and [ArgPos]
pub mod predicate;
pub use predicate::ArgPos;
/// Module to define [Fingerprint][fingerprint::Fingerprint]
pub mod fingerprint;
/// Module to define [Rule]
pub mod rule;
pub use rule::{FingerprintRegistry, Rule, UpdateStatus};
