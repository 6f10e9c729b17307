//! A rule-mining compressor for relational knowledge bases:
//! it searches for first-order Horn rules that entail large parts of the
//! stored facts and keeps only the rules, the underivable remainder, and
//! the corrections needed to restore the original store exactly.

#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts
)]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    variant_size_differences
)]

pub mod compress;
pub mod config;
pub mod error;
pub mod eval;
pub mod grounding;
pub mod kb;
pub mod mining;
pub mod model;
pub mod necessity;
pub mod recovery;
