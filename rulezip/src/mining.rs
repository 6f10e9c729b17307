//! This module defines the rule search: a beam over the refinement space
//! of one target relation, with cancellation support.

/// Module to define [StopFlag][cancellation::StopFlag]
pub mod cancellation;
pub use cancellation::StopFlag;
/// Module to define [CandidatePool][candidates::CandidatePool]
pub mod candidates;
/// Module to define [RelationMiner]
pub mod miner;
pub use miner::RelationMiner;
