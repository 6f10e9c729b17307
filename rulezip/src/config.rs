//! This module defines [MiningConfig],
//! the immutable parameter set threaded through every miner and rule constructor.

use serde::Serialize;

use crate::eval::EvalMetric;

/// Default number of rules kept per beam level.
pub const DEFAULT_BEAM_WIDTH: usize = 3;
/// Default minimum fraction of a target relation a candidate rule must cover.
pub const DEFAULT_MIN_FACT_COVERAGE: f64 = 0.05;
/// Default minimum fraction of a column a constant must occupy to be "promising".
pub const DEFAULT_MIN_CONSTANT_COVERAGE: f64 = 0.25;
/// Default compression ratio at which the search accepts a candidate immediately.
pub const DEFAULT_STOP_COMPRESSION_RATIO: f64 = 1.0;
/// Default upper bound on the number of body atoms of a mined rule.
pub const DEFAULT_MAX_BODY_ATOMS: usize = 4;

/// Parameters controlling one compression run.
///
/// A value of this type is created once (typically by the CLI) and passed
/// by reference into every [RelationMiner][crate::mining::RelationMiner]
/// and rule constructor; nothing in the library mutates it.
#[derive(Debug, Clone, Serialize)]
pub struct MiningConfig {
    /// Number of rules kept per beam level.
    pub beam_width: usize,
    /// Minimum fraction of the target relation a candidate must cover;
    /// candidates below this are rejected and their fingerprints become tabu.
    pub min_fact_coverage: f64,
    /// Minimum fraction of a relation column a constant must occupy
    /// to be offered to the constant-binding operator.
    pub min_constant_coverage: f64,
    /// Compression ratio at which a candidate is accepted without further search.
    pub stop_compression_ratio: f64,
    /// Upper bound on the number of body atoms; caps the search depth.
    pub max_body_atoms: usize,
    /// Metric used to score candidates during the search.
    pub metric: EvalMetric,
    /// Names of the relations to compress; empty means all relations.
    pub targets: Vec<String>,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            beam_width: DEFAULT_BEAM_WIDTH,
            min_fact_coverage: DEFAULT_MIN_FACT_COVERAGE,
            min_constant_coverage: DEFAULT_MIN_CONSTANT_COVERAGE,
            stop_compression_ratio: DEFAULT_STOP_COMPRESSION_RATIO,
            max_body_atoms: DEFAULT_MAX_BODY_ATOMS,
            metric: EvalMetric::CompressionCapacity,
            targets: Vec::new(),
        }
    }
}
