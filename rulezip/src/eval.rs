//! This module defines [Eval] and [EvalMetric]:
//! the compression-quality figures derived for one candidate rule.

use std::fmt::Display;

use serde::Serialize;

/// Metric used to rank candidate rules during the beam search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum EvalMetric {
    /// Positive entailments per stored unit: `pos / (all + size)`.
    CompressionRatio,
    /// Net facts saved: `pos - neg - size`.
    #[default]
    CompressionCapacity,
    /// Cumulative information gain along the rule's mutation history.
    InfoGain,
}

impl Display for EvalMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalMetric::CompressionRatio => f.write_str("compression-ratio"),
            EvalMetric::CompressionCapacity => f.write_str("compression-capacity"),
            EvalMetric::InfoGain => f.write_str("info-gain"),
        }
    }
}

/// Entailment counts and size of one rule, with the derived metrics.
///
/// `positives` are facts of the target relation the rule entails that no
/// previously accepted rule entailed; `total` counts every head
/// instantiation the body reaches (minus the already-entailed ones), so
/// `total - positives` is the number of implicit negatives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eval {
    positives: f64,
    total: f64,
    size: usize,
}

impl Eval {
    /// Creates an evaluation from raw counts.
    pub fn new(positives: f64, total: f64, size: usize) -> Self {
        Self {
            positives,
            total,
            size,
        }
    }

    /// The evaluation of a rule that entails nothing.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0)
    }

    /// Number of newly entailed facts.
    pub fn positives(&self) -> f64 {
        self.positives
    }

    /// Number of reachable head instantiations.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Number of implicit negatives.
    pub fn negatives(&self) -> f64 {
        self.total - self.positives
    }

    /// Structural size of the rule (completed binding operations).
    pub fn size(&self) -> usize {
        self.size
    }

    /// `pos / (all + size)`; 0 if the denominator is not positive.
    pub fn compression_ratio(&self) -> f64 {
        let denominator = self.total + self.size as f64;
        if denominator <= 0.0 {
            0.0
        } else {
            self.positives / denominator
        }
    }

    /// `pos - neg - size`.
    pub fn compression_capacity(&self) -> f64 {
        self.positives - self.negatives() - self.size as f64
    }

    /// `pos * (ln(pos/all) - ln(prev_pos/prev_all))`; 0 if `pos` is 0.
    /// The previous term is dropped when the previous evaluation had no
    /// entailments at all.
    pub fn info_gain_over(&self, previous: &Eval) -> f64 {
        if self.positives <= 0.0 || self.total <= 0.0 {
            return 0.0;
        }

        let current = (self.positives / self.total).ln();
        let reference = if previous.positives <= 0.0 || previous.total <= 0.0 {
            0.0
        } else {
            (previous.positives / previous.total).ln()
        };
        self.positives * (current - reference)
    }

    /// A rule is worth keeping only if it saves more facts than it costs.
    pub fn useful(&self) -> bool {
        self.compression_capacity() > 0.0
    }
}

impl Display for Eval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(+{}/{}; |{}|)",
            self.positives, self.total, self.size
        )
    }
}

#[cfg(test)]
mod test {
    use super::Eval;

    #[test]
    fn compression_ratio() {
        assert_eq!(Eval::new(4.0, 4.0, 2).compression_ratio(), 4.0 / 6.0);
        assert_eq!(Eval::zero().compression_ratio(), 0.0);
        assert_eq!(Eval::new(0.0, 10.0, 1).compression_ratio(), 0.0);
    }

    #[test]
    fn compression_capacity() {
        let eval = Eval::new(5.0, 7.0, 1);
        assert_eq!(eval.negatives(), 2.0);
        assert_eq!(eval.compression_capacity(), 2.0);
        assert!(eval.useful());
        assert!(!Eval::new(3.0, 5.0, 1).useful());
    }

    #[test]
    fn info_gain() {
        let previous = Eval::new(6.0, 100.0, 0);
        let current = Eval::new(4.0, 8.0, 1);

        let expected = 4.0 * ((4.0_f64 / 8.0).ln() - (6.0_f64 / 100.0).ln());
        assert!((current.info_gain_over(&previous) - expected).abs() < 1e-12);

        assert_eq!(Eval::zero().info_gain_over(&previous), 0.0);
        // A previous evaluation without entailments contributes no reference term.
        let from_nothing = current.info_gain_over(&Eval::zero());
        assert!((from_nothing - 4.0 * (4.0_f64 / 8.0).ln()).abs() < 1e-12);
    }
}
