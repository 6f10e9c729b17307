//! This module defines [RelationMiner], the beam search that produces one
//! rule at a time for a single target relation.

use std::fmt::Display;

use crate::config::MiningConfig;
use crate::eval::EvalMetric;
use crate::grounding::GroundingMode;
use crate::kb::{KnowledgeBase, PromisingConstants, RelationId};
use crate::model::{FingerprintRegistry, Rule, UpdateStatus};

use super::candidates::CandidatePool;
use super::StopFlag;

/// Rejection statistics of one `find_rule` call, kept for the search log.
#[derive(Debug, Default, Clone, Copy)]
struct RejectionCounters {
    duplicated: usize,
    invalid: usize,
    insufficient_coverage: usize,
    tabu_pruned: usize,
}

impl RejectionCounters {
    fn record(&mut self, status: UpdateStatus) {
        match status {
            UpdateStatus::Normal => {}
            UpdateStatus::Duplicated => self.duplicated += 1,
            UpdateStatus::Invalid => self.invalid += 1,
            UpdateStatus::InsufficientCoverage => self.insufficient_coverage += 1,
            UpdateStatus::TabuPruned => self.tabu_pruned += 1,
        }
    }
}

impl Display for RejectionCounters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "duplicated: {}, invalid: {}, low coverage: {}, tabu: {}",
            self.duplicated, self.invalid, self.insufficient_coverage, self.tabu_pruned
        )
    }
}

/// Decision taken at the end of one beam round with a non-empty pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundOutcome {
    /// A held local optimum scores at least as well as the best candidate.
    DeliverOptimum,
    /// The best candidate is accepted without further refinement.
    DeliverBest,
    /// The candidates become the next beam.
    Continue,
}

/// Beam search over the refinement space of one target relation.
///
/// The miner is stateful across [RelationMiner::find_rule] calls: its
/// [FingerprintRegistry] remembers every rule shape ever constructed, so a
/// later call never re-delivers (or re-explores) an earlier result.
#[derive(Debug)]
pub struct RelationMiner {
    relation: RelationId,
    config: MiningConfig,
    registry: FingerprintRegistry,
    counters: RejectionCounters,
    stop: StopFlag,
}

impl RelationMiner {
    /// Creates a miner for the given target relation.
    pub fn new(relation: RelationId, config: MiningConfig, stop: StopFlag) -> Self {
        Self {
            relation,
            config,
            registry: FingerprintRegistry::new(),
            counters: RejectionCounters::default(),
            stop,
        }
    }

    /// The target relation of this miner.
    pub fn relation(&self) -> RelationId {
        self.relation
    }

    /// Runs the beam search until it either settles on a rule or exhausts
    /// the unseen refinement space. A delivered rule always has positive
    /// compression capacity; `None` means no such rule is left.
    pub fn find_rule(
        &mut self,
        kb: &KnowledgeBase,
        promising: &PromisingConstants,
    ) -> Option<Rule> {
        let metric = self.config.metric;
        self.counters = RejectionCounters::default();

        let mut beam = vec![Rule::most_general(
            self.relation,
            kb,
            GroundingMode::Incremental,
            &mut self.registry,
        )];
        let mut optimum: Option<Rule> = None;

        loop {
            let mut pool = CandidatePool::new(self.config.beam_width);

            for index in 0..beam.len() {
                if self.stop.is_stopped() {
                    log::info!(
                        "search for {} interrupted; delivering the best rule found so far",
                        kb.relation(self.relation).name()
                    );
                    let best = beam
                        .drain(..)
                        .chain(pool.into_items())
                        .chain(optimum)
                        .max_by(|a, b| a.score(metric).total_cmp(&b.score(metric)));
                    return self.deliver(best, kb);
                }

                let improved = self.expand(&beam[index], kb, promising, &mut pool);
                if !improved {
                    // No refinement beats this rule; it is a local optimum.
                    let replace = optimum
                        .as_ref()
                        .is_none_or(|held| held.score(metric) < beam[index].score(metric));
                    if replace {
                        optimum = Some(beam[index].clone());
                    }
                }
            }

            let outcome = match pool.best() {
                None => {
                    let settled = optimum.take();
                    return self.deliver(settled, kb);
                }
                Some(best) => {
                    self.round_outcome(optimum.as_ref().map(|held| held.score(metric)), best)
                }
            };

            match outcome {
                RoundOutcome::DeliverOptimum => return self.deliver(optimum, kb),
                RoundOutcome::DeliverBest => {
                    let best = pool.into_items().next();
                    return self.deliver(best, kb);
                }
                RoundOutcome::Continue => beam = pool.into_items().collect(),
            }
        }
    }

    /// Settles one beam round. A held local optimum that matches or beats
    /// the best candidate's score wins outright; only then is the candidate
    /// checked for immediate acceptance (no negatives, or the stop ratio
    /// reached).
    fn round_outcome(&self, optimum_score: Option<f64>, best: &Rule) -> RoundOutcome {
        let best_score = best.score(self.config.metric);
        if optimum_score.is_some_and(|held| held >= best_score) {
            return RoundOutcome::DeliverOptimum;
        }
        if best.eval().negatives() <= 0.0
            || best.eval().compression_ratio() >= self.config.stop_compression_ratio
        {
            return RoundOutcome::DeliverBest;
        }
        RoundOutcome::Continue
    }

    fn deliver(&self, rule: Option<Rule>, kb: &KnowledgeBase) -> Option<Rule> {
        log::debug!(
            "search for {} rejected candidates: {}",
            kb.relation(self.relation).name(),
            self.counters
        );
        let rule = rule.filter(|rule| rule.eval().useful())?;
        log::info!(
            "mined {} {}",
            rule.display(kb),
            rule.eval()
        );
        Some(rule)
    }

    /// Applies every operator to every applicable slot of `rule`, feeding
    /// improving candidates into the pool. Returns whether any candidate
    /// beat the parent's score.
    fn expand(
        &mut self,
        rule: &Rule,
        kb: &KnowledgeBase,
        promising: &PromisingConstants,
        pool: &mut CandidatePool<Rule>,
    ) -> bool {
        let parent_score = rule.score(self.config.metric);
        let coverage = self.config.min_fact_coverage;
        let vacant = rule.vacant_positions();
        let mut improved = false;

        for &target in &vacant {
            for variable in 0..rule.variable_count() {
                let mut candidate = rule.clone();
                let status = candidate.bind_to_existing_variable(
                    target,
                    variable,
                    kb,
                    &mut self.registry,
                    coverage,
                );
                improved |= self.consider(candidate, status, parent_score, pool);
            }

            let relation = rule.predicates()[target.predicate].relation;
            for &constant in promising.of(relation, target.argument) {
                let mut candidate = rule.clone();
                let status =
                    candidate.bind_constant(target, constant, kb, &mut self.registry, coverage);
                improved |= self.consider(candidate, status, parent_score, pool);
            }
        }

        for (index, &first) in vacant.iter().enumerate() {
            for &second in &vacant[index + 1..] {
                let mut candidate = rule.clone();
                let status =
                    candidate.bind_fresh_variable(first, second, kb, &mut self.registry, coverage);
                improved |= self.consider(candidate, status, parent_score, pool);
            }
        }

        if rule.body_len() < self.config.max_body_atoms {
            for relation in 0..kb.relation_count() {
                for position in 0..kb.relation(relation).arity() {
                    for variable in 0..rule.variable_count() {
                        let mut candidate = rule.clone();
                        let status = candidate.bind_new_predicate_to_variable(
                            relation,
                            position,
                            variable,
                            kb,
                            &mut self.registry,
                            coverage,
                        );
                        improved |= self.consider(candidate, status, parent_score, pool);
                    }

                    for &existing in &vacant {
                        let mut candidate = rule.clone();
                        let status = candidate.bind_new_predicate_fresh_variable(
                            relation,
                            position,
                            existing,
                            kb,
                            &mut self.registry,
                            coverage,
                        );
                        improved |= self.consider(candidate, status, parent_score, pool);
                    }
                }
            }
        }

        // Generalization attempts; the incremental cache rejects these,
        // which the counters make visible.
        for target in rule.bound_positions() {
            let mut candidate = rule.clone();
            let status = candidate.unbind(target, kb, &mut self.registry, coverage);
            improved |= self.consider(candidate, status, parent_score, pool);
        }

        improved
    }

    fn consider(
        &mut self,
        candidate: Rule,
        status: UpdateStatus,
        parent_score: f64,
        pool: &mut CandidatePool<Rule>,
    ) -> bool {
        if status != UpdateStatus::Normal {
            self.counters.record(status);
            return false;
        }

        let score = candidate.score(self.config.metric);
        if score > parent_score {
            pool.offer(score, candidate);
            true
        } else {
            false
        }
    }
}
