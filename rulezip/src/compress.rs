//! This module defines [Compressor], which ties the per-relation miners,
//! the necessity analysis, and the counterexample bookkeeping together
//! into one compression run.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::MiningConfig;
use crate::error::Error;
use crate::kb::{ConstantId, GroundFact, KnowledgeBase, RelationId};
use crate::mining::{RelationMiner, StopFlag};
use crate::model::argument::Argument;
use crate::model::Rule;
use crate::necessity::EvidenceGraph;
use crate::recovery::derive_head_facts;

/// The complete outcome of one compression run. Together with the schema
/// and symbols of the original knowledge base it determines the original
/// fact store exactly (see [crate::recovery::reconstruct]).
#[derive(Debug)]
pub struct CompressionResult {
    /// The accepted rules, in acceptance order.
    pub rules: Vec<Rule>,
    /// Facts that must be stored: underived ones, plus one representative
    /// per derivation cycle.
    pub necessary: Vec<GroundFact>,
    /// Head tuples the rules derive that are not facts of the original.
    pub counterexamples: Vec<(RelationId, Box<[ConstantId]>)>,
    /// Constants that no stored fact, rule, or counterexample mentions.
    pub supplementary_constants: Vec<ConstantId>,
    /// The mining parameters the run used.
    pub config: MiningConfig,
}

impl CompressionResult {
    /// Renders the result with every id resolved to its name.
    pub fn report(&self, kb: &KnowledgeBase) -> CompressionReport {
        let fact_report = |relation: RelationId, tuple: &[ConstantId]| ReportFact {
            relation: kb.relation(relation).name().to_string(),
            tuple: tuple
                .iter()
                .map(|&constant| kb.symbols().get(constant).unwrap_or("<unknown>").to_string())
                .collect(),
        };

        CompressionReport {
            rules: self.rules.iter().map(|rule| rule.display(kb)).collect(),
            necessary: self
                .necessary
                .iter()
                .map(|&fact| fact_report(fact.relation, kb.fact(fact)))
                .collect(),
            counterexamples: self
                .counterexamples
                .iter()
                .map(|(relation, tuple)| fact_report(*relation, tuple))
                .collect(),
            supplementary_constants: self
                .supplementary_constants
                .iter()
                .map(|&constant| kb.symbols().get(constant).unwrap_or("<unknown>").to_string())
                .collect(),
            parameters: self.config.clone(),
        }
    }
}

/// A fact with its relation and constants resolved to names.
#[derive(Debug, Clone, Serialize)]
pub struct ReportFact {
    /// Relation name.
    pub relation: String,
    /// Constant names, in argument order.
    pub tuple: Vec<String>,
}

/// A [CompressionResult] with names instead of ids, ready for export.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionReport {
    /// Accepted rules, rendered.
    pub rules: Vec<String>,
    /// Facts that must be stored.
    pub necessary: Vec<ReportFact>,
    /// Derived tuples that are not facts of the original.
    pub counterexamples: Vec<ReportFact>,
    /// Constants mentioned nowhere else in the result.
    pub supplementary_constants: Vec<String>,
    /// The mining parameters the run used.
    pub parameters: MiningConfig,
}

/// Runs the miners over the target relations and assembles the result.
#[derive(Debug)]
pub struct Compressor {
    config: MiningConfig,
    stop: StopFlag,
}

impl Compressor {
    /// Creates a compressor with the given parameters.
    pub fn new(config: MiningConfig, stop: StopFlag) -> Self {
        Self { config, stop }
    }

    /// Compresses the knowledge base. Facts entailed by accepted rules are
    /// marked in place; the returned result holds everything needed to
    /// reconstruct the original fact store.
    pub fn compress(&self, kb: &mut KnowledgeBase) -> Result<CompressionResult, Error> {
        let targets = self.resolve_targets(kb)?;
        let promising = kb.promising_constants(self.config.min_constant_coverage);
        let domain: Vec<ConstantId> = (0..kb.constant_count()).collect();

        let mut graph = EvidenceGraph::new();
        let mut rules = Vec::new();
        let mut counterexamples: HashSet<(RelationId, Box<[ConstantId]>)> = HashSet::new();

        'targets: for target in targets {
            if kb.relation(target).len() == 0 {
                log::debug!("skipping empty relation {}", kb.relation(target).name());
                continue;
            }

            let mut miner = RelationMiner::new(target, self.config.clone(), self.stop.clone());
            loop {
                if self.stop.is_stopped() {
                    log::info!("compression interrupted");
                    break 'targets;
                }
                let Some(rule) = miner.find_rule(kb, &promising) else {
                    break;
                };

                for evidence in rule.evidence(kb) {
                    if kb.relation(target).is_entailed(evidence.head) {
                        continue;
                    }
                    kb.relation_mut(target).set_entailed(evidence.head);
                    graph.add_witness(
                        GroundFact {
                            relation: target,
                            index: evidence.head,
                        },
                        &evidence.body,
                    );
                }

                for tuple in derive_head_facts(rule.predicates(), kb, &domain) {
                    if kb.relation(target).find(&tuple).is_none() {
                        counterexamples.insert((target, tuple));
                    }
                }

                rules.push(rule);
            }

            log::info!(
                "relation {}: {} of {} facts entailed",
                kb.relation(target).name(),
                kb.relation(target).entailed_count(),
                kb.relation(target).len()
            );
        }

        let mut necessary = Vec::new();
        for (relation, store) in kb.relations().enumerate() {
            for index in 0..store.len() {
                let fact = GroundFact { relation, index };
                if !graph.is_derived(fact) {
                    necessary.push(fact);
                }
            }
        }
        necessary.extend(graph.feedback_vertices());
        necessary.sort_unstable();

        let mut counterexamples: Vec<(RelationId, Box<[ConstantId]>)> =
            counterexamples.into_iter().collect();
        counterexamples.sort_unstable();

        let supplementary_constants = self.leftover_constants(kb, &necessary, &counterexamples, &rules);

        Ok(CompressionResult {
            rules,
            necessary,
            counterexamples,
            supplementary_constants,
            config: self.config.clone(),
        })
    }

    fn resolve_targets(&self, kb: &KnowledgeBase) -> Result<Vec<RelationId>, Error> {
        if self.config.targets.is_empty() {
            return Ok((0..kb.relation_count()).collect());
        }
        self.config
            .targets
            .iter()
            .map(|name| {
                kb.find_relation(name)
                    .ok_or_else(|| Error::UnknownRelation(name.clone()))
            })
            .collect()
    }

    /// Constants the rest of the result never mentions. They are recorded
    /// so that recovery ranges free head slots over the right domain.
    fn leftover_constants(
        &self,
        kb: &KnowledgeBase,
        necessary: &[GroundFact],
        counterexamples: &[(RelationId, Box<[ConstantId]>)],
        rules: &[Rule],
    ) -> Vec<ConstantId> {
        let mut mentioned: HashSet<ConstantId> = HashSet::new();
        for &fact in necessary {
            mentioned.extend(kb.fact(fact).iter().copied());
        }
        for (_, tuple) in counterexamples {
            mentioned.extend(tuple.iter().copied());
        }
        for rule in rules {
            for predicate in rule.predicates() {
                for argument in &predicate.args {
                    if let Argument::Constant(value) = argument {
                        mentioned.insert(*value);
                    }
                }
            }
        }

        (0..kb.constant_count())
            .filter(|constant| !mentioned.contains(constant))
            .collect()
    }
}
