//! This module defines [Rule], the mutable unit of the search: a head
//! predicate plus body atoms, together with its [Fingerprint], its
//! [Eval], and the grounding backend that keeps both current.

use itertools::Itertools;
use std::collections::{HashMap, HashSet};

use crate::eval::{Eval, EvalMetric};
use crate::grounding::{
    body_occurrence, CacheUpdate, Evidence, Grounding, GroundingBackend, GroundingMode,
    IncrementalGrounding, RecalculatingGrounding,
};
use crate::kb::{ConstantId, KnowledgeBase, RelationId};

use super::argument::Argument;
use super::fingerprint::Fingerprint;
use super::predicate::{ArgPos, Predicate};

/// Outcome of one structural rule update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The update went through; fingerprint and evaluation are current.
    Normal,
    /// The resulting rule was constructed before; the rule is abandoned.
    Duplicated,
    /// The resulting rule is structurally illegal, or the grounding
    /// backend cannot follow the update direction.
    Invalid,
    /// The rule covers too small a share of its target relation; its
    /// fingerprint has been banned.
    InsufficientCoverage,
    /// The rule specializes a previously banned rule.
    TabuPruned,
}

/// Shared memory of the search: every fingerprint ever constructed, plus
/// the banned fingerprints grouped by body length.
///
/// The registry outlives individual rules; the miner keeps one per target
/// relation so that rules rejected in an earlier round stay rejected.
#[derive(Debug, Default)]
pub struct FingerprintRegistry {
    seen: HashSet<Fingerprint>,
    tabu: HashMap<usize, HashSet<Fingerprint>>,
}

impl FingerprintRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a fingerprint; returns `false` if it was already known.
    pub fn observe(&mut self, fingerprint: &Fingerprint) -> bool {
        self.seen.insert(fingerprint.clone())
    }

    /// Bans a fingerprint of the given body length and all of its future
    /// specializations.
    pub fn make_tabu(&mut self, body_length: usize, fingerprint: Fingerprint) {
        self.tabu.entry(body_length).or_default().insert(fingerprint);
    }

    /// True if a banned rule with at most `body_length` body atoms
    /// generalizes the given fingerprint.
    pub fn is_tabu(&self, body_length: usize, fingerprint: &Fingerprint) -> bool {
        self.tabu
            .iter()
            .filter(|(&banned_length, _)| banned_length <= body_length)
            .any(|(_, banned)| {
                banned
                    .iter()
                    .any(|candidate| candidate.generalization_of(fingerprint))
            })
    }
}

/// A first-order Horn rule under construction.
///
/// Rules are refined in place through the five specialization operators and
/// [Rule::unbind]; cloning a rule before refining keeps the original fully
/// usable, as the incremental grounding cache shares its compliance sets
/// copy-on-write.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Head first, body atoms after.
    predicates: Vec<Predicate>,
    /// Occurrence count per variable id; ids are kept dense.
    var_uses: Vec<usize>,
    fingerprint: Fingerprint,
    size: usize,
    eval: Eval,
    cumulative_info: f64,
    grounding: Grounding,
}

impl Rule {
    /// Creates the most general rule of a target relation: an all-empty
    /// head and no body. Its fingerprint is recorded in the registry.
    pub fn most_general(
        relation: RelationId,
        kb: &KnowledgeBase,
        mode: GroundingMode,
        registry: &mut FingerprintRegistry,
    ) -> Self {
        let predicates = vec![Predicate::most_general(
            relation,
            kb.relation(relation).arity(),
        )];
        let fingerprint = Fingerprint::new(&predicates);
        registry.observe(&fingerprint);

        let grounding = match mode {
            GroundingMode::Recalculating => Grounding::Recalculating(RecalculatingGrounding::new()),
            GroundingMode::Incremental => {
                Grounding::Incremental(IncrementalGrounding::new(relation, kb))
            }
        };

        let counts = grounding.entailment_counts(&predicates, kb);
        Self {
            predicates,
            var_uses: Vec::new(),
            fingerprint,
            size: 0,
            eval: Eval::new(counts.positives as f64, counts.total, 0),
            cumulative_info: 0.0,
            grounding,
        }
    }

    /// Binds a vacant slot to an already used variable.
    pub fn bind_to_existing_variable(
        &mut self,
        target: ArgPos,
        variable: usize,
        kb: &KnowledgeBase,
        registry: &mut FingerprintRegistry,
        min_coverage: f64,
    ) -> UpdateStatus {
        let anchor = body_occurrence(&self.predicates, variable)
            .or_else(|| self.head_occurrence(variable));
        let Some(anchor) = anchor else {
            return UpdateStatus::Invalid;
        };

        self.predicates[target.predicate].args[target.argument] = Argument::Variable(variable);
        self.var_uses[variable] += 1;

        let updates = [CacheUpdate::Join {
            first: target,
            second: anchor,
        }];
        self.finish_specialization(&updates, kb, registry, min_coverage)
    }

    /// Appends a most-general body atom of `relation` and binds its slot at
    /// `position` to an already used variable.
    pub fn bind_new_predicate_to_variable(
        &mut self,
        relation: RelationId,
        position: usize,
        variable: usize,
        kb: &KnowledgeBase,
        registry: &mut FingerprintRegistry,
        min_coverage: f64,
    ) -> UpdateStatus {
        let anchor = body_occurrence(&self.predicates, variable)
            .or_else(|| self.head_occurrence(variable));
        let Some(anchor) = anchor else {
            return UpdateStatus::Invalid;
        };

        let mut atom = Predicate::most_general(relation, kb.relation(relation).arity());
        atom.args[position] = Argument::Variable(variable);
        self.predicates.push(atom);
        self.var_uses[variable] += 1;

        let updates = [
            CacheUpdate::Extend { relation },
            CacheUpdate::Join {
                first: ArgPos::new(self.predicates.len() - 1, position),
                second: anchor,
            },
        ];
        self.finish_specialization(&updates, kb, registry, min_coverage)
    }

    /// Binds two vacant slots to a fresh variable.
    pub fn bind_fresh_variable(
        &mut self,
        first: ArgPos,
        second: ArgPos,
        kb: &KnowledgeBase,
        registry: &mut FingerprintRegistry,
        min_coverage: f64,
    ) -> UpdateStatus {
        let variable = self.var_uses.len();
        self.predicates[first.predicate].args[first.argument] = Argument::Variable(variable);
        self.predicates[second.predicate].args[second.argument] = Argument::Variable(variable);
        self.var_uses.push(2);

        let updates = [CacheUpdate::Join { first, second }];
        self.finish_specialization(&updates, kb, registry, min_coverage)
    }

    /// Appends a most-general body atom of `relation` and binds a fresh
    /// variable between its slot at `position` and an existing vacant slot.
    pub fn bind_new_predicate_fresh_variable(
        &mut self,
        relation: RelationId,
        position: usize,
        existing: ArgPos,
        kb: &KnowledgeBase,
        registry: &mut FingerprintRegistry,
        min_coverage: f64,
    ) -> UpdateStatus {
        let variable = self.var_uses.len();
        let mut atom = Predicate::most_general(relation, kb.relation(relation).arity());
        atom.args[position] = Argument::Variable(variable);
        self.predicates.push(atom);
        self.predicates[existing.predicate].args[existing.argument] = Argument::Variable(variable);
        self.var_uses.push(2);

        let updates = [
            CacheUpdate::Extend { relation },
            CacheUpdate::Join {
                first: ArgPos::new(self.predicates.len() - 1, position),
                second: existing,
            },
        ];
        self.finish_specialization(&updates, kb, registry, min_coverage)
    }

    /// Binds a vacant slot to a constant.
    pub fn bind_constant(
        &mut self,
        target: ArgPos,
        constant: ConstantId,
        kb: &KnowledgeBase,
        registry: &mut FingerprintRegistry,
        min_coverage: f64,
    ) -> UpdateStatus {
        self.predicates[target.predicate].args[target.argument] = Argument::Constant(constant);

        let updates = [CacheUpdate::Restrict {
            position: target,
            constant,
        }];
        self.finish_specialization(&updates, kb, registry, min_coverage)
    }

    /// Unbinds a slot (generalization). If the slot held a variable whose
    /// remaining occurrence count drops to one, that last occurrence is
    /// unbound as well and variable ids are re-compacted; body atoms left
    /// without bindings are dropped.
    ///
    /// Only rules with a recalculating backend can follow this direction;
    /// on an incremental cache the update is [UpdateStatus::Invalid].
    pub fn unbind(
        &mut self,
        target: ArgPos,
        kb: &KnowledgeBase,
        registry: &mut FingerprintRegistry,
        min_coverage: f64,
    ) -> UpdateStatus {
        let argument = self.predicates[target.predicate].args[target.argument];
        self.predicates[target.predicate].args[target.argument] = Argument::Empty;

        if let Argument::Variable(id) = argument {
            self.var_uses[id] -= 1;
            if self.var_uses[id] == 1 {
                // A variable with one occurrence constrains nothing.
                for predicate in &mut self.predicates {
                    for slot in &mut predicate.args {
                        if slot.variable() == Some(id) {
                            *slot = Argument::Empty;
                        }
                    }
                }
                self.var_uses[id] = 0;
            }
            if self.var_uses[id] == 0 {
                self.compact_variable(id);
            }
        }

        let mut is_head = true;
        self.predicates.retain(|predicate| {
            if is_head {
                is_head = false;
                true
            } else {
                !predicate.is_most_general()
            }
        });

        self.fingerprint = Fingerprint::new(&self.predicates);
        if !registry.observe(&self.fingerprint) {
            return UpdateStatus::Duplicated;
        }
        if !self.is_legal() {
            return UpdateStatus::Invalid;
        }
        let update = CacheUpdate::Relax { position: target };
        if self
            .grounding
            .apply(&update, &self.predicates, kb)
            .is_err()
        {
            return UpdateStatus::Invalid;
        }

        let counts = self.grounding.entailment_counts(&self.predicates, kb);
        if self.coverage_of(counts.covered, kb) < min_coverage {
            // Generalizations are rejected without banning the fingerprint.
            return UpdateStatus::InsufficientCoverage;
        }

        self.size -= 1;
        let previous = self.eval;
        self.eval = Eval::new(counts.positives as f64, counts.total, self.size);
        self.cumulative_info += self.eval.info_gain_over(&previous);
        UpdateStatus::Normal
    }

    /// Renames the highest variable id into the freed slot `id` so that
    /// ids stay dense.
    fn compact_variable(&mut self, id: usize) {
        let last = self.var_uses.len() - 1;
        if id != last {
            for predicate in &mut self.predicates {
                for slot in &mut predicate.args {
                    if slot.variable() == Some(last) {
                        *slot = Argument::Variable(id);
                    }
                }
            }
            self.var_uses.swap(id, last);
        }
        self.var_uses.pop();
    }

    /// The shared tail of every specialization operator, in fixed order:
    /// recompute the fingerprint, reject duplicates, reject illegal
    /// structures, reject tabu specializations, apply the cache updates,
    /// reject insufficient coverage (banning the fingerprint), and only
    /// then commit size and evaluation.
    fn finish_specialization(
        &mut self,
        updates: &[CacheUpdate],
        kb: &KnowledgeBase,
        registry: &mut FingerprintRegistry,
        min_coverage: f64,
    ) -> UpdateStatus {
        self.fingerprint = Fingerprint::new(&self.predicates);
        if !registry.observe(&self.fingerprint) {
            return UpdateStatus::Duplicated;
        }
        if !self.is_legal() {
            return UpdateStatus::Invalid;
        }
        if registry.is_tabu(self.body_len(), &self.fingerprint) {
            return UpdateStatus::TabuPruned;
        }

        for update in updates {
            if self.grounding.apply(update, &self.predicates, kb).is_err() {
                return UpdateStatus::Invalid;
            }
        }

        let counts = self.grounding.entailment_counts(&self.predicates, kb);
        if self.coverage_of(counts.covered, kb) < min_coverage {
            registry.make_tabu(self.body_len(), self.fingerprint.clone());
            return UpdateStatus::InsufficientCoverage;
        }

        self.size += 1;
        let previous = self.eval;
        self.eval = Eval::new(counts.positives as f64, counts.total, self.size);
        self.cumulative_info += self.eval.info_gain_over(&previous);
        UpdateStatus::Normal
    }

    fn coverage_of(&self, covered: usize, kb: &KnowledgeBase) -> f64 {
        let target_size = kb.relation(self.predicates[0].relation).len();
        if target_size == 0 {
            0.0
        } else {
            covered as f64 / target_size as f64
        }
    }

    /// Structural legality: no two identical predicates, no head variable
    /// without a body occurrence when a body exists, and no disconnected
    /// predicate fragments.
    fn is_legal(&self) -> bool {
        for (index, predicate) in self.predicates.iter().enumerate() {
            if self.predicates[index + 1..].contains(predicate) {
                return false;
            }
        }

        if self.body_len() > 0 {
            let head_linked = self.predicates[0].args.iter().all(|argument| {
                argument
                    .variable()
                    .map_or(true, |id| body_occurrence(&self.predicates, id).is_some())
            });
            if !head_linked {
                return false;
            }
        }

        self.is_connected()
    }

    /// Predicates sharing a variable belong together; the rule is legal
    /// only if all predicates end up in one component.
    fn is_connected(&self) -> bool {
        if self.predicates.len() < 2 {
            return true;
        }

        let mut components = UnionFind::new(self.predicates.len());
        for variable in 0..self.var_uses.len() {
            let mut previous: Option<usize> = None;
            for (index, predicate) in self.predicates.iter().enumerate() {
                let occurs = predicate
                    .args
                    .iter()
                    .any(|argument| argument.variable() == Some(variable));
                if occurs {
                    if let Some(previous) = previous {
                        components.union(previous, index);
                    }
                    previous = Some(index);
                }
            }
        }

        let root = components.find(0);
        (1..self.predicates.len()).all(|index| components.find(index) == root)
    }

    fn head_occurrence(&self, variable: usize) -> Option<ArgPos> {
        self.predicates[0]
            .args
            .iter()
            .position(|argument| argument.variable() == Some(variable))
            .map(|argument_index| ArgPos::new(0, argument_index))
    }

    /// All predicates, head first.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// The head predicate.
    pub fn head(&self) -> &Predicate {
        &self.predicates[0]
    }

    /// Number of body atoms.
    pub fn body_len(&self) -> usize {
        self.predicates.len() - 1
    }

    /// Number of distinct variables in use.
    pub fn variable_count(&self) -> usize {
        self.var_uses.len()
    }

    /// All vacant argument slots, head first.
    pub fn vacant_positions(&self) -> Vec<ArgPos> {
        self.positions_where(Argument::is_empty)
    }

    /// All bound argument slots, head first.
    pub fn bound_positions(&self) -> Vec<ArgPos> {
        self.positions_where(|argument| !argument.is_empty())
    }

    fn positions_where(&self, keep: impl Fn(&Argument) -> bool) -> Vec<ArgPos> {
        self.predicates
            .iter()
            .enumerate()
            .flat_map(|(predicate_index, predicate)| {
                predicate
                    .args
                    .iter()
                    .enumerate()
                    .filter(|(_, argument)| keep(argument))
                    .map(move |(argument_index, _)| ArgPos::new(predicate_index, argument_index))
            })
            .collect()
    }

    /// The canonical signature of the current structure.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// The current evaluation.
    pub fn eval(&self) -> &Eval {
        &self.eval
    }

    /// Completed binding operations.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Information gain accumulated along this rule's refinement history.
    pub fn cumulative_info(&self) -> f64 {
        self.cumulative_info
    }

    /// The rule's quality under the chosen metric.
    pub fn score(&self, metric: EvalMetric) -> f64 {
        match metric {
            EvalMetric::CompressionRatio => self.eval.compression_ratio(),
            EvalMetric::CompressionCapacity => self.eval.compression_capacity(),
            EvalMetric::InfoGain => self.cumulative_info,
        }
    }

    /// One grounding witness per covered head fact.
    pub fn evidence(&self, kb: &KnowledgeBase) -> Vec<Evidence> {
        self.grounding.evidence(&self.predicates, kb)
    }

    /// Renders the rule with relation and constant names resolved.
    pub fn display(&self, kb: &KnowledgeBase) -> String {
        let mut text = predicate_text(&self.predicates[0], kb);
        for (index, predicate) in self.predicates.iter().enumerate().skip(1) {
            text.push_str(if index == 1 { ":-" } else { "," });
            text.push_str(&predicate_text(predicate, kb));
        }
        text
    }
}

fn predicate_text(predicate: &Predicate, kb: &KnowledgeBase) -> String {
    let arguments = predicate
        .args
        .iter()
        .map(|argument| match argument {
            Argument::Empty => "?".to_string(),
            Argument::Variable(id) => format!("X{id}"),
            Argument::Constant(id) => kb
                .symbols()
                .get(*id)
                .unwrap_or("<unknown>")
                .to_string(),
        })
        .join(",");
    format!("{}({})", kb.relation(predicate.relation).name(), arguments)
}

/// Plain union-find over predicate indices, used by the connectivity check.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, element: usize) -> usize {
        let mut root = element;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = element;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, first: usize, second: usize) {
        let first = self.find(first);
        let second = self.find(second);
        self.parent[first] = second;
    }
}
