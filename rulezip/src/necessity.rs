//! This module defines [EvidenceGraph], the dependency graph between facts
//! built from the grounding witnesses of accepted rules. It determines
//! which facts must stay in the compressed knowledge base: underived facts,
//! plus one representative per derivation cycle.

use std::collections::{HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction::Outgoing;

use crate::kb::GroundFact;

/// A node of the evidence graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NodeKind {
    /// A fact of the knowledge base.
    Fact(GroundFact),
    /// The common source of body-less derivations.
    Axiom,
}

/// Records, per derived fact, which facts its derivation rests on.
///
/// Edges run from a supporting fact to the fact it derives; a fact derived
/// by a body-less rule is supported by the shared axiom node instead.
#[derive(Debug, Default)]
pub struct EvidenceGraph {
    graph: DiGraph<NodeKind, ()>,
    nodes: HashMap<NodeKind, NodeIndex>,
    derived: HashSet<GroundFact>,
}

impl EvidenceGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one derivation: `head` follows from the facts in `body`.
    pub fn add_witness(&mut self, head: GroundFact, body: &[GroundFact]) {
        self.derived.insert(head);
        let target = self.node(NodeKind::Fact(head));
        if body.is_empty() {
            let axiom = self.node(NodeKind::Axiom);
            self.graph.update_edge(axiom, target, ());
            return;
        }
        for &support in body {
            let source = self.node(NodeKind::Fact(support));
            self.graph.update_edge(source, target, ());
        }
    }

    fn node(&mut self, kind: NodeKind) -> NodeIndex {
        if let Some(&index) = self.nodes.get(&kind) {
            return index;
        }
        let index = self.graph.add_node(kind);
        self.nodes.insert(kind, index);
        index
    }

    /// True if at least one derivation of `fact` has been recorded.
    pub fn is_derived(&self, fact: GroundFact) -> bool {
        self.derived.contains(&fact)
    }

    /// The facts with at least one recorded derivation.
    pub fn derived(&self) -> &HashSet<GroundFact> {
        &self.derived
    }

    /// Picks a set of facts whose removal from the graph leaves no
    /// derivation cycle: the members of each strongly connected component
    /// are removed greedily by descending in-degree times out-degree until
    /// the component is acyclic. Facts in the result must be kept even
    /// though they are derivable, since their derivations are circular.
    pub fn feedback_vertices(&self) -> Vec<GroundFact> {
        let mut result = Vec::new();

        for component in tarjan_scc(&self.graph) {
            let members: HashSet<NodeIndex> = component.iter().copied().collect();
            if component.len() == 1 && !self.graph.contains_edge(component[0], component[0]) {
                continue;
            }

            for node in self.break_component(&component, &members) {
                if let NodeKind::Fact(fact) = self.graph[node] {
                    result.push(fact);
                }
            }
        }

        result.sort_unstable();
        result
    }

    /// Greedy feedback-vertex selection within one strongly connected
    /// component.
    fn break_component(
        &self,
        component: &[NodeIndex],
        members: &HashSet<NodeIndex>,
    ) -> Vec<NodeIndex> {
        let mut successors: HashMap<NodeIndex, HashSet<NodeIndex>> = component
            .iter()
            .map(|&node| {
                let next = self
                    .graph
                    .neighbors_directed(node, Outgoing)
                    .filter(|target| members.contains(target))
                    .collect();
                (node, next)
            })
            .collect();
        let mut predecessors: HashMap<NodeIndex, HashSet<NodeIndex>> = component
            .iter()
            .map(|&node| (node, HashSet::new()))
            .collect();
        for (&node, next) in &successors {
            for &target in next {
                if let Some(sources) = predecessors.get_mut(&target) {
                    sources.insert(node);
                }
            }
        }

        let mut active: HashSet<NodeIndex> = members.clone();
        let mut chosen = Vec::new();

        let remove = |node: NodeIndex,
                      active: &mut HashSet<NodeIndex>,
                      successors: &mut HashMap<NodeIndex, HashSet<NodeIndex>>,
                      predecessors: &mut HashMap<NodeIndex, HashSet<NodeIndex>>| {
            active.remove(&node);
            if let Some(next) = successors.remove(&node) {
                for target in next {
                    if let Some(sources) = predecessors.get_mut(&target) {
                        sources.remove(&node);
                    }
                }
            }
            if let Some(sources) = predecessors.remove(&node) {
                for source in sources {
                    if let Some(next) = successors.get_mut(&source) {
                        next.remove(&node);
                    }
                }
            }
        };

        loop {
            // Peel nodes that cannot lie on a remaining cycle. A self-loop
            // keeps both degrees positive and survives the peeling.
            loop {
                let fringe: Vec<NodeIndex> = active
                    .iter()
                    .copied()
                    .filter(|node| {
                        successors.get(node).is_none_or(HashSet::is_empty)
                            || predecessors.get(node).is_none_or(HashSet::is_empty)
                    })
                    .collect();
                if fringe.is_empty() {
                    break;
                }
                for node in fringe {
                    remove(node, &mut active, &mut successors, &mut predecessors);
                }
            }

            let candidate = active.iter().copied().max_by_key(|node| {
                let degree_product = predecessors
                    .get(node)
                    .map_or(0, HashSet::len)
                    * successors.get(node).map_or(0, HashSet::len);
                (degree_product, std::cmp::Reverse(node.index()))
            });
            let Some(candidate) = candidate else {
                break;
            };
            remove(candidate, &mut active, &mut successors, &mut predecessors);
            chosen.push(candidate);
        }

        chosen
    }
}

#[cfg(test)]
mod test {
    use crate::kb::GroundFact;

    use super::EvidenceGraph;

    fn fact(index: usize) -> GroundFact {
        GroundFact { relation: 0, index }
    }

    #[test]
    fn chains_need_no_feedback_vertex() {
        let mut graph = EvidenceGraph::new();
        graph.add_witness(fact(1), &[fact(0)]);
        graph.add_witness(fact(2), &[fact(1)]);

        assert!(!graph.is_derived(fact(0)));
        assert!(graph.is_derived(fact(1)));
        assert!(graph.is_derived(fact(2)));
        assert!(graph.feedback_vertices().is_empty());
    }

    #[test]
    fn a_two_cycle_keeps_exactly_one_member() {
        let mut graph = EvidenceGraph::new();
        graph.add_witness(fact(0), &[fact(1)]);
        graph.add_witness(fact(1), &[fact(0)]);

        let feedback = graph.feedback_vertices();
        assert_eq!(feedback.len(), 1);
        assert!(feedback[0] == fact(0) || feedback[0] == fact(1));
    }

    #[test]
    fn a_self_derivation_keeps_its_fact() {
        let mut graph = EvidenceGraph::new();
        graph.add_witness(fact(0), &[fact(0)]);

        assert_eq!(graph.feedback_vertices(), vec![fact(0)]);
    }

    #[test]
    fn axiom_derivations_never_cycle() {
        let mut graph = EvidenceGraph::new();
        graph.add_witness(fact(0), &[]);
        graph.add_witness(fact(1), &[]);
        graph.add_witness(fact(2), &[fact(0), fact(1)]);

        assert!(graph.is_derived(fact(0)));
        assert!(graph.feedback_vertices().is_empty());
    }

    #[test]
    fn nested_cycles_are_all_broken() {
        let mut graph = EvidenceGraph::new();
        // 0 <-> 1 and 1 <-> 2; removing 1 breaks both cycles.
        graph.add_witness(fact(1), &[fact(0)]);
        graph.add_witness(fact(0), &[fact(1)]);
        graph.add_witness(fact(2), &[fact(1)]);
        graph.add_witness(fact(1), &[fact(2)]);

        assert_eq!(graph.feedback_vertices(), vec![fact(1)]);
    }
}
