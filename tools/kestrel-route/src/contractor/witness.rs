//! Bounded local Dijkstra deciding which shortcuts are necessary

use kestrel_common::{EdgeWeight, Error, NodeId, Result};
use rustc_hash::FxHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::graph::ContractorGraph;
use crate::config::ContractorConfig;

/// A shortcut `source -> target` replacing `source -> middle -> target`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Shortcut {
    pub source: NodeId,
    pub target: NodeId,
    pub middle: NodeId,
    pub weight: EdgeWeight,
    pub original_edges: u32,
}

impl Shortcut {
    /// `source -> middle -> source`
    pub fn is_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Tentative distances from `source` over forward entries, never entering a
/// node for which `avoid` holds and never exceeding `ceiling`
pub(crate) fn witness_distances<F>(
    graph: &ContractorGraph,
    source: NodeId,
    ceiling: EdgeWeight,
    config: &ContractorConfig,
    avoid: F,
) -> FxHashMap<NodeId, EdgeWeight>
where
    F: Fn(NodeId) -> bool,
{
    let mut tentative: FxHashMap<NodeId, (EdgeWeight, u32)> = FxHashMap::default();
    let mut heap = BinaryHeap::new();
    let mut settled = 0usize;

    tentative.insert(source, (0, 0));
    heap.push(Reverse((0, source)));

    while let Some(Reverse((distance, node))) = heap.pop() {
        let Some(&(best, hops)) = tentative.get(&node) else {
            continue;
        };
        if distance > best {
            continue;
        }
        if distance > ceiling {
            break;
        }
        settled += 1;
        if settled > config.witness_settle_limit {
            break;
        }
        if hops >= config.witness_hop_limit {
            continue;
        }
        for edge in graph.edges(node).iter().filter(|e| e.forward) {
            if avoid(edge.target) {
                continue;
            }
            let Some(candidate) = distance.checked_add(edge.weight) else {
                continue;
            };
            if candidate > ceiling {
                continue;
            }
            let improves = tentative
                .get(&edge.target)
                .map_or(true, |&(known, _)| candidate < known);
            if improves {
                tentative.insert(edge.target, (candidate, hops + 1));
                heap.push(Reverse((candidate, edge.target)));
            }
        }
    }

    tentative.into_iter().map(|(node, (d, _))| (node, d)).collect()
}

/// Shortcuts needed to contract `node`; `avoid` marks nodes that witness
/// paths must not use besides `node` itself
pub(crate) fn necessary_shortcuts<F>(
    graph: &ContractorGraph,
    node: NodeId,
    config: &ContractorConfig,
    avoid: F,
) -> Result<Vec<Shortcut>>
where
    F: Fn(NodeId) -> bool,
{
    let entries = graph.edges(node);
    let mut shortcuts = Vec::new();

    for incoming in entries.iter().filter(|e| !e.forward) {
        let source = incoming.target;
        let mut candidates = Vec::new();
        let mut ceiling = 0;
        for outgoing in entries.iter().filter(|e| e.forward) {
            let weight = incoming.weight.checked_add(outgoing.weight).ok_or_else(|| {
                Error::integrity(format!(
                    "shortcut weight overflow {source}->{node}->{}",
                    outgoing.target
                ))
            })?;
            let original_edges = incoming.original_edges.saturating_add(outgoing.original_edges);
            if outgoing.target == source {
                // loops are never witnessed; the contractor keeps the cheapest
                shortcuts.push(Shortcut {
                    source,
                    target: source,
                    middle: node,
                    weight,
                    original_edges,
                });
                continue;
            }
            ceiling = ceiling.max(weight);
            candidates.push((outgoing, weight));
        }
        if candidates.is_empty() {
            continue;
        }

        let distances = if config.witness_search {
            witness_distances(graph, source, ceiling, config, |v| v == node || avoid(v))
        } else {
            FxHashMap::default()
        };

        for (outgoing, weight) in candidates {
            let witnessed = distances
                .get(&outgoing.target)
                .is_some_and(|&d| d <= weight);
            if !witnessed {
                shortcuts.push(Shortcut {
                    source,
                    target: outgoing.target,
                    middle: node,
                    weight,
                    original_edges: incoming.original_edges.saturating_add(outgoing.original_edges),
                });
            }
        }
    }
    Ok(shortcuts)
}
