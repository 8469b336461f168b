//! Contraction hierarchy construction
//!
//! Nodes are contracted in rounds. Each round picks an independent set of
//! nodes whose priority is a local minimum, computes their shortcuts in
//! parallel, then commits them serially before the next round starts.

mod graph;
mod witness;

use kestrel_common::{Error, NodeId, Result};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::ContractorConfig;
use crate::ebg::EdgeBasedEdge;
use crate::static_graph::{QueryEdge, QueryEdgeData};
use graph::{ContractorEdge, ContractorGraph};
use witness::{necessary_shortcuts, Shortcut};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContractionStats {
    pub rounds: usize,
    pub shortcuts: usize,
    pub query_edges: usize,
}

pub struct Contractor {
    graph: ContractorGraph,
    config: ContractorConfig,
    priorities: Vec<f64>,
    depths: Vec<u32>,
    contracted_neighbours: Vec<u32>,
    contracted: Vec<bool>,
    /// Cheapest path leaving and re-entering each node, kept so a query can
    /// go round when the target lies behind the source on one node
    loops: Vec<Option<ContractorEdge>>,
    output: Vec<QueryEdge>,
    has_run: bool,
}

/// Priority inputs of one node, gathered by simulating its contraction
fn simulate(
    graph: &ContractorGraph,
    node: NodeId,
    config: &ContractorConfig,
    depth: u32,
    contracted_neighbours: u32,
) -> Result<f64> {
    let entries = graph.edges(node);
    let removed = entries.len().max(1) as f64;
    let removed_original = entries
        .iter()
        .map(|e| e.original_edges as f64)
        .sum::<f64>()
        .max(1.0);

    let shortcuts: Vec<Shortcut> = necessary_shortcuts(graph, node, config, |_| false)?
        .into_iter()
        .filter(|s| !s.is_loop())
        .collect();
    // each shortcut becomes a forward and a backward entry
    let added = 2.0 * shortcuts.len() as f64;
    let added_original = 2.0 * shortcuts.iter().map(|s| s.original_edges as f64).sum::<f64>();

    Ok(config.edge_quotient_factor * added / removed
        + config.original_quotient_factor * added_original / removed_original
        + config.depth_factor * depth as f64
        + config.contracted_neighbours_factor * contracted_neighbours as f64)
}

/// `(priority, id)` of `a` is below that of `b`
fn precedes(priorities: &[f64], a: NodeId, b: NodeId) -> bool {
    priorities[a as usize]
        .total_cmp(&priorities[b as usize])
        .then(a.cmp(&b))
        == Ordering::Less
}

fn is_local_minimum(graph: &ContractorGraph, priorities: &[f64], node: NodeId) -> bool {
    graph
        .edges(node)
        .iter()
        .all(|e| precedes(priorities, node, e.target))
}

impl Contractor {
    pub fn new(node_count: usize, edges: &[EdgeBasedEdge], config: ContractorConfig) -> Result<Self> {
        config.validate()?;
        let mut graph = ContractorGraph::new(node_count);
        let mut loops: Vec<Option<ContractorEdge>> = vec![None; node_count];
        let mut self_loops = 0usize;

        for edge in edges {
            if edge.source as usize >= node_count || edge.target as usize >= node_count {
                return Err(Error::integrity(format!(
                    "edge {}->{} outside of {node_count} nodes",
                    edge.source, edge.target
                )));
            }
            if edge.weight <= 0 {
                return Err(Error::integrity(format!(
                    "edge {}->{} has non-positive weight {}",
                    edge.source, edge.target, edge.weight
                )));
            }
            if edge.source == edge.target {
                self_loops += 1;
                keep_cheaper_loop(
                    &mut loops[edge.source as usize],
                    ContractorEdge {
                        target: edge.target,
                        weight: edge.weight,
                        id: edge.edge_id,
                        original_edges: 1,
                        shortcut: false,
                        forward: true,
                    },
                );
                continue;
            }
            if edge.forward {
                graph.insert_edge(edge.source, edge.target, edge.weight, edge.edge_id, 1, false);
            }
            if edge.backward {
                graph.insert_edge(edge.target, edge.source, edge.weight, edge.edge_id, 1, false);
            }
        }

        info!(
            nodes = node_count,
            entries = graph.number_of_entries(),
            self_loops,
            "contractor graph initialised"
        );
        Ok(Self {
            graph,
            config,
            priorities: vec![0.0; node_count],
            depths: vec![0; node_count],
            contracted_neighbours: vec![0; node_count],
            contracted: vec![false; node_count],
            loops,
            output: Vec::new(),
            has_run: false,
        })
    }

    /// Contract every node; can only be called once
    pub fn run(&mut self) -> Result<ContractionStats> {
        if self.has_run {
            return Err(Error::AlreadyRun);
        }
        self.has_run = true;

        if self.config.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .build()
                .map_err(|e| Error::Config(format!("cannot build thread pool: {e}")))?;
            pool.install(|| self.contract_all())
        } else {
            self.contract_all()
        }
    }

    fn contract_all(&mut self) -> Result<ContractionStats> {
        let started = Instant::now();
        let node_count = self.graph.number_of_nodes();

        {
            let graph = &self.graph;
            let config = &self.config;
            self.priorities = (0..node_count as NodeId)
                .into_par_iter()
                .map(|node| simulate(graph, node, config, 0, 0))
                .collect::<Result<Vec<_>>>()?;
        }

        let mut remaining: Vec<NodeId> = (0..node_count as NodeId).collect();
        let mut in_batch = vec![false; node_count];
        let mut stats = ContractionStats::default();

        while !remaining.is_empty() {
            stats.rounds += 1;
            let batch = self.select_batch(&remaining)?;

            for &node in &batch {
                in_batch[node as usize] = true;
            }
            let shortcuts: Vec<Vec<Shortcut>> = {
                let graph = &self.graph;
                let config = &self.config;
                let in_batch = &in_batch;
                batch
                    .par_iter()
                    .map(|&node| necessary_shortcuts(graph, node, config, |v| in_batch[v as usize]))
                    .collect::<Result<Vec<_>>>()?
            };
            for &node in &batch {
                in_batch[node as usize] = false;
            }

            // batch is in node-id order, so commits are deterministic
            let mut inserted = 0usize;
            for shortcut in shortcuts.iter().flatten() {
                if shortcut.is_loop() {
                    let improved = keep_cheaper_loop(
                        &mut self.loops[shortcut.source as usize],
                        ContractorEdge {
                            target: shortcut.target,
                            weight: shortcut.weight,
                            id: shortcut.middle,
                            original_edges: shortcut.original_edges,
                            shortcut: true,
                            forward: true,
                        },
                    );
                    inserted += improved as usize;
                    continue;
                }
                if self.graph.insert_edge(
                    shortcut.source,
                    shortcut.target,
                    shortcut.weight,
                    shortcut.middle,
                    shortcut.original_edges,
                    true,
                ) {
                    inserted += 1;
                }
            }
            stats.shortcuts += inserted;

            let mut touched = Vec::new();
            for &node in &batch {
                self.contracted[node as usize] = true;
                let entries = self.graph.take_edges(node);
                let depth = self.depths[node as usize] + 1;
                for entry in &entries {
                    let neighbour = entry.target;
                    self.graph.remove_edges_to(neighbour, node);
                    self.depths[neighbour as usize] = self.depths[neighbour as usize].max(depth);
                    self.contracted_neighbours[neighbour as usize] += 1;
                    touched.push(neighbour);
                    self.output.push(query_edge(node, entry));
                }
            }
            touched.sort_unstable();
            touched.dedup();
            self.update_priorities(&touched)?;

            remaining.retain(|&node| !self.contracted[node as usize]);
            debug!(
                round = stats.rounds,
                contracted = batch.len(),
                shortcuts = inserted,
                remaining = remaining.len(),
                "contraction round"
            );
        }

        stats.query_edges = self.merged_len();
        info!(
            rounds = stats.rounds,
            shortcuts = stats.shortcuts,
            query_edges = stats.query_edges,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "contraction finished"
        );
        Ok(stats)
    }

    /// Independent set of local minima, minus those whose refreshed priority
    /// no longer beats every neighbour
    fn select_batch(&mut self, remaining: &[NodeId]) -> Result<Vec<NodeId>> {
        let selected: Vec<NodeId> = {
            let graph = &self.graph;
            let priorities = &self.priorities;
            remaining
                .par_iter()
                .copied()
                .filter(|&node| is_local_minimum(graph, priorities, node))
                .collect()
        };

        let fresh: Vec<f64> = {
            let graph = &self.graph;
            let config = &self.config;
            let depths = &self.depths;
            let neighbours = &self.contracted_neighbours;
            selected
                .par_iter()
                .map(|&node| {
                    simulate(
                        graph,
                        node,
                        config,
                        depths[node as usize],
                        neighbours[node as usize],
                    )
                })
                .collect::<Result<Vec<_>>>()?
        };
        for (&node, &priority) in selected.iter().zip(&fresh) {
            self.priorities[node as usize] = priority;
        }

        let batch: Vec<NodeId> = selected
            .iter()
            .copied()
            .filter(|&node| is_local_minimum(&self.graph, &self.priorities, node))
            .collect();
        if !batch.is_empty() {
            return Ok(batch);
        }
        // every pick was deferred; the overall minimum is always safe
        let fallback = selected
            .iter()
            .copied()
            .min_by(|&a, &b| {
                self.priorities[a as usize]
                    .total_cmp(&self.priorities[b as usize])
                    .then(a.cmp(&b))
            })
            .or_else(|| remaining.first().copied());
        Ok(fallback.into_iter().collect())
    }

    fn update_priorities(&mut self, nodes: &[NodeId]) -> Result<()> {
        let updated: Vec<f64> = {
            let graph = &self.graph;
            let config = &self.config;
            let depths = &self.depths;
            let neighbours = &self.contracted_neighbours;
            nodes
                .par_iter()
                .map(|&node| {
                    simulate(
                        graph,
                        node,
                        config,
                        depths[node as usize],
                        neighbours[node as usize],
                    )
                })
                .collect::<Result<Vec<_>>>()?
        };
        for (&node, priority) in nodes.iter().zip(updated) {
            self.priorities[node as usize] = priority;
        }
        Ok(())
    }

    fn merged_len(&self) -> usize {
        merge_opposite_entries(self.output.clone()).len() + self.loops.iter().flatten().count()
    }

    /// Query edges sorted by `(source, target, ...)`; call after [`Self::run`]
    pub fn into_query_edges(self) -> Vec<QueryEdge> {
        let mut edges = self.output;
        edges.extend(
            self.loops
                .iter()
                .enumerate()
                .filter_map(|(node, entry)| entry.as_ref().map(|e| query_edge(node as NodeId, e))),
        );
        merge_opposite_entries(edges)
    }
}

/// Store `candidate` unless an equal or cheaper loop is already known
fn keep_cheaper_loop(slot: &mut Option<ContractorEdge>, candidate: ContractorEdge) -> bool {
    match slot {
        Some(known) if known.weight <= candidate.weight => false,
        _ => {
            *slot = Some(candidate);
            true
        }
    }
}

fn query_edge(source: NodeId, entry: &ContractorEdge) -> QueryEdge {
    QueryEdge {
        source,
        target: entry.target,
        data: QueryEdgeData {
            distance: entry.weight,
            id: entry.id,
            shortcut: entry.shortcut,
            forward: entry.forward,
            backward: !entry.forward,
        },
    }
}

/// Fold a forward and a backward entry with identical payload into one
/// bidirectional edge
fn merge_opposite_entries(mut edges: Vec<QueryEdge>) -> Vec<QueryEdge> {
    edges.sort_unstable_by_key(|e| (e.source, e.target, e.data));
    let mut merged: Vec<QueryEdge> = Vec::with_capacity(edges.len());
    for edge in edges {
        if let Some(last) = merged.last_mut() {
            let same_payload = last.source == edge.source
                && last.target == edge.target
                && last.data.distance == edge.data.distance
                && last.data.id == edge.data.id
                && last.data.shortcut == edge.data.shortcut;
            let opposite = (last.data.forward && !last.data.backward && edge.data.backward && !edge.data.forward)
                || (last.data.backward && !last.data.forward && edge.data.forward && !edge.data.backward);
            if same_payload && opposite {
                last.data.forward = true;
                last.data.backward = true;
                continue;
            }
        }
        merged.push(edge);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::static_graph::StaticGraph;
    use kestrel_common::EdgeWeight;

    fn edge(source: NodeId, target: NodeId, weight: EdgeWeight) -> EdgeBasedEdge {
        EdgeBasedEdge {
            source,
            target,
            edge_id: source * 100 + target,
            weight,
            forward: true,
            backward: false,
        }
    }

    fn contract(node_count: usize, edges: &[EdgeBasedEdge], config: ContractorConfig) -> Vec<QueryEdge> {
        let mut contractor = Contractor::new(node_count, edges, config).unwrap();
        contractor.run().unwrap();
        contractor.into_query_edges()
    }

    #[test]
    fn test_chain_gets_shortcut_around_middle() {
        // 0 -> 1 -> 2 with 1 the cheapest to contract
        let edges = [edge(0, 1, 3), edge(1, 2, 4)];
        let result = contract(3, &edges, ContractorConfig::default());
        assert!(result.iter().all(|e| e.data.distance > 0));
        // every original edge survives, stored at its lower endpoint
        assert!(result.iter().any(|e| e.data.id == 1 && !e.data.shortcut));
        assert!(result.iter().any(|e| e.data.id == 102 && !e.data.shortcut));
        let graph = StaticGraph::new(3, result).unwrap();
        assert_eq!(graph.number_of_nodes(), 3);
    }

    #[test]
    fn test_bidirectional_pair_is_merged() {
        let edges = [
            EdgeBasedEdge {
                forward: true,
                backward: true,
                ..edge(0, 1, 7)
            },
        ];
        let result = contract(2, &edges, ContractorConfig::default());
        assert_eq!(result.len(), 1);
        assert!(result[0].data.forward && result[0].data.backward);
        assert_eq!(result[0].source, 0);
    }

    #[test]
    fn test_self_loops_kept_and_parallel_edges_reduced() {
        let edges = [edge(0, 0, 5), edge(0, 0, 3), edge(0, 1, 9), edge(0, 1, 4)];
        let result = contract(2, &edges, ContractorConfig::default());
        assert_eq!(result.len(), 2);
        let self_loop = result.iter().find(|e| e.source == e.target).unwrap();
        assert_eq!((self_loop.source, self_loop.data.distance), (0, 3));
        assert!(self_loop.data.forward && !self_loop.data.backward);
        let plain = result.iter().find(|e| e.source != e.target).unwrap();
        assert_eq!(plain.data.distance, 4);
    }

    #[test]
    fn test_contracted_ring_leaves_a_loop_shortcut() {
        // one-way ring 0 -> 1 -> 2 -> 0
        let edges = [edge(0, 1, 2), edge(1, 2, 3), edge(2, 0, 4)];
        let result = contract(3, &edges, ContractorConfig::default());
        let loops: Vec<&QueryEdge> = result.iter().filter(|e| e.source == e.target).collect();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].data.distance, 9);
        assert!(loops[0].data.shortcut);
    }

    #[test]
    fn test_run_is_one_shot() {
        let mut contractor = Contractor::new(2, &[edge(0, 1, 1)], ContractorConfig::default()).unwrap();
        contractor.run().unwrap();
        assert!(matches!(contractor.run(), Err(Error::AlreadyRun)));
    }

    #[test]
    fn test_invalid_input_rejected() {
        assert!(matches!(
            Contractor::new(2, &[edge(0, 1, 0)], ContractorConfig::default()),
            Err(Error::DataIntegrity(_))
        ));
        assert!(matches!(
            Contractor::new(2, &[edge(0, 5, 1)], ContractorConfig::default()),
            Err(Error::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_shortcut_overflow_is_integrity_error() {
        let edges = [edge(0, 1, i32::MAX - 1), edge(1, 2, i32::MAX - 1)];
        let mut contractor = Contractor::new(3, &edges, ContractorConfig::default()).unwrap();
        assert!(matches!(contractor.run(), Err(Error::DataIntegrity(_))));
    }

    #[test]
    fn test_dedicated_thread_pool() {
        let config = ContractorConfig {
            threads: 2,
            ..ContractorConfig::default()
        };
        let edges = [edge(0, 1, 2), edge(1, 2, 2), edge(2, 0, 2)];
        let stats = {
            let mut contractor = Contractor::new(3, &edges, config).unwrap();
            contractor.run().unwrap()
        };
        assert!(stats.rounds >= 1);
    }
}
