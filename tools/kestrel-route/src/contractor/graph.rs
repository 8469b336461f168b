//! Mutable adjacency used while contracting
//!
//! Every directed edge `s -> t` lives twice: as a forward entry at `s` and as
//! a backward entry at `t`. Entries carry a single direction each.

use kestrel_common::{EdgeWeight, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContractorEdge {
    pub target: NodeId,
    pub weight: EdgeWeight,
    /// Middle node for shortcuts, original edge id otherwise
    pub id: u32,
    /// Number of original edges this entry stands for
    pub original_edges: u32,
    pub shortcut: bool,
    /// `true`: stored at the edge's source, `false`: stored at its target
    pub forward: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ContractorGraph {
    adjacency: Vec<Vec<ContractorEdge>>,
}

impl ContractorGraph {
    pub fn new(node_count: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); node_count],
        }
    }

    pub fn number_of_nodes(&self) -> usize {
        self.adjacency.len()
    }

    pub fn number_of_entries(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    pub fn edges(&self, node: NodeId) -> &[ContractorEdge] {
        &self.adjacency[node as usize]
    }

    /// Insert, or lower the weight of an existing entry with the same target
    /// and direction; returns whether anything changed
    pub fn insert_or_decrease(&mut self, node: NodeId, edge: ContractorEdge) -> bool {
        let entries = &mut self.adjacency[node as usize];
        match entries
            .iter_mut()
            .find(|e| e.target == edge.target && e.forward == edge.forward)
        {
            Some(existing) if edge.weight < existing.weight => {
                *existing = edge;
                true
            }
            Some(_) => false,
            None => {
                entries.push(edge);
                true
            }
        }
    }

    /// Add `source -> target` as both a forward and a backward entry
    pub fn insert_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        weight: EdgeWeight,
        id: u32,
        original_edges: u32,
        shortcut: bool,
    ) -> bool {
        let entry = |target, forward| ContractorEdge {
            target,
            weight,
            id,
            original_edges,
            shortcut,
            forward,
        };
        let changed_forward = self.insert_or_decrease(source, entry(target, true));
        let changed_backward = self.insert_or_decrease(target, entry(source, false));
        changed_forward || changed_backward
    }

    pub fn take_edges(&mut self, node: NodeId) -> Vec<ContractorEdge> {
        std::mem::take(&mut self.adjacency[node as usize])
    }

    pub fn remove_edges_to(&mut self, node: NodeId, target: NodeId) {
        self.adjacency[node as usize].retain(|e| e.target != target);
    }
}
