//! Connected components of the node-based graph
//!
//! Segments of tiny components (islands, disconnected parking lots) are
//! flagged so that coarse snapping queries can skip them.

use kestrel_common::NodeId;

use super::node_based_graph::NodeBasedGraph;

pub struct ComponentSizes {
    root: Vec<NodeId>,
    size: Vec<u32>,
}

impl ComponentSizes {
    /// Weakly connected components over arcs traversable in either direction
    pub fn compute(graph: &NodeBasedGraph) -> Self {
        let n = graph.number_of_nodes();
        let mut parent: Vec<NodeId> = (0..n as NodeId).collect();
        let mut rank = vec![0u8; n];

        for u in 0..n as NodeId {
            for arc in graph.arcs(u) {
                let (a, b) = (find(&mut parent, u), find(&mut parent, arc.target));
                if a == b {
                    continue;
                }
                match rank[a as usize].cmp(&rank[b as usize]) {
                    std::cmp::Ordering::Less => parent[a as usize] = b,
                    std::cmp::Ordering::Greater => parent[b as usize] = a,
                    std::cmp::Ordering::Equal => {
                        parent[b as usize] = a;
                        rank[a as usize] += 1;
                    }
                }
            }
        }

        let root: Vec<NodeId> = (0..n as NodeId).map(|v| find(&mut parent, v)).collect();
        let mut size = vec![0u32; n];
        for &r in &root {
            size[r as usize] += 1;
        }
        Self { root, size }
    }

    pub fn component_size(&self, node: NodeId) -> u32 {
        self.size[self.root[node as usize] as usize]
    }

    pub fn is_small(&self, node: NodeId, threshold: usize) -> bool {
        (self.component_size(node) as usize) < threshold
    }

    pub fn number_of_components(&self) -> usize {
        self.root
            .iter()
            .enumerate()
            .filter(|&(v, &r)| v as NodeId == r)
            .count()
    }
}

fn find(parent: &mut [NodeId], mut v: NodeId) -> NodeId {
    while parent[v as usize] != v {
        let grandparent = parent[parent[v as usize] as usize];
        parent[v as usize] = grandparent;
        v = grandparent;
    }
    v
}
