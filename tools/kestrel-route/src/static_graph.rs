//! Immutable CSR adjacency used by the query side
//!
//! `node_array[n]` is the index of the first edge of node `n`; the array has
//! one trailing sentinel equal to the edge count, so the edges of `n` are
//! always `node_array[n]..node_array[n + 1]`, including for the last node.

use kestrel_common::{EdgeId, EdgeWeight, Error, NodeId, Result, SPECIAL_EDGEID};
use std::ops::Range;

/// Edge payloads must expose a weight so parallel edges can be ranked
pub trait EdgeWeighted {
    fn weight(&self) -> EdgeWeight;
}

/// Input edge for graph construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEdge<E> {
    pub source: NodeId,
    pub target: NodeId,
    pub data: E,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeArrayEntry<E> {
    pub target: NodeId,
    pub data: E,
}

/// Payload of the contracted query graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryEdgeData {
    pub distance: EdgeWeight,
    /// Middle node for shortcuts, original edge id otherwise
    pub id: u32,
    pub shortcut: bool,
    pub forward: bool,
    pub backward: bool,
}

impl EdgeWeighted for QueryEdgeData {
    fn weight(&self) -> EdgeWeight {
        self.distance
    }
}

pub type QueryEdge = InputEdge<QueryEdgeData>;
pub type QueryGraph = StaticGraph<QueryEdgeData>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticGraph<E> {
    node_array: Vec<EdgeId>,
    edge_array: Vec<EdgeArrayEntry<E>>,
}

impl<E: EdgeWeighted + Copy> StaticGraph<E> {
    /// Build from edges sorted by `(source, target)`
    pub fn new(node_count: usize, edges: Vec<InputEdge<E>>) -> Result<Self> {
        let mut node_array = Vec::with_capacity(node_count + 1);
        let mut edge_array = Vec::with_capacity(edges.len());

        let mut previous: Option<(NodeId, NodeId)> = None;
        for edge in &edges {
            if edge.source as usize >= node_count || edge.target as usize >= node_count {
                return Err(Error::integrity(format!(
                    "edge {}->{} outside of {} nodes",
                    edge.source, edge.target, node_count
                )));
            }
            if previous.is_some_and(|p| p > (edge.source, edge.target)) {
                return Err(Error::integrity("input edges are not sorted by (source, target)"));
            }
            previous = Some((edge.source, edge.target));
        }

        let mut edge = 0usize;
        for node in 0..node_count {
            node_array.push(edge as EdgeId);
            while edge < edges.len() && edges[edge].source as usize == node {
                edge += 1;
            }
        }
        node_array.push(edges.len() as EdgeId);

        for input in edges {
            edge_array.push(EdgeArrayEntry {
                target: input.target,
                data: input.data,
            });
        }

        Self::from_parts(node_array, edge_array)
    }

    /// Build from an already laid out node array (with sentinel) and edge array
    pub fn from_parts(node_array: Vec<EdgeId>, edge_array: Vec<EdgeArrayEntry<E>>) -> Result<Self> {
        let Some(&sentinel) = node_array.last() else {
            return Err(Error::integrity("node array lacks its sentinel entry"));
        };
        if sentinel as usize != edge_array.len() {
            return Err(Error::integrity(format!(
                "node array sentinel {} does not match {} edges",
                sentinel,
                edge_array.len()
            )));
        }
        if let Some(n) = node_array.windows(2).position(|w| w[0] > w[1]) {
            return Err(Error::integrity(format!("first_edge decreases at node {n}")));
        }
        let node_count = node_array.len() - 1;
        for (e, entry) in edge_array.iter().enumerate() {
            if entry.data.weight() <= 0 {
                return Err(Error::integrity(format!(
                    "edge {e} to {} has non-positive weight {}",
                    entry.target,
                    entry.data.weight()
                )));
            }
            if entry.target as usize >= node_count {
                return Err(Error::integrity(format!("edge {e} targets missing node {}", entry.target)));
            }
        }
        Ok(Self {
            node_array,
            edge_array,
        })
    }

    pub fn number_of_nodes(&self) -> usize {
        self.node_array.len() - 1
    }

    pub fn number_of_edges(&self) -> usize {
        self.edge_array.len()
    }

    pub fn out_degree(&self, node: NodeId) -> u32 {
        self.end_edges(node) - self.begin_edges(node)
    }

    pub fn begin_edges(&self, node: NodeId) -> EdgeId {
        self.node_array[node as usize]
    }

    pub fn end_edges(&self, node: NodeId) -> EdgeId {
        self.node_array[node as usize + 1]
    }

    pub fn adjacent_edge_range(&self, node: NodeId) -> Range<EdgeId> {
        self.begin_edges(node)..self.end_edges(node)
    }

    pub fn target(&self, edge: EdgeId) -> NodeId {
        self.edge_array[edge as usize].target
    }

    pub fn edge_data(&self, edge: EdgeId) -> &E {
        &self.edge_array[edge as usize].data
    }

    /// Minimum-weight edge `from -> to`, or `SPECIAL_EDGEID`
    pub fn find_edge(&self, from: NodeId, to: NodeId) -> EdgeId {
        let mut best = SPECIAL_EDGEID;
        let mut best_weight = EdgeWeight::MAX;
        for edge in self.adjacent_edge_range(from) {
            if self.target(edge) == to {
                let weight = self.edge_data(edge).weight();
                if weight < best_weight {
                    best = edge;
                    best_weight = weight;
                }
            }
        }
        best
    }

    pub fn find_edge_in_either_direction(&self, from: NodeId, to: NodeId) -> EdgeId {
        let edge = self.find_edge(from, to);
        if edge != SPECIAL_EDGEID {
            return edge;
        }
        self.find_edge(to, from)
    }

    /// Like [`Self::find_edge_in_either_direction`]; the flag is set when the
    /// edge was found stored at `to`
    pub fn find_edge_indicate_if_reverse(&self, from: NodeId, to: NodeId) -> (EdgeId, bool) {
        let edge = self.find_edge(from, to);
        if edge != SPECIAL_EDGEID {
            return (edge, false);
        }
        let edge = self.find_edge(to, from);
        (edge, edge != SPECIAL_EDGEID)
    }

    pub fn node_array(&self) -> &[EdgeId] {
        &self.node_array
    }

    pub fn edge_array(&self) -> &[EdgeArrayEntry<E>] {
        &self.edge_array
    }
}
