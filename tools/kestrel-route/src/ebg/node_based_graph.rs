//! Node-based graph: one arc per direction of every import edge
//!
//! Arcs are kept even when their direction is not traversable, so turn
//! analysis still sees every road meeting at a node.

use kestrel_common::{EdgeWeight, Error, NodeId, Result, SPECIAL_NODEID};
use tracing::info;

use crate::formats::ImportEdge;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeBasedArc {
    pub target: NodeId,
    /// Total weight of travelling source -> target
    pub weight: EdgeWeight,
    /// Travel source -> target is allowed
    pub forward: bool,
    pub name_id: u32,
    pub roundabout: bool,
    pub access_restricted: bool,
    pub ignore_in_grid: bool,
    /// Nodes removed by compression, in travel order
    pub via: Vec<NodeId>,
    /// Weights of the `via.len() + 1` original segments, in travel order
    pub segment_weights: Vec<EdgeWeight>,
    /// Assigned by the edge-based graph factory
    pub edge_based_node: NodeId,
}

impl NodeBasedArc {
    /// The node next to `target` on this arc
    pub fn penultimate(&self, source: NodeId) -> NodeId {
        self.via.last().copied().unwrap_or(source)
    }

    /// The node next to the source on this arc
    pub fn second(&self) -> NodeId {
        self.via.first().copied().unwrap_or(self.target)
    }

    pub fn is_compressed(&self) -> bool {
        !self.via.is_empty()
    }

    fn same_class(&self, other: &NodeBasedArc) -> bool {
        self.name_id == other.name_id
            && self.roundabout == other.roundabout
            && self.access_restricted == other.access_restricted
            && self.ignore_in_grid == other.ignore_in_grid
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeBasedGraph {
    adjacency: Vec<Vec<NodeBasedArc>>,
}

impl NodeBasedGraph {
    /// Build from import edges; parallel edges collapse to the cheapest
    /// traversable arc per direction
    pub fn from_import_edges(node_count: usize, edges: &[ImportEdge]) -> Result<Self> {
        let mut adjacency: Vec<Vec<NodeBasedArc>> = vec![Vec::new(); node_count];
        let mut self_loops = 0usize;
        let mut closed = 0usize;

        for edge in edges {
            if edge.weight <= 0 {
                return Err(Error::integrity(format!(
                    "import edge {}->{} has non-positive weight {}",
                    edge.source, edge.target, edge.weight
                )));
            }
            if edge.source as usize >= node_count || edge.target as usize >= node_count {
                return Err(Error::integrity(format!(
                    "import edge {}->{} references a missing node",
                    edge.source, edge.target
                )));
            }
            if edge.source == edge.target {
                self_loops += 1;
                continue;
            }
            if !edge.flags.forward && !edge.flags.backward {
                closed += 1;
                continue;
            }
            let arc = |target: NodeId, forward: bool| NodeBasedArc {
                target,
                weight: edge.weight,
                forward,
                name_id: edge.name_id,
                roundabout: edge.flags.roundabout,
                access_restricted: edge.flags.access_restricted,
                ignore_in_grid: edge.flags.ignore_in_grid,
                via: Vec::new(),
                segment_weights: vec![edge.weight],
                edge_based_node: SPECIAL_NODEID,
            };
            insert_arc(&mut adjacency[edge.source as usize], arc(edge.target, edge.flags.forward));
            insert_arc(&mut adjacency[edge.target as usize], arc(edge.source, edge.flags.backward));
        }

        for arcs in &mut adjacency {
            arcs.sort_by_key(|a| a.target);
        }

        if self_loops > 0 || closed > 0 {
            info!(self_loops, closed, "skipped import edges");
        }
        Ok(Self { adjacency })
    }

    pub fn number_of_nodes(&self) -> usize {
        self.adjacency.len()
    }

    pub fn number_of_arcs(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    pub fn arcs(&self, node: NodeId) -> &[NodeBasedArc] {
        &self.adjacency[node as usize]
    }

    pub fn arcs_mut(&mut self, node: NodeId) -> &mut Vec<NodeBasedArc> {
        &mut self.adjacency[node as usize]
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.adjacency[node as usize].len()
    }

    pub fn find_arc(&self, source: NodeId, target: NodeId) -> Option<&NodeBasedArc> {
        self.adjacency[source as usize].iter().find(|a| a.target == target)
    }

    pub fn find_arc_mut(&mut self, source: NodeId, target: NodeId) -> Option<&mut NodeBasedArc> {
        self.adjacency[source as usize].iter_mut().find(|a| a.target == target)
    }

    /// Whether the two arcs of a degree-2 node can be fused into one
    pub(crate) fn arcs_are_compatible(
        &self,
        u: NodeId,
        v: NodeId,
        w: NodeId,
    ) -> bool {
        let (Some(uv), Some(vw), Some(wv), Some(vu)) = (
            self.find_arc(u, v),
            self.find_arc(v, w),
            self.find_arc(w, v),
            self.find_arc(v, u),
        ) else {
            return false;
        };
        uv.forward == vw.forward && wv.forward == vu.forward && uv.same_class(vw) && wv.same_class(vu)
    }
}

fn insert_arc(arcs: &mut Vec<NodeBasedArc>, arc: NodeBasedArc) {
    match arcs.iter_mut().find(|a| a.target == arc.target) {
        Some(existing) => {
            let replace = match (existing.forward, arc.forward) {
                (false, true) => true,
                (true, false) => false,
                _ => arc.weight < existing.weight,
            };
            if replace {
                *existing = arc;
            }
        }
        None => arcs.push(arc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::EdgeFlags;

    fn edge(source: NodeId, target: NodeId, weight: i32, flags: EdgeFlags) -> ImportEdge {
        ImportEdge {
            source,
            target,
            weight,
            name_id: 0,
            flags,
        }
    }

    #[test]
    fn test_arcs_in_both_directions() {
        let g = NodeBasedGraph::from_import_edges(3, &[edge(0, 1, 10, EdgeFlags::oneway())]).unwrap();
        assert_eq!(g.number_of_arcs(), 2);
        assert!(g.find_arc(0, 1).unwrap().forward);
        assert!(!g.find_arc(1, 0).unwrap().forward);
        assert_eq!(g.degree(2), 0);
    }

    #[test]
    fn test_parallel_edges_keep_cheapest_traversable() {
        let g = NodeBasedGraph::from_import_edges(
            2,
            &[
                edge(0, 1, 30, EdgeFlags::both_ways()),
                edge(0, 1, 10, EdgeFlags::oneway()),
            ],
        )
        .unwrap();
        assert_eq!(g.find_arc(0, 1).unwrap().weight, 10);
        // the oneway edge's closed reverse arc does not shadow the open one
        let back = g.find_arc(1, 0).unwrap();
        assert!(back.forward);
        assert_eq!(back.weight, 30);
    }

    #[test]
    fn test_self_loops_and_closed_edges_skipped() {
        let g = NodeBasedGraph::from_import_edges(
            2,
            &[
                edge(0, 0, 5, EdgeFlags::both_ways()),
                edge(0, 1, 5, EdgeFlags::default()),
            ],
        )
        .unwrap();
        assert_eq!(g.number_of_arcs(), 0);
    }

    #[test]
    fn test_non_positive_weight_is_fatal() {
        let err = NodeBasedGraph::from_import_edges(2, &[edge(0, 1, 0, EdgeFlags::both_ways())]).unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }
}
