//! Bidirectional contraction hierarchy query and path unpacking

use kestrel_common::{EdgeId, EdgeWeight, Error, FixedPointCoordinate, NodeId, Result, SPECIAL_NODEID};
use priority_queue::PriorityQueue;
use rustc_hash::FxHashMap;
use std::cmp::Reverse;
use std::ops::Range;
use tracing::trace;

use crate::facade::DataFacade;
use crate::rtree::PhantomNode;
use crate::static_graph::{QueryEdgeData, QueryGraph};

/// The graph surface the query needs
pub trait SearchGraph {
    fn adjacent_edge_range(&self, node: NodeId) -> Range<EdgeId>;
    fn target(&self, edge: EdgeId) -> NodeId;
    fn edge_data(&self, edge: EdgeId) -> &QueryEdgeData;
}

impl SearchGraph for QueryGraph {
    fn adjacent_edge_range(&self, node: NodeId) -> Range<EdgeId> {
        QueryGraph::adjacent_edge_range(self, node)
    }

    fn target(&self, edge: EdgeId) -> NodeId {
        QueryGraph::target(self, edge)
    }

    fn edge_data(&self, edge: EdgeId) -> &QueryEdgeData {
        QueryGraph::edge_data(self, edge)
    }
}

impl SearchGraph for dyn DataFacade + '_ {
    fn adjacent_edge_range(&self, node: NodeId) -> Range<EdgeId> {
        DataFacade::adjacent_edge_range(self, node)
    }

    fn target(&self, edge: EdgeId) -> NodeId {
        DataFacade::target(self, edge)
    }

    fn edge_data(&self, edge: EdgeId) -> &QueryEdgeData {
        DataFacade::edge_data(self, edge)
    }
}

struct SearchSide {
    heap: PriorityQueue<NodeId, Reverse<EdgeWeight>>,
    /// tentative distance and parent (itself for seeds)
    labels: FxHashMap<NodeId, (EdgeWeight, NodeId)>,
    /// lower bound on what the opposite side can contribute
    opposite_floor: EdgeWeight,
}

impl SearchSide {
    fn seeded(seeds: &[(NodeId, EdgeWeight)]) -> Self {
        let mut side = Self {
            heap: PriorityQueue::new(),
            labels: FxHashMap::default(),
            opposite_floor: 0,
        };
        for &(node, weight) in seeds {
            side.improve(node, weight, node);
        }
        side
    }

    fn improve(&mut self, node: NodeId, weight: EdgeWeight, parent: NodeId) {
        let better = self.labels.get(&node).map_or(true, |&(known, _)| weight < known);
        if better {
            self.labels.insert(node, (weight, parent));
            self.heap.push_increase(node, Reverse(weight));
        }
    }

    /// Smallest seed weight; searches only grow from there
    fn floor(&self) -> EdgeWeight {
        self.labels.values().map(|&(w, _)| w).min().unwrap_or(0)
    }
}

/// Where the two searches met
#[derive(Debug, Clone, Copy)]
struct Meeting {
    weight: EdgeWeight,
    node: NodeId,
    /// the path goes once round the node's loop edge
    looped: bool,
}

impl Meeting {
    const NONE: Meeting = Meeting {
        weight: EdgeWeight::MAX,
        node: NodeId::MAX,
        looped: false,
    };

    fn offer(&mut self, weight: EdgeWeight, node: NodeId, looped: bool) {
        if weight >= 0 && weight < self.weight {
            *self = Meeting { weight, node, looped };
        }
    }
}

/// Cheapest edge leaving `node` and coming back to it
fn loop_weight<G: SearchGraph + ?Sized>(graph: &G, node: NodeId) -> Option<EdgeWeight> {
    graph
        .adjacent_edge_range(node)
        .filter(|&e| graph.target(e) == node && graph.edge_data(e).forward)
        .map(|e| graph.edge_data(e).distance)
        .min()
}

/// One settle step; updates `best` when the searches meet
fn step<G: SearchGraph + ?Sized>(
    graph: &G,
    side: &mut SearchSide,
    other: &SearchSide,
    forward: bool,
    best: &mut Meeting,
) {
    let Some((node, Reverse(distance))) = side.heap.pop() else {
        return;
    };
    if distance.saturating_add(side.opposite_floor) >= best.weight {
        side.heap.clear();
        return;
    }
    if let Some(&(other_distance, _)) = other.labels.get(&node) {
        let total = distance.saturating_add(other_distance);
        if total >= 0 {
            best.offer(total, node, false);
        } else if let Some(round) = loop_weight(graph, node) {
            // the target lies behind the source on this node: go round once
            best.offer(total.saturating_add(round), node, true);
        }
    }
    for edge in graph.adjacent_edge_range(node) {
        let data = graph.edge_data(edge);
        let usable = if forward { data.forward } else { data.backward };
        if !usable {
            continue;
        }
        let target = graph.target(edge);
        side.improve(target, distance.saturating_add(data.distance), node);
    }
}

/// Bidirectional CH search between weighted seed sets; returns the weight
/// and the packed node path
pub fn ch_query<G: SearchGraph + ?Sized>(
    graph: &G,
    sources: &[(NodeId, EdgeWeight)],
    targets: &[(NodeId, EdgeWeight)],
) -> Option<(EdgeWeight, Vec<NodeId>)> {
    let mut forward = SearchSide::seeded(sources);
    let mut backward = SearchSide::seeded(targets);
    forward.opposite_floor = backward.floor();
    backward.opposite_floor = forward.floor();

    let mut best = Meeting::NONE;
    while !forward.heap.is_empty() || !backward.heap.is_empty() {
        step(graph, &mut forward, &backward, true, &mut best);
        step(graph, &mut backward, &forward, false, &mut best);
    }
    if best.weight == EdgeWeight::MAX {
        return None;
    }

    let meeting = best.node;
    let mut path = Vec::new();
    let mut node = meeting;
    while let Some(&(_, parent)) = forward.labels.get(&node) {
        path.push(node);
        if parent == node {
            break;
        }
        node = parent;
    }
    path.reverse();
    if best.looped {
        path.push(meeting);
    }
    node = meeting;
    while let Some(&(_, parent)) = backward.labels.get(&node) {
        if parent == node {
            break;
        }
        path.push(parent);
        node = parent;
    }
    trace!(weight = best.weight, meeting, looped = best.looped, hops = path.len(), "ch query done");
    Some((best.weight, path))
}

/// Cheapest edge usable from `u` to `v`: a forward edge stored at `u` or a
/// backward edge stored at `v`
fn smallest_edge<G: SearchGraph + ?Sized>(graph: &G, u: NodeId, v: NodeId) -> Option<QueryEdgeData> {
    let stored_at_u = graph
        .adjacent_edge_range(u)
        .filter(|&e| graph.target(e) == v && graph.edge_data(e).forward);
    let stored_at_v = graph
        .adjacent_edge_range(v)
        .filter(|&e| graph.target(e) == u && graph.edge_data(e).backward);
    let at_u: Vec<QueryEdgeData> = stored_at_u.map(|e| *graph.edge_data(e)).collect();
    let at_v: Vec<QueryEdgeData> = stored_at_v.map(|e| *graph.edge_data(e)).collect();
    at_u.into_iter().chain(at_v).min_by_key(|d| d.distance)
}

/// Expand shortcuts of a packed path; yields original edge ids in travel order
pub fn unpack_path<G: SearchGraph + ?Sized>(graph: &G, packed: &[NodeId]) -> Result<Vec<u32>> {
    let mut unpacked = Vec::with_capacity(packed.len());
    let mut stack: Vec<(NodeId, NodeId)> = packed.windows(2).rev().map(|w| (w[0], w[1])).collect();
    while let Some((u, v)) = stack.pop() {
        let Some(data) = smallest_edge(graph, u, v) else {
            return Err(Error::integrity(format!("no edge between {u} and {v} while unpacking")));
        };
        if data.shortcut {
            let middle = data.id;
            stack.push((middle, v));
            stack.push((u, middle));
        } else {
            unpacked.push(data.id);
        }
    }
    Ok(unpacked)
}

/// Result of a point-to-point query
#[derive(Debug, Clone)]
pub struct RawRoute {
    pub weight: EdgeWeight,
    /// Edge-based nodes of the contracted path
    pub packed_path: Vec<NodeId>,
    /// Original edge ids (turns) in travel order
    turns: Vec<u32>,
    pub source: PhantomNode,
    pub target: PhantomNode,
}

impl RawRoute {
    pub fn segments(&self) -> &[u32] {
        &self.turns
    }

    fn starts_forward(&self) -> bool {
        self.packed_path.first() == Some(&self.source.forward_node)
    }

    fn ends_forward(&self) -> bool {
        self.packed_path.last() == Some(&self.target.forward_node)
    }

    /// Node-based nodes passed by each turn, in travel order
    fn turn_nodes(&self, facade: &dyn DataFacade, turn: u32) -> Vec<NodeId> {
        let via = facade.via_node_or_geometry_for_edge_id(turn);
        if facade.edge_is_compressed(turn) {
            facade.uncompressed_geometry(via).to_vec()
        } else {
            vec![via]
        }
    }

    /// Full polyline: source point, every passed node, target point
    pub fn geometry(&self, facade: &dyn DataFacade) -> Vec<FixedPointCoordinate> {
        let mut nodes: Vec<NodeId> = Vec::new();
        if self.turns.is_empty() {
            // source and target on one edge-based node: walk its arc between them
            let forward = self.starts_forward();
            let arc = arc_nodes(facade, &self.source, forward);
            let from = travel_position(&self.source, forward, arc.len());
            let to = travel_position(&self.target, forward, arc.len());
            if from < to {
                nodes.extend_from_slice(&arc[from..to]);
            }
        } else {
            for (i, &turn) in self.turns.iter().enumerate() {
                let mut passed = self.turn_nodes(facade, turn);
                if i == 0 {
                    // drop what lies behind the source point on its arc
                    let from = travel_position(&self.source, self.starts_forward(), passed.len());
                    passed.drain(..from);
                }
                nodes.extend(passed);
            }
            // the target arc up to the segment holding the target point
            let forward = self.ends_forward();
            let arc = arc_nodes(facade, &self.target, forward);
            let to = travel_position(&self.target, forward, arc.len());
            nodes.extend_from_slice(&arc[..to]);
        }

        let mut line = Vec::with_capacity(nodes.len() + 2);
        line.push(self.source.location);
        line.extend(nodes.iter().filter_map(|&n| facade.coordinate_of_node(n)));
        line.push(self.target.location);
        line.dedup();
        line
    }
}

/// Nodes of the phantom's compressed arc after its first node, in travel
/// order; empty for a single-segment arc
fn arc_nodes<'a>(facade: &'a dyn DataFacade, phantom: &PhantomNode, forward: bool) -> &'a [NodeId] {
    let geometry = if forward {
        phantom.forward_geometry
    } else {
        phantom.reverse_geometry
    };
    if geometry == SPECIAL_NODEID {
        &[]
    } else {
        facade.uncompressed_geometry(geometry)
    }
}

/// Index of the phantom's segment counted in travel direction, clamped to
/// an arc of `arc_len` nodes
fn travel_position(phantom: &PhantomNode, forward: bool, arc_len: usize) -> usize {
    let position = phantom.segment_position as usize;
    let travelled = if forward {
        position
    } else {
        arc_len.saturating_sub(1).saturating_sub(position)
    };
    travelled.min(arc_len)
}

fn phantom_seeds(phantom: &PhantomNode, sign: EdgeWeight) -> Vec<(NodeId, EdgeWeight)> {
    let mut seeds = Vec::with_capacity(2);
    if phantom.has_forward() {
        seeds.push((phantom.forward_node, sign * phantom.forward_weight_to_point()));
    }
    if phantom.has_reverse() {
        seeds.push((phantom.reverse_node, sign * phantom.reverse_weight_to_point()));
    }
    seeds
}

/// Shortest route between two snapped points; `None` if unreachable
pub fn shortest_path(
    facade: &dyn DataFacade,
    source: &PhantomNode,
    target: &PhantomNode,
) -> Result<Option<RawRoute>> {
    let sources = phantom_seeds(source, -1);
    let targets = phantom_seeds(target, 1);
    let Some((weight, packed_path)) = ch_query(facade, &sources, &targets) else {
        return Ok(None);
    };
    let turns = unpack_path(facade, &packed_path)?;
    Ok(Some(RawRoute {
        weight,
        packed_path,
        turns,
        source: *source,
        target: *target,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::static_graph::{InputEdge, StaticGraph};

    fn query_edge(
        source: NodeId,
        target: NodeId,
        distance: EdgeWeight,
        id: u32,
        shortcut: bool,
        forward: bool,
        backward: bool,
    ) -> InputEdge<QueryEdgeData> {
        InputEdge {
            source,
            target,
            data: QueryEdgeData {
                distance,
                id,
                shortcut,
                forward,
                backward,
            },
        }
    }

    /// Path 0 -> 1 -> 2 with 1 contracted first (lowest rank), 0 then 2
    fn hierarchy() -> QueryGraph {
        StaticGraph::new(
            3,
            vec![
                // shortcut 0 -> 2 via 1, stored at 0 (lower than 2)
                query_edge(0, 2, 7, 1, true, true, false),
                // edge 0 -> 1 stored at 1 as backward
                query_edge(1, 0, 3, 10, false, false, true),
                // edge 1 -> 2 stored at 1 as forward
                query_edge(1, 2, 4, 11, false, true, false),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_query_uses_shortcut_and_unpacks() {
        let graph = hierarchy();
        let (weight, packed) = ch_query(&graph, &[(0, 0)], &[(2, 0)]).unwrap();
        assert_eq!(weight, 7);
        assert_eq!(packed, vec![0, 2]);
        assert_eq!(unpack_path(&graph, &packed).unwrap(), vec![10, 11]);
    }

    #[test]
    fn test_unreachable_is_none() {
        let graph = hierarchy();
        // nothing leads back to 0
        assert!(ch_query(&graph, &[(2, 0)], &[(0, 0)]).is_none());
    }

    #[test]
    fn test_negative_meeting_is_rejected() {
        let graph = hierarchy();
        // same node, target offset behind the source offset
        assert!(ch_query(&graph, &[(1, -5)], &[(1, 2)]).is_none());
        let (weight, packed) = ch_query(&graph, &[(1, -2)], &[(1, 5)]).unwrap();
        assert_eq!(weight, 3);
        assert_eq!(packed, vec![1]);
    }

    /// One-way ring 0 -> 1 -> 2 -> 0 (edges 100, 101, 102) contracted in
    /// the order 0, 2, 1: node 1 keeps the round trip as a loop shortcut
    fn ring() -> QueryGraph {
        StaticGraph::new(
            3,
            vec![
                query_edge(0, 1, 2, 100, false, true, false),
                query_edge(0, 2, 4, 102, false, false, true),
                query_edge(1, 1, 9, 2, true, true, false),
                query_edge(2, 1, 3, 101, false, false, true),
                query_edge(2, 1, 6, 0, true, true, false),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_target_behind_source_goes_round_the_loop() {
        let graph = ring();
        let (weight, packed) = ch_query(&graph, &[(1, -5)], &[(1, 2)]).unwrap();
        assert_eq!(weight, 6);
        assert_eq!(packed, vec![1, 1]);
        assert_eq!(unpack_path(&graph, &packed).unwrap(), vec![101, 102, 100]);

        // target ahead of the source stays on the node
        let (weight, packed) = ch_query(&graph, &[(1, -2)], &[(1, 5)]).unwrap();
        assert_eq!(weight, 3);
        assert_eq!(packed, vec![1]);
    }

    #[test]
    fn test_offsets_shift_the_total() {
        let graph = hierarchy();
        let (weight, _) = ch_query(&graph, &[(0, -2)], &[(2, 1)]).unwrap();
        assert_eq!(weight, 6);
    }

    #[test]
    fn test_unpack_reports_missing_edge() {
        let graph = hierarchy();
        assert!(matches!(unpack_path(&graph, &[2, 0]), Err(Error::DataIntegrity(_))));
    }

    #[test]
    fn test_unpack_prefers_cheapest_parallel_edge() {
        let graph = StaticGraph::new(
            2,
            vec![
                query_edge(0, 1, 9, 1, false, true, false),
                query_edge(0, 1, 4, 2, false, true, false),
            ],
        )
        .unwrap();
        assert_eq!(unpack_path(&graph, &[0, 1]).unwrap(), vec![2]);
    }
}
