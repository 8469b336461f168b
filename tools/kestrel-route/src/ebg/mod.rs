//! Edge-based graph construction
//!
//! Every traversable directed arc of the node-based graph becomes a node of
//! the edge-based graph; every legal turn between two arcs becomes an edge
//! whose weight is the weight of the arc being left plus the turn penalty.
//! Restrictions, barriers and u-turn rules decide which turns exist.

pub mod components;
pub mod compression;
pub mod node_based_graph;
pub mod restriction_map;
pub mod turn;

use kestrel_common::{EdgeWeight, Error, FixedPointCoordinate, NodeId, Result, SPECIAL_NODEID};
use rustc_hash::FxHashSet;
use tracing::info;

use crate::config::SpeedProfile;
use crate::formats::{GeometryTable, OriginalEdgeData};

pub use components::ComponentSizes;
pub use compression::GeometryCompressor;
pub use node_based_graph::{NodeBasedArc, NodeBasedGraph};
pub use restriction_map::RestrictionMap;
pub use turn::{classify_turn, SigmoidTurnFunction, TurnContext, TurnFunction, TurnInstruction};

/// A turn: edge of the edge-based graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeBasedEdge {
    pub source: NodeId,
    pub target: NodeId,
    /// Index into the original edge data table
    pub edge_id: u32,
    pub weight: EdgeWeight,
    pub forward: bool,
    pub backward: bool,
}

/// One geometry segment of a road, as indexed by the R-tree
///
/// Both directions of the road share the record; a direction that cannot be
/// travelled has `SPECIAL_NODEID` as its edge-based node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeBasedNode {
    /// Edge-based node travelling `u -> v`
    pub forward_node: NodeId,
    /// Edge-based node travelling `v -> u`
    pub reverse_node: NodeId,
    pub u: NodeId,
    pub v: NodeId,
    pub u_coordinate: FixedPointCoordinate,
    pub v_coordinate: FixedPointCoordinate,
    pub name_id: u32,
    /// Weight of this segment travelling forward
    pub forward_weight: EdgeWeight,
    /// Weight from the start of the forward edge-based node up to `u`
    pub forward_offset: EdgeWeight,
    pub reverse_weight: EdgeWeight,
    /// Weight from the start of the reverse edge-based node up to `v`
    pub reverse_offset: EdgeWeight,
    /// Geometry of the compressed forward arc, `SPECIAL_NODEID` if the arc
    /// is a single segment or cannot be travelled
    pub forward_geometry: u32,
    pub reverse_geometry: u32,
    /// Index of this segment along the forward arc
    pub segment_position: u32,
    pub small_component: bool,
}

impl EdgeBasedNode {
    pub const ENCODED_SIZE: usize = 4 * 4 + 2 * 8 + 4 + 4 * 4 + 3 * 4 + 1;

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.forward_node.to_le_bytes());
        out.extend_from_slice(&self.reverse_node.to_le_bytes());
        out.extend_from_slice(&self.u.to_le_bytes());
        out.extend_from_slice(&self.v.to_le_bytes());
        out.extend_from_slice(&self.u_coordinate.lat.to_le_bytes());
        out.extend_from_slice(&self.u_coordinate.lon.to_le_bytes());
        out.extend_from_slice(&self.v_coordinate.lat.to_le_bytes());
        out.extend_from_slice(&self.v_coordinate.lon.to_le_bytes());
        out.extend_from_slice(&self.name_id.to_le_bytes());
        out.extend_from_slice(&self.forward_weight.to_le_bytes());
        out.extend_from_slice(&self.forward_offset.to_le_bytes());
        out.extend_from_slice(&self.reverse_weight.to_le_bytes());
        out.extend_from_slice(&self.reverse_offset.to_le_bytes());
        out.extend_from_slice(&self.forward_geometry.to_le_bytes());
        out.extend_from_slice(&self.reverse_geometry.to_le_bytes());
        out.extend_from_slice(&self.segment_position.to_le_bytes());
        out.push(self.small_component as u8);
    }

    /// Decode from exactly [`Self::ENCODED_SIZE`] bytes
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::ENCODED_SIZE {
            return None;
        }
        let u32_at = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let i32_at = |i: usize| u32_at(i) as i32;
        Some(Self {
            forward_node: u32_at(0),
            reverse_node: u32_at(4),
            u: u32_at(8),
            v: u32_at(12),
            u_coordinate: FixedPointCoordinate::new(i32_at(16), i32_at(20)),
            v_coordinate: FixedPointCoordinate::new(i32_at(24), i32_at(28)),
            name_id: u32_at(32),
            forward_weight: i32_at(36),
            forward_offset: i32_at(40),
            reverse_weight: i32_at(44),
            reverse_offset: i32_at(48),
            forward_geometry: u32_at(52),
            reverse_geometry: u32_at(56),
            segment_position: u32_at(60),
            small_component: bytes[64] != 0,
        })
    }

    pub fn centroid(&self) -> FixedPointCoordinate {
        FixedPointCoordinate::new(
            ((self.u_coordinate.lat as i64 + self.v_coordinate.lat as i64) / 2) as i32,
            ((self.u_coordinate.lon as i64 + self.v_coordinate.lon as i64) / 2) as i32,
        )
    }
}

/// Everything the factory needs besides the node-based graph itself
pub struct FactoryInputs<'a> {
    pub restrictions: &'a RestrictionMap,
    pub barriers: &'a FxHashSet<NodeId>,
    pub traffic_signals: &'a FxHashSet<NodeId>,
    pub coordinates: &'a [FixedPointCoordinate],
    pub profile: &'a SpeedProfile,
}

pub struct EdgeBasedGraphFactory<'a> {
    graph: NodeBasedGraph,
    inputs: FactoryInputs<'a>,
    has_run: bool,
    number_of_edge_based_nodes: usize,
    edges: Vec<EdgeBasedEdge>,
    nodes: Vec<EdgeBasedNode>,
    original_edge_data: Vec<OriginalEdgeData>,
    geometry: GeometryTable,
}

impl<'a> EdgeBasedGraphFactory<'a> {
    pub fn new(graph: NodeBasedGraph, inputs: FactoryInputs<'a>) -> Result<Self> {
        if inputs.coordinates.len() != graph.number_of_nodes() {
            return Err(Error::integrity(format!(
                "{} coordinates for {} nodes",
                inputs.coordinates.len(),
                graph.number_of_nodes()
            )));
        }
        Ok(Self {
            graph,
            inputs,
            has_run: false,
            number_of_edge_based_nodes: 0,
            edges: Vec::new(),
            nodes: Vec::new(),
            original_edge_data: Vec::new(),
            geometry: GeometryTable::default(),
        })
    }

    /// Build the edge-based graph; can only be called once
    pub fn run(&mut self) -> Result<()> {
        if self.has_run {
            return Err(Error::AlreadyRun);
        }
        self.has_run = true;

        let geometry_of = self.renumber();
        self.generate_edge_based_nodes(&geometry_of)?;
        self.generate_turns(&geometry_of)?;

        info!(
            edge_based_nodes = self.number_of_edge_based_nodes,
            edge_based_edges = self.edges.len(),
            indexed_segments = self.nodes.len(),
            compressed_geometries = self.geometry.len(),
            "edge-expanded graph built"
        );
        Ok(())
    }

    pub fn number_of_edge_based_nodes(&self) -> usize {
        self.number_of_edge_based_nodes
    }

    pub fn take_edge_based_edges(&mut self) -> Vec<EdgeBasedEdge> {
        std::mem::take(&mut self.edges)
    }

    pub fn take_edge_based_nodes(&mut self) -> Vec<EdgeBasedNode> {
        std::mem::take(&mut self.nodes)
    }

    pub fn take_original_edge_data(&mut self) -> Vec<OriginalEdgeData> {
        std::mem::take(&mut self.original_edge_data)
    }

    pub fn take_geometry(&mut self) -> GeometryTable {
        std::mem::take(&mut self.geometry)
    }

    /// Assign edge-based ids to traversable arcs and register the geometry
    /// of compressed ones; returns the geometry id per edge-based node
    fn renumber(&mut self) -> Vec<u32> {
        let mut next: NodeId = 0;
        let mut geometry_of = Vec::new();
        for u in 0..self.graph.number_of_nodes() as NodeId {
            for arc in self.graph.arcs_mut(u).iter_mut() {
                if !arc.forward {
                    arc.edge_based_node = SPECIAL_NODEID;
                    continue;
                }
                arc.edge_based_node = next;
                next += 1;
                if arc.is_compressed() {
                    let mut nodes = arc.via.clone();
                    nodes.push(arc.target);
                    geometry_of.push(self.geometry.push(&nodes));
                } else {
                    geometry_of.push(SPECIAL_NODEID);
                }
            }
        }
        self.number_of_edge_based_nodes = next as usize;
        geometry_of
    }

    fn generate_edge_based_nodes(&mut self, geometry_of: &[u32]) -> Result<()> {
        let graph = &self.graph;
        let coordinates = self.inputs.coordinates;
        let threshold = self.inputs.profile.small_component_size;
        let components = (threshold > 0).then(|| ComponentSizes::compute(graph));

        for u in 0..graph.number_of_nodes() as NodeId {
            for arc in graph.arcs(u) {
                let t = arc.target;
                if u > t || arc.ignore_in_grid {
                    continue;
                }
                let Some(reverse) = graph.find_arc(t, u) else {
                    return Err(Error::integrity(format!("arc {u}->{t} has no reverse arc")));
                };
                if arc.edge_based_node == SPECIAL_NODEID && reverse.edge_based_node == SPECIAL_NODEID {
                    continue;
                }
                let segments = arc.segment_weights.len();
                if reverse.segment_weights.len() != segments || arc.via.len() + 1 != segments {
                    return Err(Error::integrity(format!(
                        "geometry of {u}->{t} disagrees with its reverse"
                    )));
                }

                let mut path = Vec::with_capacity(segments + 1);
                path.push(u);
                path.extend_from_slice(&arc.via);
                path.push(t);

                let small_component = components
                    .as_ref()
                    .is_some_and(|c| c.is_small(u, threshold));
                let geometry = |ebn: NodeId| {
                    geometry_of
                        .get(ebn as usize)
                        .copied()
                        .unwrap_or(SPECIAL_NODEID)
                };
                let forward_geometry = geometry(arc.edge_based_node);
                let reverse_geometry = geometry(reverse.edge_based_node);

                let mut forward_offset: EdgeWeight = 0;
                for i in 0..segments {
                    let j = segments - 1 - i;
                    let reverse_offset: EdgeWeight = reverse.segment_weights[..j].iter().sum();
                    let (a, b) = (path[i], path[i + 1]);
                    self.nodes.push(EdgeBasedNode {
                        forward_node: arc.edge_based_node,
                        reverse_node: reverse.edge_based_node,
                        u: a,
                        v: b,
                        u_coordinate: coordinates[a as usize],
                        v_coordinate: coordinates[b as usize],
                        name_id: arc.name_id,
                        forward_weight: arc.segment_weights[i],
                        forward_offset,
                        reverse_weight: reverse.segment_weights[j],
                        reverse_offset,
                        forward_geometry,
                        reverse_geometry,
                        segment_position: i as u32,
                        small_component,
                    });
                    forward_offset += arc.segment_weights[i];
                }
            }
        }
        Ok(())
    }

    fn generate_turns(&mut self, geometry_of: &[u32]) -> Result<()> {
        let graph = &self.graph;
        let inputs = &self.inputs;
        let profile = inputs.profile;
        let mut restricted = 0usize;
        let mut skipped_u_turns = 0usize;

        for u in 0..graph.number_of_nodes() as NodeId {
            for incoming in graph.arcs(u).iter().filter(|a| a.forward) {
                let v = incoming.target;
                let from = incoming.penultimate(u);
                let dead_end = graph.degree(v) == 1;
                let barrier = inputs.barriers.contains(&v);

                let mut allowed: Vec<&NodeBasedArc> = Vec::new();
                for outgoing in graph.arcs(v).iter().filter(|a| a.forward) {
                    let is_u_turn = outgoing.target == u;
                    if is_u_turn && !(dead_end || barrier) {
                        skipped_u_turns += 1;
                        continue;
                    }
                    if barrier && !is_u_turn {
                        continue;
                    }
                    if !inputs.restrictions.is_turn_allowed(from, v, outgoing.second()) {
                        restricted += 1;
                        continue;
                    }
                    allowed.push(outgoing);
                }
                let alternatives = allowed.iter().filter(|a| a.target != u).count();

                for outgoing in allowed {
                    let is_u_turn = outgoing.target == u;
                    let angle = if is_u_turn {
                        -180.0
                    } else {
                        crate::geo::turn_angle(
                            inputs.coordinates[from as usize],
                            inputs.coordinates[v as usize],
                            inputs.coordinates[outgoing.second() as usize],
                        )
                    };

                    let mut penalty: EdgeWeight = 0;
                    if inputs.traffic_signals.contains(&v) {
                        penalty += profile.traffic_signal_penalty;
                    }
                    if is_u_turn {
                        penalty += profile.u_turn_penalty;
                    }
                    if let Some(f) = &profile.turn_function {
                        penalty += f.penalty(angle).max(0);
                    }
                    let weight = incoming.weight.checked_add(penalty).ok_or_else(|| {
                        Error::integrity(format!("turn weight overflow at node {v}"))
                    })?;

                    let instruction = classify_turn(&TurnContext {
                        angle,
                        is_u_turn,
                        from_roundabout: incoming.roundabout,
                        to_roundabout: outgoing.roundabout,
                        same_name: incoming.name_id == outgoing.name_id
                            && incoming.name_id != kestrel_common::INVALID_NAME_ID,
                        alternatives,
                    });

                    let compressed = incoming.is_compressed();
                    let edge_id = self.original_edge_data.len() as u32;
                    self.original_edge_data.push(OriginalEdgeData {
                        via_node: if compressed {
                            geometry_of[incoming.edge_based_node as usize]
                        } else {
                            v
                        },
                        name_id: incoming.name_id,
                        turn_instruction: instruction,
                        compressed,
                    });
                    self.edges.push(EdgeBasedEdge {
                        source: incoming.edge_based_node,
                        target: outgoing.edge_based_node,
                        edge_id,
                        weight,
                        forward: true,
                        backward: false,
                    });
                }
            }
        }

        info!(restricted, skipped_u_turns, "turns generated");
        Ok(())
    }
}
