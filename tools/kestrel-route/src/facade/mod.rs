//! Query-side view of a prepared dataset
//!
//! [`DataFacade`] is everything search and plugins may ask of the data.
//! [`Generation`] implements it over files written by `prepare`;
//! [`ReloadingFacade`] swaps generations when the dataset changes.

mod generation;
mod reload;

pub use generation::{Generation, ServerPaths};
pub use reload::{AtomicGeneration, FileGeneration, GenerationSignal, ReloadingFacade};

use kestrel_common::{EdgeId, FixedPointCoordinate, NodeId, Result};
use std::ops::Range;
use std::time::Instant;

use crate::ebg::TurnInstruction;
use crate::rtree::PhantomNode;
use crate::static_graph::QueryEdgeData;

pub trait DataFacade: Send + Sync {
    // contracted graph
    fn number_of_nodes(&self) -> usize;
    fn number_of_edges(&self) -> usize;
    fn out_degree(&self, node: NodeId) -> u32;
    fn adjacent_edge_range(&self, node: NodeId) -> Range<EdgeId>;
    fn target(&self, edge: EdgeId) -> NodeId;
    fn edge_data(&self, edge: EdgeId) -> &QueryEdgeData;
    fn find_edge(&self, from: NodeId, to: NodeId) -> EdgeId;
    fn find_edge_in_either_direction(&self, from: NodeId, to: NodeId) -> EdgeId;
    fn find_edge_indicate_if_reverse(&self, from: NodeId, to: NodeId) -> (EdgeId, bool);

    // auxiliary tables
    fn coordinate_of_node(&self, node: NodeId) -> Option<FixedPointCoordinate>;
    fn name_index_from_edge_id(&self, id: u32) -> u32;
    /// Empty for `INVALID_NAME_ID` and unknown ids
    fn name_for_id(&self, name_id: u32) -> &str;
    fn turn_instruction_for_edge_id(&self, id: u32) -> TurnInstruction;
    fn via_node_or_geometry_for_edge_id(&self, id: u32) -> u32;
    fn edge_is_compressed(&self, id: u32) -> bool;
    fn uncompressed_geometry(&self, geometry_id: u32) -> &[NodeId];

    // spatial lookups
    fn locate_closest_end_point_for_coordinate(
        &self,
        point: FixedPointCoordinate,
        zoom: u32,
        deadline: Option<Instant>,
    ) -> Result<Option<FixedPointCoordinate>>;
    fn find_phantom_node_for_coordinate(
        &self,
        point: FixedPointCoordinate,
        zoom: u32,
        deadline: Option<Instant>,
    ) -> Result<Option<PhantomNode>>;
    fn incremental_find_phantom_node_for_coordinate(
        &self,
        point: FixedPointCoordinate,
        zoom: u32,
        k: usize,
        deadline: Option<Instant>,
    ) -> Result<Vec<PhantomNode>>;

    fn check_sum(&self) -> u32;
    fn timestamp(&self) -> &str;
}
