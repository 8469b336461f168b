//! One loaded, immutable dataset

use kestrel_common::{
    EdgeId, Error, FixedPointCoordinate, NodeId, Result, INVALID_NAME_ID, SPECIAL_NODEID,
};
use std::ffi::OsString;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use super::DataFacade;
use crate::ebg::TurnInstruction;
use crate::formats::{
    timestamp, GeometryFile, GeometryTable, HsgrFile, NameTable, NamesFile, NodeMapFile,
    OriginalEdgeData, OriginalEdgeDataFile,
};
use crate::rtree::{PhantomNode, StaticRTree};
use crate::static_graph::{QueryEdgeData, QueryGraph};

/// Locations of every file a generation is loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPaths {
    pub hsgr: PathBuf,
    pub nodes: PathBuf,
    pub edges: PathBuf,
    pub names: PathBuf,
    pub geometry: PathBuf,
    pub ram_index: PathBuf,
    pub file_index: PathBuf,
    pub timestamp: PathBuf,
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl ServerPaths {
    /// Conventional `<base>.<ext>` layout written by `prepare`
    pub fn from_base<P: AsRef<Path>>(base: P) -> Self {
        let base = base.as_ref();
        Self {
            hsgr: with_suffix(base, ".hsgr"),
            nodes: with_suffix(base, ".nodes"),
            edges: with_suffix(base, ".edges"),
            names: with_suffix(base, ".names"),
            geometry: with_suffix(base, ".geometry"),
            ram_index: with_suffix(base, ".ramIndex"),
            file_index: with_suffix(base, ".fileIndex"),
            timestamp: with_suffix(base, ".timestamp"),
        }
    }
}

pub struct Generation {
    version: u64,
    graph: QueryGraph,
    checksum: u32,
    coordinates: Vec<FixedPointCoordinate>,
    edge_data: Vec<OriginalEdgeData>,
    names: NameTable,
    geometry: GeometryTable,
    rtree: StaticRTree,
    timestamp: String,
}

impl Generation {
    pub fn load(paths: &ServerPaths, version: u64) -> Result<Self> {
        let started = Instant::now();
        let hsgr = HsgrFile::read(&paths.hsgr)?;
        let coordinates = NodeMapFile::read_coordinates(&paths.nodes)?;
        let edge_data = OriginalEdgeDataFile::read(&paths.edges)?;
        let names = NamesFile::read(&paths.names)?;
        let geometry = GeometryFile::read(&paths.geometry)?;
        let rtree = StaticRTree::load(&paths.ram_index, &paths.file_index)?;
        let timestamp = timestamp::read(&paths.timestamp)?;

        let graph = hsgr.graph;
        if let Some(entry) = graph
            .edge_array()
            .iter()
            .find(|e| !e.data.shortcut && e.data.id as usize >= edge_data.len())
        {
            return Err(Error::integrity(format!(
                "query edge references original edge {} of {}",
                entry.data.id,
                edge_data.len()
            )));
        }
        if let Some(data) = edge_data
            .iter()
            .find(|d| d.compressed && d.via_node as usize >= geometry.len())
        {
            return Err(Error::integrity(format!(
                "edge data references geometry {} of {}",
                data.via_node,
                geometry.len()
            )));
        }
        if rtree.node_bound() as usize > graph.number_of_nodes() {
            return Err(Error::integrity(format!(
                "spatial index references edge-based node {} of {}",
                rtree.node_bound() - 1,
                graph.number_of_nodes()
            )));
        }

        info!(
            version,
            nodes = graph.number_of_nodes(),
            edges = graph.number_of_edges(),
            coordinates = coordinates.len(),
            names = names.len(),
            timestamp = %timestamp,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generation loaded"
        );
        Ok(Self {
            version,
            graph,
            checksum: hsgr.checksum,
            coordinates,
            edge_data,
            names,
            geometry,
            rtree,
            timestamp,
        })
    }

    /// Token of the signal this generation was loaded for
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl DataFacade for Generation {
    fn number_of_nodes(&self) -> usize {
        self.graph.number_of_nodes()
    }

    fn number_of_edges(&self) -> usize {
        self.graph.number_of_edges()
    }

    fn out_degree(&self, node: NodeId) -> u32 {
        self.graph.out_degree(node)
    }

    fn adjacent_edge_range(&self, node: NodeId) -> Range<EdgeId> {
        self.graph.adjacent_edge_range(node)
    }

    fn target(&self, edge: EdgeId) -> NodeId {
        self.graph.target(edge)
    }

    fn edge_data(&self, edge: EdgeId) -> &QueryEdgeData {
        self.graph.edge_data(edge)
    }

    fn find_edge(&self, from: NodeId, to: NodeId) -> EdgeId {
        self.graph.find_edge(from, to)
    }

    fn find_edge_in_either_direction(&self, from: NodeId, to: NodeId) -> EdgeId {
        self.graph.find_edge_in_either_direction(from, to)
    }

    fn find_edge_indicate_if_reverse(&self, from: NodeId, to: NodeId) -> (EdgeId, bool) {
        self.graph.find_edge_indicate_if_reverse(from, to)
    }

    fn coordinate_of_node(&self, node: NodeId) -> Option<FixedPointCoordinate> {
        self.coordinates.get(node as usize).copied()
    }

    fn name_index_from_edge_id(&self, id: u32) -> u32 {
        self.edge_data
            .get(id as usize)
            .map_or(INVALID_NAME_ID, |d| d.name_id)
    }

    fn name_for_id(&self, name_id: u32) -> &str {
        self.names.get(name_id)
    }

    fn turn_instruction_for_edge_id(&self, id: u32) -> TurnInstruction {
        self.edge_data
            .get(id as usize)
            .map_or(TurnInstruction::NoTurn, |d| d.turn_instruction)
    }

    fn via_node_or_geometry_for_edge_id(&self, id: u32) -> u32 {
        self.edge_data
            .get(id as usize)
            .map_or(SPECIAL_NODEID, |d| d.via_node)
    }

    fn edge_is_compressed(&self, id: u32) -> bool {
        self.edge_data.get(id as usize).is_some_and(|d| d.compressed)
    }

    fn uncompressed_geometry(&self, geometry_id: u32) -> &[NodeId] {
        self.geometry.get(geometry_id)
    }

    fn locate_closest_end_point_for_coordinate(
        &self,
        point: FixedPointCoordinate,
        zoom: u32,
        deadline: Option<Instant>,
    ) -> Result<Option<FixedPointCoordinate>> {
        self.rtree
            .locate_closest_end_point_for_coordinate(point, zoom, deadline)
    }

    fn find_phantom_node_for_coordinate(
        &self,
        point: FixedPointCoordinate,
        zoom: u32,
        deadline: Option<Instant>,
    ) -> Result<Option<PhantomNode>> {
        self.rtree.find_phantom_node_for_coordinate(point, zoom, deadline)
    }

    fn incremental_find_phantom_node_for_coordinate(
        &self,
        point: FixedPointCoordinate,
        zoom: u32,
        k: usize,
        deadline: Option<Instant>,
    ) -> Result<Vec<PhantomNode>> {
        self.rtree
            .incremental_find_phantom_node_for_coordinate(point, zoom, k, deadline)
    }

    fn check_sum(&self) -> u32 {
        self.checksum
    }

    fn timestamp(&self) -> &str {
        &self.timestamp
    }
}
