//! Preparation pipeline: import file in, query dataset out
//!
//! ```text
//! <base>.import + <base>.restrictions
//!   -> node-based graph -> compression -> edge-expanded graph
//!   -> .nodes .edges .names .geometry .timestamp
//!   -> .ramIndex .fileIndex
//!   -> contraction -> .hsgr
//! ```

use kestrel_common::{Error, NodeId, Result};
use rustc_hash::FxHashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::{ContractorConfig, SpeedProfile};
use crate::contractor::Contractor;
use crate::ebg::{
    EdgeBasedEdge, EdgeBasedGraphFactory, EdgeBasedNode, FactoryInputs, GeometryCompressor, NodeBasedGraph,
    RestrictionMap,
};
use crate::facade::ServerPaths;
use crate::formats::{
    crc, timestamp, GeometryFile, GeometryTable, HsgrFile, ImportData, ImportFile, NameTable, NamesFile, NodeMapFile,
    OriginalEdgeData, OriginalEdgeDataFile, RestrictionsFile, TurnRestriction,
};
use crate::rtree;
use crate::static_graph::QueryGraph;

/// Inputs and outputs of one preparation run
#[derive(Debug, Clone)]
pub struct PreparePaths {
    pub import: PathBuf,
    /// Absent means no restrictions
    pub restrictions: Option<PathBuf>,
    pub output: ServerPaths,
}

impl PreparePaths {
    /// `<base>.import`, `<base>.restrictions` if present, outputs next to them
    pub fn from_base<P: AsRef<Path>>(base: P) -> Self {
        let base = base.as_ref();
        let restrictions = with_suffix(base, ".restrictions");
        Self {
            import: with_suffix(base, ".import"),
            restrictions: restrictions.exists().then_some(restrictions),
            output: ServerPaths::from_base(base),
        }
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTiming {
    pub stage: &'static str,
    pub elapsed: Duration,
}

/// Counts and timings of a finished run
#[derive(Debug, Clone, Default)]
pub struct PrepareSummary {
    pub nodes: usize,
    pub import_edges: usize,
    pub restrictions: usize,
    pub compressed_nodes: usize,
    pub edge_based_nodes: usize,
    pub edge_based_edges: usize,
    pub indexed_segments: usize,
    pub geometries: usize,
    pub checksum: u32,
    pub contraction_rounds: usize,
    pub shortcuts: usize,
    pub query_edges: usize,
    pub stages: Vec<StageTiming>,
    pub total: Duration,
}

fn timed<T>(stages: &mut Vec<StageTiming>, stage: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let started = Instant::now();
    let value = f()?;
    let elapsed = started.elapsed();
    info!(stage, elapsed_ms = elapsed.as_millis() as u64, "stage done");
    stages.push(StageTiming { stage, elapsed });
    Ok(value)
}

/// Output of the edge expansion stage
struct EdgeExpandedGraph {
    node_count: usize,
    edges: Vec<EdgeBasedEdge>,
    segments: Vec<EdgeBasedNode>,
    original_edge_data: Vec<OriginalEdgeData>,
    geometry: GeometryTable,
}

pub struct PrepareContext {
    paths: PreparePaths,
    profile: SpeedProfile,
    contractor: ContractorConfig,
    import: ImportData,
    restrictions: Vec<TurnRestriction>,
    timestamp: Option<String>,
}

impl PrepareContext {
    pub fn load(paths: PreparePaths, profile: SpeedProfile, contractor: ContractorConfig) -> Result<Self> {
        contractor.validate()?;
        let import = ImportFile::read(&paths.import)?;
        if import.nodes.is_empty() {
            return Err(Error::EmptyDataset("import nodes"));
        }
        if import.edges.is_empty() {
            return Err(Error::EmptyDataset("import edges"));
        }
        let restrictions = match &paths.restrictions {
            Some(path) => RestrictionsFile::read(path)?,
            None => Vec::new(),
        };
        info!(
            nodes = import.nodes.len(),
            edges = import.edges.len(),
            names = import.names.len(),
            restrictions = restrictions.len(),
            "import loaded"
        );
        Ok(Self {
            paths,
            profile,
            contractor,
            import,
            restrictions,
            timestamp: None,
        })
    }

    /// Timestamp to publish instead of the current time
    pub fn with_timestamp<S: Into<String>>(mut self, timestamp: S) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn run(self) -> Result<PrepareSummary> {
        let started = Instant::now();
        let mut summary = PrepareSummary {
            nodes: self.import.nodes.len(),
            import_edges: self.import.edges.len(),
            restrictions: self.restrictions.len(),
            ..PrepareSummary::default()
        };
        let mut stages = Vec::new();

        let restriction_map = RestrictionMap::new(&self.restrictions);
        let barriers: FxHashSet<NodeId> = self.import.barrier_nodes().collect();
        let traffic_signals: FxHashSet<NodeId> = self.import.traffic_signal_nodes().collect();
        let coordinates = self.import.coordinates();

        let mut graph = timed(&mut stages, "build_node_based_graph", || self.build_node_based_graph())?;
        if self.profile.compress_geometry {
            summary.compressed_nodes = timed(&mut stages, "compress_geometry", || {
                GeometryCompressor::new(&barriers, &traffic_signals, &restriction_map).compress(&mut graph)
            })?;
        }
        let inputs = FactoryInputs {
            restrictions: &restriction_map,
            barriers: &barriers,
            traffic_signals: &traffic_signals,
            coordinates: &coordinates,
            profile: &self.profile,
        };
        let expanded = timed(&mut stages, "build_edge_expanded_graph", || {
            build_edge_expanded_graph(graph, inputs)
        })?;
        summary.edge_based_nodes = expanded.node_count;
        summary.edge_based_edges = expanded.edges.len();
        summary.indexed_segments = expanded.segments.len();
        summary.geometries = expanded.geometry.len();

        timed(&mut stages, "write_tables", || {
            self.write_tables(&expanded.original_edge_data, &expanded.geometry)
        })?;
        timed(&mut stages, "build_rtree", || {
            rtree::build(&expanded.segments, &self.paths.output.ram_index, &self.paths.output.file_index)
        })?;
        summary.checksum = timed(&mut stages, "checksum", || Ok(segment_checksum(&expanded.segments)))?;

        let graph = timed(&mut stages, "contract", || {
            let mut contractor = Contractor::new(expanded.node_count, &expanded.edges, self.contractor.clone())?;
            let stats = contractor.run()?;
            summary.contraction_rounds = stats.rounds;
            summary.shortcuts = stats.shortcuts;
            QueryGraph::new(expanded.node_count, contractor.into_query_edges())
        })?;
        summary.query_edges = graph.number_of_edges();
        timed(&mut stages, "write_hsgr", || {
            HsgrFile::write(&self.paths.output.hsgr, summary.checksum, &graph)
        })?;

        summary.stages = stages;
        summary.total = started.elapsed();
        info!(
            edge_based_nodes = summary.edge_based_nodes,
            query_edges = summary.query_edges,
            shortcuts = summary.shortcuts,
            checksum = summary.checksum,
            total_ms = summary.total.as_millis() as u64,
            "preparation finished"
        );
        Ok(summary)
    }

    fn build_node_based_graph(&self) -> Result<NodeBasedGraph> {
        let graph = NodeBasedGraph::from_import_edges(self.import.nodes.len(), &self.import.edges)?;
        info!(
            nodes = graph.number_of_nodes(),
            arcs = graph.number_of_arcs(),
            "node-based graph built"
        );
        Ok(graph)
    }

    fn write_tables(&self, edge_data: &[OriginalEdgeData], geometry: &GeometryTable) -> Result<()> {
        let out = &self.paths.output;
        NodeMapFile::write(&out.nodes, &self.import.nodes)?;
        OriginalEdgeDataFile::write(&out.edges, edge_data)?;
        NamesFile::write(&out.names, &NameTable::from_names(&self.import.names))?;
        GeometryFile::write(&out.geometry, geometry)?;
        let stamp = self.timestamp.clone().unwrap_or_else(timestamp::now);
        timestamp::write(&out.timestamp, &stamp)
    }
}

fn build_edge_expanded_graph(graph: NodeBasedGraph, inputs: FactoryInputs<'_>) -> Result<EdgeExpandedGraph> {
    let mut factory = EdgeBasedGraphFactory::new(graph, inputs)?;
    factory.run()?;
    Ok(EdgeExpandedGraph {
        node_count: factory.number_of_edge_based_nodes(),
        edges: factory.take_edge_based_edges(),
        segments: factory.take_edge_based_nodes(),
        original_edge_data: factory.take_original_edge_data(),
        geometry: factory.take_geometry(),
    })
}

/// CRC32 over the encoded spatial index records
fn segment_checksum(segments: &[EdgeBasedNode]) -> u32 {
    let mut digest = crc::Digest::new();
    let mut buffer = Vec::with_capacity(EdgeBasedNode::ENCODED_SIZE);
    for segment in segments {
        buffer.clear();
        segment.encode(&mut buffer);
        digest.update(&buffer);
    }
    digest.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{EdgeFlags, ImportEdge, ImportNode, NodeFlags};
    use kestrel_common::FixedPointCoordinate;
    use tempfile::tempdir;

    fn node(i: u64, lat: f64, lon: f64) -> ImportNode {
        ImportNode {
            osm_id: 1000 + i,
            coordinate: FixedPointCoordinate::from_degrees(lat, lon),
            flags: NodeFlags::default(),
        }
    }

    fn edge(source: NodeId, target: NodeId, weight: i32) -> ImportEdge {
        ImportEdge {
            source,
            target,
            weight,
            name_id: 0,
            flags: EdgeFlags::both_ways(),
        }
    }

    /// Two-way street 0 - 1 - 2 - 3 with a spur 1 - 4
    fn street() -> ImportData {
        ImportData {
            nodes: vec![
                node(0, 52.500, 13.400),
                node(1, 52.500, 13.401),
                node(2, 52.500, 13.402),
                node(3, 52.500, 13.403),
                node(4, 52.501, 13.401),
            ],
            edges: vec![edge(0, 1, 10), edge(1, 2, 10), edge(2, 3, 10), edge(1, 4, 15)],
            names: vec!["Unter den Linden".to_string()],
        }
    }

    #[test]
    fn test_prepare_writes_every_file() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("street");
        let paths = PreparePaths::from_base(&base);
        assert!(paths.restrictions.is_none());
        ImportFile::write(&paths.import, &street()).unwrap();

        let summary = PrepareContext::load(paths.clone(), SpeedProfile::without_penalties(), ContractorConfig::default())
            .unwrap()
            .with_timestamp("2024-01-01T00:00:00Z")
            .run()
            .unwrap();

        // four two-way arcs, each direction is one edge-based node
        assert_eq!(summary.edge_based_nodes, 8);
        assert_eq!(summary.indexed_segments, 4);
        assert!(summary.query_edges > 0);
        assert_eq!(
            summary.stages.iter().map(|s| s.stage).collect::<Vec<_>>(),
            vec![
                "build_node_based_graph",
                "build_edge_expanded_graph",
                "write_tables",
                "build_rtree",
                "checksum",
                "contract",
                "write_hsgr",
            ]
        );

        let out = &paths.output;
        for file in [
            &out.hsgr,
            &out.nodes,
            &out.edges,
            &out.names,
            &out.geometry,
            &out.ram_index,
            &out.file_index,
            &out.timestamp,
        ] {
            assert!(file.exists(), "{} missing", file.display());
        }
        assert_eq!(timestamp::read(&out.timestamp).unwrap(), "2024-01-01T00:00:00Z");
        assert_eq!(HsgrFile::read(&out.hsgr).unwrap().checksum, summary.checksum);
    }

    #[test]
    fn test_empty_import_is_rejected() {
        let dir = tempdir().unwrap();
        let paths = PreparePaths::from_base(dir.path().join("empty"));
        ImportFile::write(&paths.import, &ImportData::default()).unwrap();
        let result = PrepareContext::load(paths, SpeedProfile::default(), ContractorConfig::default());
        assert!(matches!(result, Err(Error::EmptyDataset(_))));
    }

    #[test]
    fn test_compression_stage_runs_when_enabled() {
        let dir = tempdir().unwrap();
        let paths = PreparePaths::from_base(dir.path().join("street"));
        ImportFile::write(&paths.import, &street()).unwrap();
        let profile = SpeedProfile {
            compress_geometry: true,
            ..SpeedProfile::without_penalties()
        };
        let summary = PrepareContext::load(paths, profile, ContractorConfig::default())
            .unwrap()
            .run()
            .unwrap();
        // node 2 sits between 1 and 3 on the same street
        assert_eq!(summary.compressed_nodes, 1);
        assert_eq!(summary.edge_based_nodes, 6);
        assert!(summary.stages.iter().any(|s| s.stage == "compress_geometry"));
    }
}
