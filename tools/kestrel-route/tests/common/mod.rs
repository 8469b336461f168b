//! Fixtures shared by the integration tests

#![allow(dead_code)]

use kestrel_common::{EdgeWeight, FixedPointCoordinate, NodeId};
use kestrel_route::config::{ContractorConfig, SpeedProfile};
use kestrel_route::contractor::Contractor;
use kestrel_route::ebg::EdgeBasedEdge;
use kestrel_route::formats::{EdgeFlags, ImportData, ImportEdge, ImportFile, ImportNode, NodeFlags};
use kestrel_route::prepare::{PrepareContext, PreparePaths, PrepareSummary};
use kestrel_route::static_graph::QueryGraph;
use priority_queue::PriorityQueue;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Reverse;
use std::path::{Path, PathBuf};

/// Random directed graph; about a quarter of the edges are two-way
pub fn random_edges(seed: u64, nodes: usize, edges: usize) -> Vec<EdgeBasedEdge> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(edges);
    while out.len() < edges {
        let source = rng.random_range(0..nodes as NodeId);
        let target = rng.random_range(0..nodes as NodeId);
        if source == target {
            continue;
        }
        out.push(EdgeBasedEdge {
            source,
            target,
            edge_id: out.len() as u32,
            weight: rng.random_range(1..=50),
            forward: true,
            backward: rng.random_bool(0.25),
        });
    }
    out
}

/// Plain Dijkstra over the uncontracted edges
pub fn dijkstra(nodes: usize, edges: &[EdgeBasedEdge], source: NodeId) -> Vec<Option<EdgeWeight>> {
    let mut adjacency: Vec<Vec<(NodeId, EdgeWeight)>> = vec![Vec::new(); nodes];
    for e in edges {
        if e.forward {
            adjacency[e.source as usize].push((e.target, e.weight));
        }
        if e.backward {
            adjacency[e.target as usize].push((e.source, e.weight));
        }
    }

    let mut distances: Vec<Option<EdgeWeight>> = vec![None; nodes];
    let mut settled = vec![false; nodes];
    let mut heap = PriorityQueue::new();
    distances[source as usize] = Some(0);
    heap.push(source, Reverse(0));
    while let Some((node, Reverse(distance))) = heap.pop() {
        settled[node as usize] = true;
        for &(target, weight) in &adjacency[node as usize] {
            if settled[target as usize] {
                continue;
            }
            let candidate = distance + weight;
            if distances[target as usize].map_or(true, |d| candidate < d) {
                distances[target as usize] = Some(candidate);
                heap.push_increase(target, Reverse(candidate));
            }
        }
    }
    distances
}

pub fn contract(nodes: usize, edges: &[EdgeBasedEdge], config: ContractorConfig) -> QueryGraph {
    let mut contractor = Contractor::new(nodes, edges, config).unwrap();
    contractor.run().unwrap();
    QueryGraph::new(nodes, contractor.into_query_edges()).unwrap()
}

pub const GRID_SIDE: u32 = 4;
/// Node ids of the two-node island outside the grid
pub const ISLAND: [NodeId; 2] = [16, 17];
/// Deciseconds per grid edge
pub const GRID_EDGE_WEIGHT: i32 = 100;

pub fn grid_node(row: u32, col: u32) -> NodeId {
    row * GRID_SIDE + col
}

pub fn grid_coordinate(row: u32, col: u32) -> FixedPointCoordinate {
    FixedPointCoordinate::from_degrees(52.5 + 0.001 * row as f64, 13.4 + 0.001 * col as f64)
}

fn import_node(id: u64, coordinate: FixedPointCoordinate) -> ImportNode {
    ImportNode {
        osm_id: 10_000 + id,
        coordinate,
        flags: NodeFlags::default(),
    }
}

fn import_edge(source: NodeId, target: NodeId, name_id: u32) -> ImportEdge {
    ImportEdge {
        source,
        target,
        weight: GRID_EDGE_WEIGHT,
        name_id,
        flags: EdgeFlags::both_ways(),
    }
}

/// 4x4 two-way street grid (rows are "Row r", columns "Col c") plus a
/// disconnected two-node island further north-east
pub fn grid_import() -> ImportData {
    let mut nodes = Vec::new();
    for row in 0..GRID_SIDE {
        for col in 0..GRID_SIDE {
            nodes.push(import_node(grid_node(row, col) as u64, grid_coordinate(row, col)));
        }
    }
    nodes.push(import_node(16, FixedPointCoordinate::from_degrees(52.6, 13.5)));
    nodes.push(import_node(17, FixedPointCoordinate::from_degrees(52.6, 13.501)));

    let mut edges = Vec::new();
    for row in 0..GRID_SIDE {
        for col in 0..GRID_SIDE {
            if col + 1 < GRID_SIDE {
                edges.push(import_edge(grid_node(row, col), grid_node(row, col + 1), row));
            }
            if row + 1 < GRID_SIDE {
                edges.push(import_edge(grid_node(row, col), grid_node(row + 1, col), GRID_SIDE + col));
            }
        }
    }
    edges.push(import_edge(ISLAND[0], ISLAND[1], 2 * GRID_SIDE));

    let mut names: Vec<String> = (0..GRID_SIDE).map(|r| format!("Row {r}")).collect();
    names.extend((0..GRID_SIDE).map(|c| format!("Col {c}")));
    names.push("Island".to_string());

    ImportData { nodes, edges, names }
}

/// Write `import` under `dir/<name>` and prepare it; returns the base path
pub fn prepare_import(
    dir: &Path,
    name: &str,
    import: &ImportData,
    profile: SpeedProfile,
    timestamp: &str,
) -> (PathBuf, PrepareSummary) {
    let base = dir.join(name);
    let paths = PreparePaths::from_base(&base);
    ImportFile::write(&paths.import, import).unwrap();
    let summary = PrepareContext::load(paths, profile, ContractorConfig::default())
        .unwrap()
        .with_timestamp(timestamp)
        .run()
        .unwrap();
    (base, summary)
}

pub fn prepare_grid(dir: &Path, name: &str, timestamp: &str) -> (PathBuf, PrepareSummary) {
    prepare_import(dir, name, &grid_import(), SpeedProfile::without_penalties(), timestamp)
}

fn street(source: NodeId, target: NodeId, name_id: u32, flags: EdgeFlags) -> ImportEdge {
    ImportEdge {
        source,
        target,
        weight: GRID_EDGE_WEIGHT,
        name_id,
        flags,
    }
}

/// T-junction at node 1 with stubs to the west (0) and north (2), and a
/// zigzag street 1 - 3 - 4 - 5 - 6 to the east whose inner nodes fold away
/// under geometry compression
pub fn zigzag_import() -> ImportData {
    let nodes = [
        (52.5, 13.399),
        (52.5, 13.4),
        (52.501, 13.4),
        (52.5005, 13.401),
        (52.4995, 13.402),
        (52.5005, 13.403),
        (52.4995, 13.404),
    ]
    .iter()
    .enumerate()
    .map(|(i, &(lat, lon))| import_node(i as u64, FixedPointCoordinate::from_degrees(lat, lon)))
    .collect();
    let both = EdgeFlags::both_ways();
    ImportData {
        nodes,
        edges: vec![
            street(0, 1, 0, both),
            street(1, 2, 1, both),
            street(1, 3, 2, both),
            street(3, 4, 2, both),
            street(4, 5, 2, both),
            street(5, 6, 2, both),
        ],
        names: vec!["West".to_string(), "North".to_string(), "Zigzag".to_string()],
    }
}

/// One-way square 0 -> 1 -> 2 -> 3 -> 0
pub fn ring_import() -> ImportData {
    let nodes = [(52.5, 13.4), (52.5, 13.401), (52.501, 13.401), (52.501, 13.4)]
        .iter()
        .enumerate()
        .map(|(i, &(lat, lon))| import_node(i as u64, FixedPointCoordinate::from_degrees(lat, lon)))
        .collect();
    let oneway = EdgeFlags::oneway();
    ImportData {
        nodes,
        edges: vec![
            street(0, 1, 0, oneway),
            street(1, 2, 0, oneway),
            street(2, 3, 0, oneway),
            street(3, 0, 0, oneway),
        ],
        names: vec!["Ring".to_string()],
    }
}

pub fn loc(coordinates: &[FixedPointCoordinate]) -> String {
    coordinates
        .iter()
        .map(|c| format!("{:.6},{:.6}", c.lat_degrees(), c.lon_degrees()))
        .collect::<Vec<_>>()
        .join(";")
}
