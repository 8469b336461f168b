//! Contraction hierarchy queries against plain Dijkstra

mod common;

use common::{contract, dijkstra, random_edges};
use kestrel_common::NodeId;
use kestrel_route::config::ContractorConfig;
use kestrel_route::ebg::EdgeBasedEdge;
use kestrel_route::search::{ch_query, unpack_path};
use kestrel_route::static_graph::QueryGraph;

fn ch_distance(graph: &QueryGraph, source: NodeId, target: NodeId) -> Option<i32> {
    ch_query(graph, &[(source, 0)], &[(target, 0)]).map(|(weight, _)| weight)
}

fn assert_all_pairs_match(nodes: usize, edges: &[EdgeBasedEdge], graph: &QueryGraph) {
    for source in 0..nodes as NodeId {
        let expected = dijkstra(nodes, edges, source);
        for target in 0..nodes as NodeId {
            assert_eq!(
                ch_distance(graph, source, target),
                expected[target as usize],
                "{source} -> {target}"
            );
        }
    }
}

#[test]
fn test_ch_matches_dijkstra_on_random_graphs() {
    for (seed, nodes) in [(1u64, 12usize), (2, 40), (3, 80), (4, 120), (5, 200)] {
        let edges = random_edges(seed, nodes, nodes * 3);
        let graph = contract(nodes, &edges, ContractorConfig::default());
        assert_all_pairs_match(nodes, &edges, &graph);
    }
}

#[test]
fn test_sparse_graphs_with_unreachable_pairs() {
    // fewer edges than nodes: many pairs have no path
    for seed in 10..15u64 {
        let edges = random_edges(seed, 60, 45);
        let graph = contract(60, &edges, ContractorConfig::default());
        assert_all_pairs_match(60, &edges, &graph);
    }
}

#[test]
fn test_unpacked_paths_add_up() {
    let nodes = 100;
    let edges = random_edges(21, nodes, nodes * 3);
    let graph = contract(nodes, &edges, ContractorConfig::default());
    for source in (0..nodes as NodeId).step_by(7) {
        for target in (0..nodes as NodeId).step_by(5) {
            let Some((weight, packed)) = ch_query(&graph, &[(source, 0)], &[(target, 0)]) else {
                continue;
            };
            assert_eq!(packed.first(), Some(&source));
            assert_eq!(packed.last(), Some(&target));
            let unpacked = unpack_path(&graph, &packed).unwrap();
            let total: i32 = unpacked.iter().map(|&id| edges[id as usize].weight).sum();
            assert_eq!(total, weight, "{source} -> {target}");
        }
    }
}

#[test]
fn test_witness_search_does_not_change_distances() {
    let nodes = 50;
    let edges = random_edges(31, nodes, nodes * 3);
    let pruned = contract(nodes, &edges, ContractorConfig::default());
    let exhaustive = contract(
        nodes,
        &edges,
        ContractorConfig {
            witness_search: false,
            ..ContractorConfig::default()
        },
    );
    assert!(exhaustive.number_of_edges() >= pruned.number_of_edges());
    for source in 0..nodes as NodeId {
        for target in 0..nodes as NodeId {
            assert_eq!(
                ch_distance(&pruned, source, target),
                ch_distance(&exhaustive, source, target),
                "{source} -> {target}"
            );
        }
    }
}

#[test]
fn test_tight_witness_limits_stay_exact() {
    let nodes = 80;
    let edges = random_edges(41, nodes, nodes * 4);
    let graph = contract(
        nodes,
        &edges,
        ContractorConfig {
            witness_hop_limit: 1,
            witness_settle_limit: 3,
            ..ContractorConfig::default()
        },
    );
    assert_all_pairs_match(nodes, &edges, &graph);
}

#[test]
fn test_contraction_is_deterministic() {
    let nodes = 120;
    let edges = random_edges(51, nodes, nodes * 3);
    let run = |threads| {
        let graph = contract(
            nodes,
            &edges,
            ContractorConfig {
                threads,
                ..ContractorConfig::default()
            },
        );
        (graph.node_array().to_vec(), graph.edge_array().to_vec())
    };
    let first = run(1);
    assert_eq!(first, run(1));
    assert_eq!(first, run(4));
}

#[test]
fn test_square_scenario() {
    // N0 - N1
    //  |    |
    // N3 - N2
    let side = |source, target, edge_id| EdgeBasedEdge {
        source,
        target,
        edge_id,
        weight: 1,
        forward: true,
        backward: true,
    };
    let edges = vec![side(0, 1, 0), side(1, 2, 1), side(2, 3, 2), side(3, 0, 3)];
    let graph = contract(4, &edges, ContractorConfig::default());
    assert_eq!(ch_distance(&graph, 0, 2), Some(2));
    assert_eq!(ch_distance(&graph, 1, 3), Some(2));
    assert_eq!(ch_distance(&graph, 3, 2), Some(1));
    assert_eq!(ch_distance(&graph, 2, 2), Some(0));
}
