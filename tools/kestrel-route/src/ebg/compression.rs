//! Degree-2 geometry compression
//!
//! A node `v` whose only neighbours are `u` and `w` is folded into a single
//! arc `u -> w` (and `w -> u`) when nothing can happen at `v`: no barrier, no
//! signal, no restriction, and both arcs describe the same road in the same
//! directions. The removed nodes stay reachable through the arc's `via` list.

use kestrel_common::{Error, NodeId, Result};
use rustc_hash::FxHashSet;
use tracing::info;

use super::node_based_graph::NodeBasedGraph;
use super::restriction_map::RestrictionMap;

pub struct GeometryCompressor<'a> {
    barriers: &'a FxHashSet<NodeId>,
    traffic_signals: &'a FxHashSet<NodeId>,
    restrictions: &'a RestrictionMap,
}

impl<'a> GeometryCompressor<'a> {
    pub fn new(
        barriers: &'a FxHashSet<NodeId>,
        traffic_signals: &'a FxHashSet<NodeId>,
        restrictions: &'a RestrictionMap,
    ) -> Self {
        Self {
            barriers,
            traffic_signals,
            restrictions,
        }
    }

    /// Compress in place; returns the number of removed nodes
    pub fn compress(&self, graph: &mut NodeBasedGraph) -> Result<usize> {
        let arcs_before = graph.number_of_arcs();
        let mut removed = 0usize;

        for v in 0..graph.number_of_nodes() as NodeId {
            if graph.degree(v) != 2
                || self.barriers.contains(&v)
                || self.traffic_signals.contains(&v)
                || self.restrictions.is_involved(v)
            {
                continue;
            }
            let (u, w) = {
                let arcs = graph.arcs(v);
                (arcs[0].target, arcs[1].target)
            };
            if u == w || graph.find_arc(u, w).is_some() || !graph.arcs_are_compatible(u, v, w) {
                continue;
            }
            fuse(graph, u, v, w)?;
            fuse(graph, w, v, u)?;
            graph.arcs_mut(v).clear();
            removed += 1;
        }

        for source in 0..graph.number_of_nodes() as NodeId {
            graph.arcs_mut(source).sort_by_key(|a| a.target);
        }

        info!(
            removed,
            arcs_before,
            arcs_after = graph.number_of_arcs(),
            "geometry compression done"
        );
        Ok(removed)
    }
}

/// Replace arc `a -> v` by `a -> b`, appending the geometry of `v -> b`
fn fuse(graph: &mut NodeBasedGraph, a: NodeId, v: NodeId, b: NodeId) -> Result<()> {
    let Some(tail) = graph.find_arc(v, b).cloned() else {
        return Err(Error::integrity(format!("arc {v}->{b} vanished during compression")));
    };
    let Some(head) = graph.find_arc_mut(a, v) else {
        return Err(Error::integrity(format!("arc {a}->{v} vanished during compression")));
    };
    head.weight = head.weight.checked_add(tail.weight).ok_or_else(|| {
        Error::integrity(format!("weight overflow compressing {a}->{v}->{b}"))
    })?;
    head.target = b;
    head.via.push(v);
    head.via.extend_from_slice(&tail.via);
    head.segment_weights.extend_from_slice(&tail.segment_weights);
    Ok(())
}
