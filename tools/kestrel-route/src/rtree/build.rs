//! Bulk loading: Hilbert-sort the segments, pack leaves, pack levels bottom-up

use kestrel_common::{Error, Result, SPECIAL_NODEID};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use super::{LeafPage, Rectangle, TreeNode, BRANCHING_FACTOR, LEAF_NODE_SIZE};
use crate::ebg::EdgeBasedNode;

/// Order of the Hilbert curve used for sorting
const HILBERT_BITS: u32 = 16;

pub(super) fn hilbert_value(node: &EdgeBasedNode) -> u64 {
    let c = node.centroid();
    let side = (1u64 << HILBERT_BITS) - 1;
    let x = ((c.lon as i64 + 180_000_000).clamp(0, 360_000_000) as u64 * side) / 360_000_000;
    let y = ((c.lat as i64 + 90_000_000).clamp(0, 180_000_000) as u64 * side) / 180_000_000;
    xy_to_hilbert(x, y)
}

fn xy_to_hilbert(mut x: u64, mut y: u64) -> u64 {
    let n = 1u64 << HILBERT_BITS;
    let mut d = 0u64;
    let mut s = n / 2;
    while s > 0 {
        let rx = u64::from(x & s > 0);
        let ry = u64::from(y & s > 0);
        d += s * s * ((3 * rx) ^ ry);
        if ry == 0 {
            if rx == 1 {
                x = n - 1 - x;
                y = n - 1 - y;
            }
            std::mem::swap(&mut x, &mut y);
        }
        s /= 2;
    }
    d
}

/// Build the tree over `segments` and write both index files
pub fn build<P: AsRef<Path>, Q: AsRef<Path>>(
    segments: &[EdgeBasedNode],
    ram_index: P,
    leaf_index: Q,
) -> Result<()> {
    if segments.is_empty() {
        return Err(Error::EmptyDataset("spatial index segments"));
    }

    let mut order: Vec<(u64, usize)> = segments
        .par_iter()
        .enumerate()
        .map(|(i, s)| (hilbert_value(s), i))
        .collect();
    order.par_sort_unstable();

    // both files are staged; a running server keeps reading its old leaf file
    let leaf_staging = staging_path(leaf_index.as_ref());
    let ram_staging = staging_path(ram_index.as_ref());
    let mut leaf_writer = BufWriter::new(File::create(&leaf_staging)?);
    let leaf_count = order.len().div_ceil(LEAF_NODE_SIZE);
    leaf_writer.write_all(&(leaf_count as u64).to_le_bytes())?;

    let mut leaf_rects = Vec::with_capacity(leaf_count);
    let mut page_bytes = Vec::with_capacity(LeafPage::ENCODED_SIZE);
    for chunk in order.chunks(LEAF_NODE_SIZE) {
        let page = LeafPage {
            objects: chunk.iter().map(|&(_, i)| segments[i]).collect(),
        };
        leaf_rects.push(page.bounding_rectangle());
        page_bytes.clear();
        page.encode(&mut page_bytes);
        leaf_writer.write_all(&page_bytes)?;
    }
    leaf_writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;

    // one bottom node per leaf page so every page keeps its own rectangle
    let bottom = leaf_rects
        .iter()
        .enumerate()
        .map(|(i, &rect)| TreeNode {
            rect,
            children_are_leaves: true,
            children: vec![i as u32],
        })
        .collect();
    let mut levels: Vec<Vec<TreeNode>> = vec![bottom];
    while let Some(last) = levels.last() {
        if last.len() <= 1 {
            break;
        }
        let rects: Vec<Rectangle> = last.iter().map(|n| n.rect).collect();
        levels.push(pack_level(&rects));
    }

    // root first: offsets of each level in the emitted array
    let mut offsets = vec![0u32; levels.len()];
    let mut running = 0u32;
    for (level, nodes) in levels.iter().enumerate().rev() {
        offsets[level] = running;
        running += nodes.len() as u32;
    }

    let node_bound = segments
        .iter()
        .flat_map(|s| [s.forward_node, s.reverse_node])
        .filter(|&n| n != SPECIAL_NODEID)
        .map(|n| n + 1)
        .max()
        .unwrap_or(0);

    let mut ram_writer = BufWriter::new(File::create(&ram_staging)?);
    ram_writer.write_all(&(segments.len() as u64).to_le_bytes())?;
    ram_writer.write_all(&node_bound.to_le_bytes())?;
    ram_writer.write_all(&running.to_le_bytes())?;
    let mut node_bytes = Vec::with_capacity(TreeNode::ENCODED_SIZE);
    for (level, nodes) in levels.iter().enumerate().rev() {
        for node in nodes {
            let mut node = node.clone();
            if level > 0 {
                let below = offsets[level - 1];
                for child in &mut node.children {
                    *child += below;
                }
            }
            node_bytes.clear();
            node.encode(&mut node_bytes);
            ram_writer.write_all(&node_bytes)?;
        }
    }
    ram_writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;

    std::fs::rename(&leaf_staging, leaf_index.as_ref())?;
    std::fs::rename(&ram_staging, ram_index.as_ref())?;

    info!(
        segments = segments.len(),
        leaves = leaf_count,
        tree_nodes = running,
        node_bound,
        height = levels.len(),
        "spatial index written"
    );
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn pack_level(rects: &[Rectangle]) -> Vec<TreeNode> {
    rects
        .chunks(BRANCHING_FACTOR)
        .enumerate()
        .map(|(chunk_index, chunk)| {
            let first = (chunk_index * BRANCHING_FACTOR) as u32;
            let mut rect = Rectangle::EMPTY;
            for r in chunk {
                rect = rect.merge(r);
            }
            TreeNode {
                rect,
                children_are_leaves: false,
                children: (first..first + chunk.len() as u32).collect(),
            }
        })
        .collect()
}
