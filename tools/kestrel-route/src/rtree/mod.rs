//! Packed static R-tree over road segments
//!
//! Internal nodes live in memory (`.ramIndex`); leaf pages stay on disk
//! (`.fileIndex`) and are paged in on first touch. Layouts:
//! ```text
//! .ramIndex   element count u64 | edge-based node bound u32
//!             node count u32 | node * count
//!             node = rect { min_lat, max_lat, min_lon, max_lon: i32 }
//!                    child count u32 | children are leaves u8
//!                    child index u32 * BRANCHING_FACTOR
//! .fileIndex  leaf count u64 | page * count
//!             page = object count u32 | EdgeBasedNode * LEAF_NODE_SIZE
//! ```
//! The root is tree node 0.

mod build;

pub use build::build;

use kestrel_common::{
    EdgeWeight, Error, FixedPointCoordinate, NodeId, Result, SPECIAL_NODEID,
};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::ebg::EdgeBasedNode;
use crate::formats::{checked_capacity, read_i32, read_u32, read_u64, read_u8};
use crate::geo::LocalProjection;

pub const BRANCHING_FACTOR: usize = 64;
pub const LEAF_NODE_SIZE: usize = 256;

/// Below this zoom level segments of tiny components are not snapped to
pub const SMALL_COMPONENT_ZOOM: u32 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    pub min_lat: i32,
    pub max_lat: i32,
    pub min_lon: i32,
    pub max_lon: i32,
}

impl Rectangle {
    pub const EMPTY: Rectangle = Rectangle {
        min_lat: i32::MAX,
        max_lat: i32::MIN,
        min_lon: i32::MAX,
        max_lon: i32::MIN,
    };

    pub fn merge(&self, other: &Rectangle) -> Rectangle {
        Rectangle {
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }

    pub fn of_segment(node: &EdgeBasedNode) -> Rectangle {
        let (a, b) = (node.u_coordinate, node.v_coordinate);
        Rectangle {
            min_lat: a.lat.min(b.lat),
            max_lat: a.lat.max(b.lat),
            min_lon: a.lon.min(b.lon),
            max_lon: a.lon.max(b.lon),
        }
    }

    pub fn contains(&self, c: FixedPointCoordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&c.lat) && (self.min_lon..=self.max_lon).contains(&c.lon)
    }

    fn min_distance(&self, projection: &LocalProjection) -> f64 {
        projection.distance_to_rect(
            FixedPointCoordinate::new(self.min_lat, self.min_lon),
            FixedPointCoordinate::new(self.max_lat, self.max_lon),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TreeNode {
    rect: Rectangle,
    children_are_leaves: bool,
    children: Vec<u32>,
}

impl TreeNode {
    const ENCODED_SIZE: usize = 16 + 4 + 1 + 4 * BRANCHING_FACTOR;

    fn encode(&self, out: &mut Vec<u8>) {
        for v in [self.rect.min_lat, self.rect.max_lat, self.rect.min_lon, self.rect.max_lon] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend_from_slice(&(self.children.len() as u32).to_le_bytes());
        out.push(self.children_are_leaves as u8);
        for i in 0..BRANCHING_FACTOR {
            let child = self.children.get(i).copied().unwrap_or(u32::MAX);
            out.extend_from_slice(&child.to_le_bytes());
        }
    }

    fn read_from<R: Read>(reader: &mut R, path: &Path) -> Result<Self> {
        let rect = Rectangle {
            min_lat: read_i32(reader)?,
            max_lat: read_i32(reader)?,
            min_lon: read_i32(reader)?,
            max_lon: read_i32(reader)?,
        };
        let child_count = read_u32(reader)? as usize;
        if child_count == 0 || child_count > BRANCHING_FACTOR {
            return Err(Error::format(path, format!("tree node with {child_count} children")));
        }
        let children_are_leaves = read_u8(reader)? != 0;
        let mut children = Vec::with_capacity(child_count);
        for i in 0..BRANCHING_FACTOR {
            let child = read_u32(reader)?;
            if i < child_count {
                children.push(child);
            }
        }
        Ok(Self {
            rect,
            children_are_leaves,
            children,
        })
    }
}

/// One page of the leaf file
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LeafPage {
    objects: Vec<EdgeBasedNode>,
}

impl LeafPage {
    const ENCODED_SIZE: usize = 4 + LEAF_NODE_SIZE * EdgeBasedNode::ENCODED_SIZE;

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.objects.len() as u32).to_le_bytes());
        for object in &self.objects {
            object.encode(out);
        }
        out.resize(Self::ENCODED_SIZE, 0);
    }

    fn decode(bytes: &[u8], path: &Path) -> Result<Self> {
        let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        if count == 0 || count > LEAF_NODE_SIZE {
            return Err(Error::format(path, format!("leaf page with {count} objects")));
        }
        let objects = bytes[4..]
            .chunks_exact(EdgeBasedNode::ENCODED_SIZE)
            .take(count)
            .map(|chunk| {
                EdgeBasedNode::decode(chunk)
                    .ok_or_else(|| Error::format(path, "truncated leaf record"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { objects })
    }

    fn bounding_rectangle(&self) -> Rectangle {
        self.objects
            .iter()
            .fold(Rectangle::EMPTY, |acc, o| acc.merge(&Rectangle::of_segment(o)))
    }
}

/// A query point snapped onto a road segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhantomNode {
    pub forward_node: NodeId,
    pub reverse_node: NodeId,
    pub name_id: u32,
    pub u: NodeId,
    pub v: NodeId,
    pub forward_weight: EdgeWeight,
    pub forward_offset: EdgeWeight,
    pub reverse_weight: EdgeWeight,
    pub reverse_offset: EdgeWeight,
    pub forward_geometry: u32,
    pub reverse_geometry: u32,
    /// Index of the snapped segment along the forward arc
    pub segment_position: u32,
    /// Position of the projection along `u -> v`
    pub ratio: f64,
    pub location: FixedPointCoordinate,
    /// Metres between the query point and `location`
    pub distance: f64,
}

impl PhantomNode {
    fn from_segment(segment: &EdgeBasedNode, ratio: f64, location: FixedPointCoordinate, distance: f64) -> Self {
        Self {
            forward_node: segment.forward_node,
            reverse_node: segment.reverse_node,
            name_id: segment.name_id,
            u: segment.u,
            v: segment.v,
            forward_weight: segment.forward_weight,
            forward_offset: segment.forward_offset,
            reverse_weight: segment.reverse_weight,
            reverse_offset: segment.reverse_offset,
            forward_geometry: segment.forward_geometry,
            reverse_geometry: segment.reverse_geometry,
            segment_position: segment.segment_position,
            ratio,
            location,
            distance,
        }
    }

    /// Weight from the start of the forward edge-based node to the point
    pub fn forward_weight_to_point(&self) -> EdgeWeight {
        self.forward_offset + (self.ratio * self.forward_weight as f64).round() as EdgeWeight
    }

    /// Weight from the start of the reverse edge-based node to the point
    pub fn reverse_weight_to_point(&self) -> EdgeWeight {
        self.reverse_offset + ((1.0 - self.ratio) * self.reverse_weight as f64).round() as EdgeWeight
    }

    pub fn has_forward(&self) -> bool {
        self.forward_node != SPECIAL_NODEID
    }

    pub fn has_reverse(&self) -> bool {
        self.reverse_node != SPECIAL_NODEID
    }
}

enum Entry {
    TreeNode(u32),
    Leaf(u32),
    Segment(EdgeBasedNode),
}

struct QueueItem {
    distance: f64,
    sequence: u64,
    entry: Entry,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    // reversed: BinaryHeap pops the closest entry first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Max-heap of the k best distances seen so far
struct Bound {
    k: usize,
    best: BinaryHeap<OrderedDistance>,
}

#[derive(PartialEq)]
struct OrderedDistance(f64);

impl Eq for OrderedDistance {}

impl PartialOrd for OrderedDistance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedDistance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Bound {
    fn new(k: usize) -> Self {
        Self {
            k,
            best: BinaryHeap::with_capacity(k + 1),
        }
    }

    fn limit(&self) -> f64 {
        if self.best.len() < self.k {
            f64::INFINITY
        } else {
            self.best.peek().map_or(f64::INFINITY, |d| d.0)
        }
    }

    fn offer(&mut self, distance: f64) {
        self.best.push(OrderedDistance(distance));
        if self.best.len() > self.k {
            self.best.pop();
        }
    }
}

pub struct StaticRTree {
    tree: Vec<TreeNode>,
    element_count: u64,
    node_bound: u32,
    leaf_count: u64,
    leaf_path: PathBuf,
    leaf_file: Mutex<File>,
    cache: RwLock<FxHashMap<u32, Arc<LeafPage>>>,
}

impl StaticRTree {
    /// Read the in-memory part; leaf pages are loaded lazily
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(ram_index: P, leaf_index: Q) -> Result<Self> {
        let ram_path = ram_index.as_ref();
        let leaf_path = leaf_index.as_ref();
        if !leaf_path.exists() {
            return Err(Error::MissingLeafIndex(leaf_path.to_path_buf()));
        }

        let mut reader = BufReader::new(File::open(ram_path)?);
        let element_count = read_u64(&mut reader)?;
        let node_bound = read_u32(&mut reader)?;
        let node_count = read_u32(&mut reader)? as u64;
        if node_count == 0 {
            return Err(Error::format(ram_path, "tree without nodes"));
        }
        let mut tree = Vec::with_capacity(checked_capacity(
            ram_path,
            node_count,
            TreeNode::ENCODED_SIZE as u64,
        )?);
        for _ in 0..node_count {
            tree.push(TreeNode::read_from(&mut reader, ram_path)?);
        }

        let mut leaf_file = File::open(leaf_path)?;
        let leaf_count = read_u64(&mut leaf_file)?;
        let expected_len = leaf_count
            .checked_mul(LeafPage::ENCODED_SIZE as u64)
            .and_then(|b| b.checked_add(8));
        if expected_len != Some(leaf_file.metadata()?.len()) {
            return Err(Error::format(leaf_path, format!("size does not match {leaf_count} pages")));
        }

        for (i, node) in tree.iter().enumerate() {
            let limit = if node.children_are_leaves { leaf_count } else { node_count };
            if let Some(bad) = node.children.iter().find(|&&c| c as u64 >= limit) {
                return Err(Error::format(ram_path, format!("tree node {i} has dangling child {bad}")));
            }
        }

        debug!(
            elements = element_count,
            tree_nodes = node_count,
            leaves = leaf_count,
            "spatial index loaded"
        );
        Ok(Self {
            tree,
            element_count,
            node_bound,
            leaf_count,
            leaf_path: leaf_path.to_path_buf(),
            leaf_file: Mutex::new(leaf_file),
            cache: RwLock::new(FxHashMap::default()),
        })
    }

    pub fn element_count(&self) -> u64 {
        self.element_count
    }

    /// One past the highest edge-based node id any segment refers to
    pub fn node_bound(&self) -> u32 {
        self.node_bound
    }

    pub fn leaf_count(&self) -> u64 {
        self.leaf_count
    }

    /// Number of leaf pages read from disk so far
    pub fn cached_leaves(&self) -> usize {
        self.cache.read().len()
    }

    fn leaf(&self, index: u32) -> Result<Arc<LeafPage>> {
        if let Some(page) = self.cache.read().get(&index) {
            return Ok(Arc::clone(page));
        }
        let mut bytes = vec![0u8; LeafPage::ENCODED_SIZE];
        {
            let mut file = self.leaf_file.lock();
            file.seek(SeekFrom::Start(8 + index as u64 * LeafPage::ENCODED_SIZE as u64))?;
            file.read_exact(&mut bytes)?;
        }
        let page = Arc::new(LeafPage::decode(&bytes, &self.leaf_path)?);
        self.cache.write().insert(index, Arc::clone(&page));
        Ok(page)
    }

    /// Best-first traversal yielding up to `k` segments nearest first;
    /// `metric` is the exact distance of a segment and never below its rectangle's
    fn nearest_segments<F>(
        &self,
        point: FixedPointCoordinate,
        zoom: u32,
        k: usize,
        deadline: Option<Instant>,
        metric: F,
    ) -> Result<Vec<(EdgeBasedNode, f64)>>
    where
        F: Fn(&LocalProjection, &EdgeBasedNode) -> f64,
    {
        let mut results = Vec::with_capacity(k.min(64));
        if k == 0 {
            return Ok(results);
        }
        let projection = LocalProjection::new(point);
        let skip_small = zoom < SMALL_COMPONENT_ZOOM;

        let mut sequence = 0u64;
        let mut heap = BinaryHeap::new();
        let mut bound = Bound::new(k);
        heap.push(QueueItem {
            distance: self.tree[0].rect.min_distance(&projection),
            sequence,
            entry: Entry::TreeNode(0),
        });

        while let Some(item) = heap.pop() {
            if deadline.is_some_and(|d| Instant::now() > d) {
                return Err(Error::DeadlineExceeded);
            }
            if item.distance > bound.limit() {
                break;
            }
            match item.entry {
                Entry::Segment(segment) => {
                    results.push((segment, item.distance));
                    if results.len() == k {
                        break;
                    }
                }
                Entry::TreeNode(index) => {
                    let node = &self.tree[index as usize];
                    for &child in &node.children {
                        // a bottom node's rectangle is exactly its page's
                        let distance = if node.children_are_leaves {
                            item.distance
                        } else {
                            self.tree[child as usize].rect.min_distance(&projection)
                        };
                        if distance > bound.limit() {
                            continue;
                        }
                        sequence += 1;
                        heap.push(QueueItem {
                            distance,
                            sequence,
                            entry: if node.children_are_leaves {
                                Entry::Leaf(child)
                            } else {
                                Entry::TreeNode(child)
                            },
                        });
                    }
                }
                Entry::Leaf(index) => {
                    let page = self.leaf(index)?;
                    for segment in &page.objects {
                        if skip_small && segment.small_component {
                            continue;
                        }
                        let distance = metric(&projection, segment);
                        if distance > bound.limit() {
                            continue;
                        }
                        bound.offer(distance);
                        sequence += 1;
                        heap.push(QueueItem {
                            distance,
                            sequence,
                            entry: Entry::Segment(*segment),
                        });
                    }
                }
            }
        }
        Ok(results)
    }

    /// Nearest segment endpoint
    pub fn locate_closest_end_point_for_coordinate(
        &self,
        point: FixedPointCoordinate,
        zoom: u32,
        deadline: Option<Instant>,
    ) -> Result<Option<FixedPointCoordinate>> {
        let found = self.nearest_segments(point, zoom, 1, deadline, |p, s| {
            p.distance_to_point(s.u_coordinate)
                .min(p.distance_to_point(s.v_coordinate))
        })?;
        Ok(found.first().map(|(segment, _)| {
            let projection = LocalProjection::new(point);
            if projection.distance_to_point(segment.u_coordinate)
                <= projection.distance_to_point(segment.v_coordinate)
            {
                segment.u_coordinate
            } else {
                segment.v_coordinate
            }
        }))
    }

    pub fn find_phantom_node_for_coordinate(
        &self,
        point: FixedPointCoordinate,
        zoom: u32,
        deadline: Option<Instant>,
    ) -> Result<Option<PhantomNode>> {
        Ok(self
            .incremental_find_phantom_node_for_coordinate(point, zoom, 1, deadline)?
            .into_iter()
            .next())
    }

    /// Up to `k` phantom nodes, nearest first
    pub fn incremental_find_phantom_node_for_coordinate(
        &self,
        point: FixedPointCoordinate,
        zoom: u32,
        k: usize,
        deadline: Option<Instant>,
    ) -> Result<Vec<PhantomNode>> {
        let found = self.nearest_segments(point, zoom, k, deadline, |p, s| {
            p.project_onto_segment(s.u_coordinate, s.v_coordinate).distance
        })?;
        let projection = LocalProjection::new(point);
        Ok(found
            .iter()
            .map(|(segment, distance)| {
                let foot = projection.project_onto_segment(segment.u_coordinate, segment.v_coordinate);
                PhantomNode::from_segment(segment, foot.ratio, foot.location, *distance)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::time::Duration;
    use tempfile::TempDir;

    fn c(lat: f64, lon: f64) -> FixedPointCoordinate {
        FixedPointCoordinate::from_degrees(lat, lon)
    }

    fn segment(id: u32, a: FixedPointCoordinate, b: FixedPointCoordinate) -> EdgeBasedNode {
        EdgeBasedNode {
            forward_node: id,
            reverse_node: SPECIAL_NODEID,
            u: 2 * id,
            v: 2 * id + 1,
            u_coordinate: a,
            v_coordinate: b,
            name_id: id,
            forward_weight: 10,
            forward_offset: 0,
            reverse_weight: 10,
            reverse_offset: 0,
            forward_geometry: SPECIAL_NODEID,
            reverse_geometry: SPECIAL_NODEID,
            segment_position: 0,
            small_component: false,
        }
    }

    /// Random short segments around Berlin; enough for a multi-level tree
    fn random_segments(count: usize) -> Vec<EdgeBasedNode> {
        let mut rng = StdRng::seed_from_u64(7);
        (0..count as u32)
            .map(|id| {
                let lat = 52.4 + rng.random_range(0.0..0.2);
                let lon = 13.3 + rng.random_range(0.0..0.2);
                let a = c(lat, lon);
                let b = c(lat + rng.random_range(-0.001..0.001), lon + rng.random_range(-0.001..0.001));
                segment(id, a, b)
            })
            .collect()
    }

    fn build_tree(segments: &[EdgeBasedNode]) -> (TempDir, StaticRTree) {
        let dir = TempDir::new().unwrap();
        let ram = dir.path().join("t.ramIndex");
        let leaves = dir.path().join("t.fileIndex");
        build(segments, &ram, &leaves).unwrap();
        let tree = StaticRTree::load(&ram, &leaves).unwrap();
        (dir, tree)
    }

    fn brute_force(segments: &[EdgeBasedNode], point: FixedPointCoordinate) -> Vec<f64> {
        let projection = LocalProjection::new(point);
        let mut distances: Vec<f64> = segments
            .iter()
            .map(|s| projection.project_onto_segment(s.u_coordinate, s.v_coordinate).distance)
            .collect();
        distances.sort_by(f64::total_cmp);
        distances
    }

    #[test]
    fn test_exact_hit_on_endpoint() {
        let segments = random_segments(2_000);
        let (_dir, tree) = build_tree(&segments);
        assert_eq!(tree.element_count(), 2_000);
        assert!(tree.leaf_count() > 1);

        let target = segments[1234];
        let phantom = tree
            .find_phantom_node_for_coordinate(target.u_coordinate, 18, None)
            .unwrap()
            .unwrap();
        assert!(phantom.distance < 0.01);
        assert_eq!(phantom.location, target.u_coordinate);

        let endpoint = tree
            .locate_closest_end_point_for_coordinate(target.v_coordinate, 18, None)
            .unwrap()
            .unwrap();
        assert_eq!(endpoint, target.v_coordinate);
    }

    #[test]
    fn test_incremental_results_match_brute_force() {
        let segments = random_segments(1_500);
        let (_dir, tree) = build_tree(&segments);
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..20 {
            let point = c(52.4 + rng.random_range(0.0..0.2), 13.3 + rng.random_range(0.0..0.2));
            let k = rng.random_range(1..40);
            let found = tree
                .incremental_find_phantom_node_for_coordinate(point, 18, k, None)
                .unwrap();
            assert_eq!(found.len(), k);
            assert!(found.windows(2).all(|w| w[0].distance <= w[1].distance));
            let expected = brute_force(&segments, point);
            for (phantom, want) in found.iter().zip(expected) {
                assert!((phantom.distance - want).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_result_length_is_capped_by_segment_count() {
        let segments = random_segments(5);
        let (_dir, tree) = build_tree(&segments);
        let found = tree
            .incremental_find_phantom_node_for_coordinate(c(52.5, 13.4), 18, 10, None)
            .unwrap();
        assert_eq!(found.len(), 5);
    }

    #[test]
    fn test_small_components_hidden_at_low_zoom() {
        let mut segments = random_segments(50);
        for s in &mut segments[..25] {
            s.small_component = true;
        }
        let (_dir, tree) = build_tree(&segments);
        let point = segments[0].u_coordinate;
        let coarse = tree
            .incremental_find_phantom_node_for_coordinate(point, 10, 100, None)
            .unwrap();
        assert_eq!(coarse.len(), 25);
        assert!(coarse.iter().all(|p| p.forward_node >= 25));
        let fine = tree.find_phantom_node_for_coordinate(point, 14, None).unwrap().unwrap();
        assert_eq!(fine.forward_node, 0);
    }

    #[test]
    fn test_leaves_are_paged_lazily() {
        let segments = random_segments(3_000);
        let (_dir, tree) = build_tree(&segments);
        assert_eq!(tree.cached_leaves(), 0);
        tree.find_phantom_node_for_coordinate(segments[0].u_coordinate, 18, None)
            .unwrap();
        let touched = tree.cached_leaves();
        assert!(touched >= 1 && (touched as u64) < tree.leaf_count());
    }

    #[test]
    fn test_missing_leaf_file() {
        let segments = random_segments(10);
        let dir = TempDir::new().unwrap();
        let ram = dir.path().join("t.ramIndex");
        let leaves = dir.path().join("t.fileIndex");
        build(&segments, &ram, &leaves).unwrap();
        std::fs::remove_file(&leaves).unwrap();
        match StaticRTree::load(&ram, &leaves) {
            Err(Error::MissingLeafIndex(path)) => assert_eq!(path, leaves),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("loaded without leaf file"),
        }
    }

    #[test]
    fn test_rebuild_replaces_both_files() {
        let dir = TempDir::new().unwrap();
        let ram = dir.path().join("t.ramIndex");
        let leaves = dir.path().join("t.fileIndex");
        build(&random_segments(10), &ram, &leaves).unwrap();
        let first = StaticRTree::load(&ram, &leaves).unwrap();
        assert_eq!(first.node_bound(), 10);

        build(&random_segments(700), &ram, &leaves).unwrap();
        let second = StaticRTree::load(&ram, &leaves).unwrap();
        assert_eq!(second.node_bound(), 700);
        assert_eq!(second.element_count(), 700);
        // nothing staged is left behind
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["t.fileIndex", "t.ramIndex"]);

        // the first tree still pages from the file it opened
        let point = random_segments(10)[3].u_coordinate;
        let phantom = first.find_phantom_node_for_coordinate(point, 18, None).unwrap().unwrap();
        assert_eq!(phantom.forward_node, 3);
    }

    #[test]
    fn test_expired_deadline() {
        let segments = random_segments(10);
        let (_dir, tree) = build_tree(&segments);
        let past = Instant::now()
            .checked_sub(Duration::from_secs(1))
            .unwrap_or_else(Instant::now);
        std::thread::sleep(Duration::from_millis(2));
        let result = tree.find_phantom_node_for_coordinate(c(52.5, 13.4), 18, Some(past));
        assert!(matches!(result, Err(Error::DeadlineExceeded)));
    }

    #[test]
    fn test_phantom_weights_to_point() {
        let phantom = PhantomNode {
            forward_node: 1,
            reverse_node: 2,
            name_id: 0,
            u: 0,
            v: 1,
            forward_weight: 40,
            forward_offset: 100,
            reverse_weight: 40,
            reverse_offset: 7,
            forward_geometry: SPECIAL_NODEID,
            reverse_geometry: SPECIAL_NODEID,
            segment_position: 0,
            ratio: 0.25,
            location: c(0.0, 0.0),
            distance: 0.0,
        };
        assert_eq!(phantom.forward_weight_to_point(), 110);
        assert_eq!(phantom.reverse_weight_to_point(), 37);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result = build(&[], dir.path().join("a"), dir.path().join("b"));
        assert!(matches!(result, Err(Error::EmptyDataset(_))));
    }
}
