//! Contracted query graph (`.hsgr`)
//!
//! Layout:
//! ```text
//! fingerprint [u8; 16] | checksum u32 | node count u32 | edge count u32
//! first_edge u32 * (node count + 1)
//! { target u32, weight i32, id u32, flags u8 } * edge count
//! ```
//! `checksum` is the CRC-32 over the edge-based node records indexed by the
//! R-tree of the same build. flags: bit 0 shortcut, bit 1 forward, bit 2 backward.

use kestrel_common::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use super::fingerprint::Fingerprint;
use super::{checked_capacity, read_i32, read_u32, read_u8};
use crate::static_graph::{EdgeArrayEntry, QueryEdgeData, QueryGraph, StaticGraph};

const FLAG_SHORTCUT: u8 = 0b001;
const FLAG_FORWARD: u8 = 0b010;
const FLAG_BACKWARD: u8 = 0b100;

pub struct HsgrData {
    pub fingerprint: Fingerprint,
    pub checksum: u32,
    pub graph: QueryGraph,
}

pub struct HsgrFile;

impl HsgrFile {
    /// Write the query graph; any non-positive weight aborts the write
    pub fn write<P: AsRef<Path>>(path: P, checksum: u32, graph: &QueryGraph) -> Result<()> {
        if let Some((e, entry)) = graph
            .edge_array()
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.data.distance <= 0)
        {
            return Err(Error::integrity(format!(
                "refusing to serialize edge {e} to {} with weight {}",
                entry.target, entry.data.distance
            )));
        }

        let mut writer = BufWriter::new(File::create(path)?);
        Fingerprint::current().write_to(&mut writer)?;
        writer.write_all(&checksum.to_le_bytes())?;
        writer.write_all(&(graph.number_of_nodes() as u32).to_le_bytes())?;
        writer.write_all(&(graph.number_of_edges() as u32).to_le_bytes())?;

        for &first_edge in graph.node_array() {
            writer.write_all(&first_edge.to_le_bytes())?;
        }
        for entry in graph.edge_array() {
            let d = &entry.data;
            let flags = (d.shortcut as u8 * FLAG_SHORTCUT)
                | (d.forward as u8 * FLAG_FORWARD)
                | (d.backward as u8 * FLAG_BACKWARD);
            writer.write_all(&entry.target.to_le_bytes())?;
            writer.write_all(&d.distance.to_le_bytes())?;
            writer.write_all(&d.id.to_le_bytes())?;
            writer.write_all(&[flags])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<HsgrData> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);

        let fingerprint = Fingerprint::read_from(&mut reader)?;
        if !fingerprint.is_current() {
            tracing::warn!(
                file = %path.display(),
                found = %fingerprint,
                "graph was prepared by a different build"
            );
        }
        let checksum = read_u32(&mut reader)?;
        let node_count = read_u32(&mut reader)? as u64;
        let edge_count = read_u32(&mut reader)? as u64;

        let mut node_array = Vec::with_capacity(checked_capacity(path, node_count + 1, 4)?);
        for _ in 0..=node_count {
            node_array.push(read_u32(&mut reader)?);
        }

        let mut edge_array = Vec::with_capacity(checked_capacity(path, edge_count, 13)?);
        for _ in 0..edge_count {
            let target = read_u32(&mut reader)?;
            let distance = read_i32(&mut reader)?;
            let id = read_u32(&mut reader)?;
            let flags = read_u8(&mut reader)?;
            edge_array.push(EdgeArrayEntry {
                target,
                data: QueryEdgeData {
                    distance,
                    id,
                    shortcut: flags & FLAG_SHORTCUT != 0,
                    forward: flags & FLAG_FORWARD != 0,
                    backward: flags & FLAG_BACKWARD != 0,
                },
            });
        }

        let graph = StaticGraph::from_parts(node_array, edge_array)
            .map_err(|e| Error::format(path, e.to_string()))?;
        Ok(HsgrData {
            fingerprint,
            checksum,
            graph,
        })
    }
}
