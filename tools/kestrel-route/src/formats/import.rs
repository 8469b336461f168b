//! Import format - nodes, edges and street names handed over by ingestion
//!
//! Layout:
//! ```text
//! MAGIC "KIMP" u32 | VERSION u16 | reserved u16 | fingerprint [u8; 16]
//! node count u32 | { osm_id u64, lat i32, lon i32, flags u8 } * n
//! edge count u32 | { source u32, target u32, weight i32, name_id u32, flags u8 } * m
//! name count u32 | { len u32, utf8 bytes } * k
//! crc32 u32
//! ```
//! Edge endpoints are indices into the node list, not OSM ids.

use kestrel_common::{Error, FixedPointCoordinate, NodeId, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::crc::{CrcReader, CrcWriter};
use super::fingerprint::Fingerprint;
use super::{check_footer, check_header, checked_capacity, read_i32, read_u32, read_u64, read_u8, write_header};

const MAGIC: u32 = 0x504D_494B; // "KIMP"
const VERSION: u16 = 1;

/// Per-node flags set by ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFlags {
    pub barrier: bool,
    pub traffic_signal: bool,
}

impl NodeFlags {
    pub fn to_bits(self) -> u8 {
        (self.barrier as u8) | (self.traffic_signal as u8) << 1
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            barrier: bits & 0b01 != 0,
            traffic_signal: bits & 0b10 != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportNode {
    pub osm_id: u64,
    pub coordinate: FixedPointCoordinate,
    pub flags: NodeFlags,
}

/// Per-edge flags: traversability in each direction plus classification bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeFlags {
    pub forward: bool,
    pub backward: bool,
    pub roundabout: bool,
    pub access_restricted: bool,
    /// Never offered as a snapping candidate (ferries and the like)
    pub ignore_in_grid: bool,
}

impl EdgeFlags {
    pub fn both_ways() -> Self {
        Self {
            forward: true,
            backward: true,
            ..Self::default()
        }
    }

    pub fn oneway() -> Self {
        Self {
            forward: true,
            ..Self::default()
        }
    }

    pub fn to_bits(self) -> u8 {
        (self.forward as u8)
            | (self.backward as u8) << 1
            | (self.roundabout as u8) << 2
            | (self.access_restricted as u8) << 3
            | (self.ignore_in_grid as u8) << 4
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            forward: bits & 0b0_0001 != 0,
            backward: bits & 0b0_0010 != 0,
            roundabout: bits & 0b0_0100 != 0,
            access_restricted: bits & 0b0_1000 != 0,
            ignore_in_grid: bits & 0b1_0000 != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportEdge {
    pub source: NodeId,
    pub target: NodeId,
    /// Deciseconds, must be positive
    pub weight: i32,
    pub name_id: u32,
    pub flags: EdgeFlags,
}

/// Everything the ingestion front-end produces besides restrictions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportData {
    pub nodes: Vec<ImportNode>,
    pub edges: Vec<ImportEdge>,
    pub names: Vec<String>,
}

impl ImportData {
    pub fn barrier_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.flags.barrier)
            .map(|(i, _)| i as NodeId)
    }

    pub fn traffic_signal_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.flags.traffic_signal)
            .map(|(i, _)| i as NodeId)
    }

    pub fn coordinates(&self) -> Vec<FixedPointCoordinate> {
        self.nodes.iter().map(|n| n.coordinate).collect()
    }
}

pub struct ImportFile;

impl ImportFile {
    /// Write import data to file
    pub fn write<P: AsRef<Path>>(path: P, data: &ImportData) -> Result<()> {
        let mut writer = CrcWriter::new(BufWriter::new(File::create(path.as_ref())?));

        write_header(&mut writer, MAGIC, VERSION)?;
        Fingerprint::current().write_to(&mut writer)?;

        writer.write_all(&(data.nodes.len() as u32).to_le_bytes())?;
        for node in &data.nodes {
            writer.write_all(&node.osm_id.to_le_bytes())?;
            writer.write_all(&node.coordinate.lat.to_le_bytes())?;
            writer.write_all(&node.coordinate.lon.to_le_bytes())?;
            writer.write_all(&[node.flags.to_bits()])?;
        }

        writer.write_all(&(data.edges.len() as u32).to_le_bytes())?;
        for edge in &data.edges {
            writer.write_all(&edge.source.to_le_bytes())?;
            writer.write_all(&edge.target.to_le_bytes())?;
            writer.write_all(&edge.weight.to_le_bytes())?;
            writer.write_all(&edge.name_id.to_le_bytes())?;
            writer.write_all(&[edge.flags.to_bits()])?;
        }

        writer.write_all(&(data.names.len() as u32).to_le_bytes())?;
        for name in &data.names {
            writer.write_all(&(name.len() as u32).to_le_bytes())?;
            writer.write_all(name.as_bytes())?;
        }

        writer.finish()?;
        Ok(())
    }

    /// Read import data, verifying header, edge endpoints and footer
    pub fn read<P: AsRef<Path>>(path: P) -> Result<ImportData> {
        let path = path.as_ref();
        let mut reader = CrcReader::new(BufReader::new(File::open(path)?));
        check_header(&mut reader, path, MAGIC, VERSION)?;

        let fingerprint = Fingerprint::read_from(&mut reader)?;
        if !fingerprint.is_current() {
            tracing::warn!(
                file = %path.display(),
                found = %fingerprint,
                "import file was written by a different build"
            );
        }

        let node_count = read_u32(&mut reader)? as u64;
        let mut nodes = Vec::with_capacity(checked_capacity(path, node_count, 17)?);
        for _ in 0..node_count {
            let osm_id = read_u64(&mut reader)?;
            let lat = read_i32(&mut reader)?;
            let lon = read_i32(&mut reader)?;
            let flags = NodeFlags::from_bits(read_u8(&mut reader)?);
            nodes.push(ImportNode {
                osm_id,
                coordinate: FixedPointCoordinate::new(lat, lon),
                flags,
            });
        }

        let edge_count = read_u32(&mut reader)? as u64;
        let mut edges = Vec::with_capacity(checked_capacity(path, edge_count, 17)?);
        for _ in 0..edge_count {
            let edge = ImportEdge {
                source: read_u32(&mut reader)?,
                target: read_u32(&mut reader)?,
                weight: read_i32(&mut reader)?,
                name_id: read_u32(&mut reader)?,
                flags: EdgeFlags::from_bits(read_u8(&mut reader)?),
            };
            if edge.source as u64 >= node_count || edge.target as u64 >= node_count {
                return Err(Error::format(
                    path,
                    format!("edge {}->{} references a missing node", edge.source, edge.target),
                ));
            }
            edges.push(edge);
        }

        let name_count = read_u32(&mut reader)? as u64;
        let mut names = Vec::with_capacity(checked_capacity(path, name_count, 4)?);
        for _ in 0..name_count {
            let len = read_u32(&mut reader)? as usize;
            let mut bytes = vec![0u8; len];
            reader.read_exact(&mut bytes)?;
            let name = String::from_utf8(bytes)
                .map_err(|e| Error::format(path, format!("name is not UTF-8: {e}")))?;
            names.push(name);
        }

        check_footer(path, reader.finish()?)?;
        Ok(ImportData { nodes, edges, names })
    }
}
