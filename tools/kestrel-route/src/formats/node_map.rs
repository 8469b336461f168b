//! Node map format - internal node index to OSM id, coordinate and flags
//!
//! Layout:
//! ```text
//! count u32 | { osm_id u64, lat i32, lon i32, flags u8 } * count
//! ```
//! Record `i` describes node-based node `i`.

use kestrel_common::{FixedPointCoordinate, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use super::import::{ImportNode, NodeFlags};
use super::{checked_capacity, read_i32, read_u32, read_u64, read_u8};

pub struct NodeMapFile;

impl NodeMapFile {
    pub fn write<P: AsRef<Path>>(path: P, nodes: &[ImportNode]) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&(nodes.len() as u32).to_le_bytes())?;
        for node in nodes {
            writer.write_all(&node.osm_id.to_le_bytes())?;
            writer.write_all(&node.coordinate.lat.to_le_bytes())?;
            writer.write_all(&node.coordinate.lon.to_le_bytes())?;
            writer.write_all(&[node.flags.to_bits()])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<ImportNode>> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let count = read_u32(&mut reader)? as u64;
        let mut nodes = Vec::with_capacity(checked_capacity(path, count, 17)?);
        for _ in 0..count {
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
        Ok(nodes)
    }

    /// Read only the coordinates, indexed by node id
    pub fn read_coordinates<P: AsRef<Path>>(path: P) -> Result<Vec<FixedPointCoordinate>> {
        Ok(Self::read(path)?.into_iter().map(|n| n.coordinate).collect())
    }
}
