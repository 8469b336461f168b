//! Compressed geometry table - node ids removed by degree-2 compression
//!
//! Layout:
//! ```text
//! MAGIC "KGEO" u32 | VERSION u16 | reserved u16
//! index count u32 | indices u32 * index count
//! list count u32 | node ids u32 * list count
//! crc32 u32
//! ```
//! Geometry `i` is `list[indices[i]..indices[i + 1]]`; `indices` carries a
//! trailing sentinel equal to the list length.

use kestrel_common::{Error, NodeId, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use super::crc::{CrcReader, CrcWriter};
use super::{check_footer, check_header, checked_capacity, read_u32, write_header};

const MAGIC: u32 = 0x4F45_474B; // "KGEO"
const VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryTable {
    indices: Vec<u32>,
    list: Vec<NodeId>,
}

impl Default for GeometryTable {
    fn default() -> Self {
        Self {
            indices: vec![0],
            list: Vec::new(),
        }
    }
}

impl GeometryTable {
    /// Append one geometry and return its id
    pub fn push(&mut self, nodes: &[NodeId]) -> u32 {
        let id = self.len() as u32;
        self.list.extend_from_slice(nodes);
        self.indices.push(self.list.len() as u32);
        id
    }

    pub fn len(&self) -> usize {
        self.indices.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Node ids of one geometry in travel order; empty for unknown ids
    pub fn get(&self, geometry_id: u32) -> &[NodeId] {
        let i = geometry_id as usize;
        match (self.indices.get(i), self.indices.get(i + 1)) {
            (Some(&begin), Some(&end)) => &self.list[begin as usize..end as usize],
            _ => &[],
        }
    }
}

pub struct GeometryFile;

impl GeometryFile {
    pub fn write<P: AsRef<Path>>(path: P, table: &GeometryTable) -> Result<()> {
        let mut writer = CrcWriter::new(BufWriter::new(File::create(path)?));
        write_header(&mut writer, MAGIC, VERSION)?;
        writer.write_all(&(table.indices.len() as u32).to_le_bytes())?;
        for &index in &table.indices {
            writer.write_all(&index.to_le_bytes())?;
        }
        writer.write_all(&(table.list.len() as u32).to_le_bytes())?;
        for &node in &table.list {
            writer.write_all(&node.to_le_bytes())?;
        }
        writer.finish()?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<GeometryTable> {
        let path = path.as_ref();
        let mut reader = CrcReader::new(BufReader::new(File::open(path)?));
        check_header(&mut reader, path, MAGIC, VERSION)?;

        let index_count = read_u32(&mut reader)? as u64;
        let mut indices = Vec::with_capacity(checked_capacity(path, index_count, 4)?);
        for _ in 0..index_count {
            indices.push(read_u32(&mut reader)?);
        }
        let list_count = read_u32(&mut reader)? as u64;
        let mut list = Vec::with_capacity(checked_capacity(path, list_count, 4)?);
        for _ in 0..list_count {
            list.push(read_u32(&mut reader)?);
        }
        check_footer(path, reader.finish()?)?;

        let valid = indices.first() == Some(&0)
            && indices.windows(2).all(|w| w[0] <= w[1])
            && indices.last().map(|&l| l as usize) == Some(list.len());
        if !valid {
            return Err(Error::format(path, "geometry indices are not a valid range table"));
        }
        Ok(GeometryTable { indices, list })
    }
}
