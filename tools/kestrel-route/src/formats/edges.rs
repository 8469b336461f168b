//! Original edge data - per edge-based edge: via node, name and turn instruction
//!
//! Layout:
//! ```text
//! MAGIC "KEDG" u32 | VERSION u16 | reserved u16 | count u32
//! { via_or_geometry u32, name_id u32, turn_instruction u8, compressed u8 } * count
//! crc32 u32
//! ```

use kestrel_common::{Error, NodeId, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use super::crc::{CrcReader, CrcWriter};
use super::{check_footer, check_header, checked_capacity, read_u32, read_u8, write_header};
use crate::ebg::TurnInstruction;

const MAGIC: u32 = 0x4744_454B; // "KEDG"
const VERSION: u16 = 1;

/// What a query needs to know about the turn behind an edge-based edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalEdgeData {
    /// The node the turn happens at, or a geometry id when `compressed`
    pub via_node: NodeId,
    pub name_id: u32,
    pub turn_instruction: TurnInstruction,
    pub compressed: bool,
}

pub struct OriginalEdgeDataFile;

impl OriginalEdgeDataFile {
    pub fn write<P: AsRef<Path>>(path: P, data: &[OriginalEdgeData]) -> Result<()> {
        let mut writer = CrcWriter::new(BufWriter::new(File::create(path)?));
        write_header(&mut writer, MAGIC, VERSION)?;
        writer.write_all(&(data.len() as u32).to_le_bytes())?;
        for d in data {
            writer.write_all(&d.via_node.to_le_bytes())?;
            writer.write_all(&d.name_id.to_le_bytes())?;
            writer.write_all(&[d.turn_instruction as u8, d.compressed as u8])?;
        }
        writer.finish()?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<OriginalEdgeData>> {
        let path = path.as_ref();
        let mut reader = CrcReader::new(BufReader::new(File::open(path)?));
        check_header(&mut reader, path, MAGIC, VERSION)?;

        let count = read_u32(&mut reader)? as u64;
        let mut data = Vec::with_capacity(checked_capacity(path, count, 10)?);
        for i in 0..count {
            let via_node = read_u32(&mut reader)?;
            let name_id = read_u32(&mut reader)?;
            let raw = read_u8(&mut reader)?;
            let turn_instruction = TurnInstruction::from_u8(raw).ok_or_else(|| {
                Error::format(path, format!("record {i}: unknown turn instruction {raw}"))
            })?;
            let compressed = read_u8(&mut reader)? != 0;
            data.push(OriginalEdgeData {
                via_node,
                name_id,
                turn_instruction,
                compressed,
            });
        }

        check_footer(path, reader.finish()?)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_edges_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("city.edges");
        let data = vec![
            OriginalEdgeData {
                via_node: 4,
                name_id: 0,
                turn_instruction: TurnInstruction::TurnLeft,
                compressed: false,
            },
            OriginalEdgeData {
                via_node: 0,
                name_id: kestrel_common::INVALID_NAME_ID,
                turn_instruction: TurnInstruction::EnterRoundAbout,
                compressed: true,
            },
        ];
        OriginalEdgeDataFile::write(&path, &data).unwrap();
        assert_eq!(OriginalEdgeDataFile::read(&path).unwrap(), data);
    }

    #[test]
    fn test_unknown_instruction_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.edges");

        let mut writer = CrcWriter::new(Vec::new());
        write_header(&mut writer, MAGIC, VERSION).unwrap();
        writer.write_all(&1u32.to_le_bytes()).unwrap();
        writer.write_all(&0u32.to_le_bytes()).unwrap();
        writer.write_all(&0u32.to_le_bytes()).unwrap();
        writer.write_all(&[250, 0]).unwrap();
        std::fs::write(&path, writer.finish().unwrap()).unwrap();

        let err = OriginalEdgeDataFile::read(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat { .. }));
    }
}
