//! Binary file formats written by `prepare` and loaded by the query facade
//!
//! Every format is little-endian. Files owned by this crate start with a
//! 4-byte magic and a version and end with a CRC-32 footer; the restriction,
//! node map, contracted graph and R-tree layouts are fixed by the import and
//! serving contracts and carry a build fingerprint instead.

pub mod crc;
pub mod edges;
pub mod fingerprint;
pub mod geometry;
pub mod hsgr;
pub mod import;
pub mod names;
pub mod node_map;
pub mod restrictions;
pub mod timestamp;

use kestrel_common::{Error, Result};
use std::io::{self, Read, Write};
use std::path::Path;

pub use edges::{OriginalEdgeData, OriginalEdgeDataFile};
pub use fingerprint::Fingerprint;
pub use geometry::{GeometryFile, GeometryTable};
pub use hsgr::{HsgrData, HsgrFile};
pub use import::{EdgeFlags, ImportData, ImportEdge, ImportFile, ImportNode, NodeFlags};
pub use names::{NameTable, NamesFile};
pub use node_map::NodeMapFile;
pub use restrictions::{RestrictionsFile, TurnRestriction};

pub(crate) fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(crate) fn read_u16<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub(crate) fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_i32<R: Read>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

pub(crate) fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Write the `MAGIC | VERSION | reserved` header used by crate-owned formats
pub(crate) fn write_header<W: Write>(writer: &mut W, magic: u32, version: u16) -> io::Result<()> {
    writer.write_all(&magic.to_le_bytes())?;
    writer.write_all(&version.to_le_bytes())?;
    writer.write_all(&0u16.to_le_bytes())?;
    Ok(())
}

/// Read and check a header written by [`write_header`]
pub(crate) fn check_header<R: Read>(
    reader: &mut R,
    path: &Path,
    magic: u32,
    version: u16,
) -> Result<()> {
    let found_magic = read_u32(reader)?;
    if found_magic != magic {
        return Err(Error::format(
            path,
            format!("bad magic {found_magic:#010x}, expected {magic:#010x}"),
        ));
    }
    let found_version = read_u16(reader)?;
    if found_version != version {
        return Err(Error::format(
            path,
            format!("unsupported version {found_version}, expected {version}"),
        ));
    }
    let _reserved = read_u16(reader)?;
    Ok(())
}

/// Compare a footer checksum pair returned by [`crc::CrcReader::finish`]
pub(crate) fn check_footer(path: &Path, (computed, stored): (u32, u32)) -> Result<()> {
    if computed != stored {
        return Err(Error::ChecksumMismatch {
            file: path.to_path_buf(),
            expected: stored,
            found: computed,
        });
    }
    Ok(())
}

/// Guard against absurd counts in corrupt headers before allocating
pub(crate) fn checked_capacity(path: &Path, count: u64, record_size: u64) -> Result<usize> {
    const MAX_BYTES: u64 = 1 << 40;
    match count.checked_mul(record_size) {
        Some(bytes) if bytes <= MAX_BYTES => Ok(count as usize),
        _ => Err(Error::format(path, format!("record count {count} is implausible"))),
    }
}
