//! Street name table
//!
//! Layout:
//! ```text
//! MAGIC "KNAM" u32 | VERSION u16 | reserved u16 | count u32
//! offsets u32 * (count + 1) | blob length u32 | blob bytes
//! crc32 u32
//! ```
//! Name `i` is `blob[offsets[i]..offsets[i + 1]]`.

use kestrel_common::{Error, Result, INVALID_NAME_ID};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::crc::{CrcReader, CrcWriter};
use super::{check_footer, check_header, checked_capacity, read_u32, write_header};

const MAGIC: u32 = 0x4D41_4E4B; // "KNAM"
const VERSION: u16 = 1;

/// All street names concatenated, addressed through a range table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    offsets: Vec<u32>,
    blob: String,
}

impl NameTable {
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut offsets = Vec::with_capacity(names.len() + 1);
        let mut blob = String::new();
        offsets.push(0);
        for name in names {
            blob.push_str(name.as_ref());
            offsets.push(blob.len() as u32);
        }
        Self { offsets, blob }
    }

    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name for an id; unnamed and out-of-range ids yield ""
    pub fn get(&self, name_id: u32) -> &str {
        if name_id == INVALID_NAME_ID {
            return "";
        }
        let i = name_id as usize;
        match (self.offsets.get(i), self.offsets.get(i + 1)) {
            (Some(&begin), Some(&end)) => self.blob.get(begin as usize..end as usize).unwrap_or(""),
            _ => "",
        }
    }
}

pub struct NamesFile;

impl NamesFile {
    pub fn write<P: AsRef<Path>>(path: P, table: &NameTable) -> Result<()> {
        let mut writer = CrcWriter::new(BufWriter::new(File::create(path)?));
        write_header(&mut writer, MAGIC, VERSION)?;
        writer.write_all(&(table.len() as u32).to_le_bytes())?;
        for &offset in &table.offsets {
            writer.write_all(&offset.to_le_bytes())?;
        }
        writer.write_all(&(table.blob.len() as u32).to_le_bytes())?;
        writer.write_all(table.blob.as_bytes())?;
        writer.finish()?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<NameTable> {
        let path = path.as_ref();
        let mut reader = CrcReader::new(BufReader::new(File::open(path)?));
        check_header(&mut reader, path, MAGIC, VERSION)?;

        let count = read_u32(&mut reader)? as u64;
        let mut offsets = Vec::with_capacity(checked_capacity(path, count + 1, 4)?);
        for _ in 0..=count {
            offsets.push(read_u32(&mut reader)?);
        }
        let blob_len = read_u32(&mut reader)?;
        let mut bytes = vec![0u8; blob_len as usize];
        reader.read_exact(&mut bytes)?;
        check_footer(path, reader.finish()?)?;

        if offsets.windows(2).any(|w| w[0] > w[1]) || offsets.last() != Some(&blob_len) {
            return Err(Error::format(path, "name offsets are not a valid range table"));
        }
        let blob = String::from_utf8(bytes)
            .map_err(|e| Error::format(path, format!("name blob is not UTF-8: {e}")))?;
        Ok(NameTable { offsets, blob })
    }
}
