//! Turn restriction format
//!
//! Layout:
//! ```text
//! fingerprint [u8; 16] | count u32 | { via u32, from u32, to u32, flags u8 } * count
//! ```
//! `from`/`to` are the nodes adjacent to `via` on the from-way and the to-way.

use kestrel_common::{NodeId, Result, SPECIAL_NODEID};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use super::fingerprint::Fingerprint;
use super::{checked_capacity, read_u32, read_u8};

const FLAG_IS_ONLY: u8 = 0b1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnRestriction {
    pub via: NodeId,
    pub from: NodeId,
    pub to: NodeId,
    /// Mandatory turn ("only_*") instead of a prohibition
    pub is_only: bool,
}

impl TurnRestriction {
    pub fn prohibition(from: NodeId, via: NodeId, to: NodeId) -> Self {
        Self {
            via,
            from,
            to,
            is_only: false,
        }
    }

    pub fn mandatory(from: NodeId, via: NodeId, to: NodeId) -> Self {
        Self {
            via,
            from,
            to,
            is_only: true,
        }
    }

    /// Ingestion voids restrictions (e.g. by `except=*`) by clearing the from-way
    pub fn ignored(via: NodeId, to: NodeId) -> Self {
        Self {
            via,
            from: SPECIAL_NODEID,
            to,
            is_only: false,
        }
    }

    pub fn is_ignored(&self) -> bool {
        self.from == SPECIAL_NODEID
    }
}

pub struct RestrictionsFile;

impl RestrictionsFile {
    pub fn write<P: AsRef<Path>>(path: P, restrictions: &[TurnRestriction]) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        Fingerprint::current().write_to(&mut writer)?;
        writer.write_all(&(restrictions.len() as u32).to_le_bytes())?;
        for r in restrictions {
            writer.write_all(&r.via.to_le_bytes())?;
            writer.write_all(&r.from.to_le_bytes())?;
            writer.write_all(&r.to.to_le_bytes())?;
            let flags = if r.is_only { FLAG_IS_ONLY } else { 0 };
            writer.write_all(&[flags])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read restrictions. A fingerprint mismatch is only a warning: stale
    /// restrictions are still usable.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<TurnRestriction>> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);

        let fingerprint = Fingerprint::read_from(&mut reader)?;
        if !fingerprint.is_current() {
            tracing::warn!(
                file = %path.display(),
                found = %fingerprint,
                "restrictions file was written by a different build, using it anyway"
            );
        }

        let count = read_u32(&mut reader)? as u64;
        let mut restrictions = Vec::with_capacity(checked_capacity(path, count, 13)?);
        for _ in 0..count {
            let via = read_u32(&mut reader)?;
            let from = read_u32(&mut reader)?;
            let to = read_u32(&mut reader)?;
            let flags = read_u8(&mut reader)?;
            restrictions.push(TurnRestriction {
                via,
                from,
                to,
                is_only: flags & FLAG_IS_ONLY != 0,
            });
        }
        Ok(restrictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_restrictions_roundtrip_keeps_ignored_sentinel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("city.restrictions");
        let input = vec![
            TurnRestriction::mandatory(1, 2, 3),
            TurnRestriction::prohibition(4, 2, 5),
            TurnRestriction::ignored(2, 6),
        ];
        RestrictionsFile::write(&path, &input).unwrap();

        let loaded = RestrictionsFile::read(&path).unwrap();
        assert_eq!(loaded, input);
        assert!(loaded[0].is_only);
        assert!(loaded[2].is_ignored());
    }

    #[test]
    fn test_stale_fingerprint_still_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.restrictions");
        RestrictionsFile::write(&path, &[TurnRestriction::prohibition(0, 1, 2)]).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();

        assert_eq!(RestrictionsFile::read(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_truncated_file_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.restrictions");
        RestrictionsFile::write(&path, &[TurnRestriction::prohibition(0, 1, 2)]).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        assert!(RestrictionsFile::read(&path).is_err());
    }
}
