//! Build fingerprint stamped into import, restriction and graph files
//!
//! Stands in for a build UUID: two binaries produce the same fingerprint iff
//! they agree on the crate version and every record layout below.

use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read, Write};

pub const FINGERPRINT_LEN: usize = 16;

/// Record layouts that must agree between writer and reader
const LAYOUTS: &[&str] = &[
    "import:node{u64,i32,i32,u8};edge{u32,u32,i32,u32,u8};names{u32,utf8}",
    "restriction{u32,u32,u32,u8}",
    "nodes{u64,i32,i32,u8}",
    "hsgr:node{u32};edge{u32,i32,u32,u8}",
    "rtree:ram{u64,u32,u32};node{i32x4,u32,u8,u32xB};leaf{u32,ebn{u32x4,i32x4,u32,i32x4,u32x3,u8}xL}",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint(pub [u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Fingerprint of the running build
    pub fn current() -> Self {
        let mut hasher = Sha256::new();
        hasher.update(env!("CARGO_PKG_VERSION").as_bytes());
        for layout in LAYOUTS {
            hasher.update(layout.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; FINGERPRINT_LEN];
        bytes.copy_from_slice(&digest[..FINGERPRINT_LEN]);
        Self(bytes)
    }

    pub fn is_current(&self) -> bool {
        *self == Self::current()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.0)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut bytes = [0u8; FINGERPRINT_LEN];
        reader.read_exact(&mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_is_stable() {
        assert_eq!(Fingerprint::current(), Fingerprint::current());
        assert!(Fingerprint::current().is_current());
    }

    #[test]
    fn display_is_hex() {
        let fp = Fingerprint([0xab; FINGERPRINT_LEN]);
        assert_eq!(fp.to_string(), "ab".repeat(FINGERPRINT_LEN));
    }
}
