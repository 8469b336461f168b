//! CRC-32 checksum utilities

use crc::{Crc, CRC_32_ISO_HDLC};
use std::io::{self, Read, Write};

/// CRC-32 (ISO-HDLC, as used by zlib/PNG)
pub const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Compute CRC-32 checksum for a byte slice
pub fn checksum(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Incremental CRC-32 digest
pub struct Digest {
    digest: crc::Digest<'static, u32>,
}

impl Digest {
    pub fn new() -> Self {
        Self {
            digest: CRC32.digest(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    pub fn finalize(self) -> u32 {
        self.digest.finalize()
    }
}

impl Default for Digest {
    fn default() -> Self {
        Self::new()
    }
}

/// Writer that feeds every written byte into a CRC digest
pub struct CrcWriter<W: Write> {
    inner: W,
    digest: Digest,
}

impl<W: Write> CrcWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            digest: Digest::new(),
        }
    }

    /// Write the accumulated checksum as a little-endian footer and return the inner writer
    pub fn finish(mut self) -> io::Result<W> {
        let crc = self.digest.finalize();
        self.inner.write_all(&crc.to_le_bytes())?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for CrcWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.digest.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Reader that feeds every read byte into a CRC digest
pub struct CrcReader<R: Read> {
    inner: R,
    digest: Digest,
}

impl<R: Read> CrcReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            digest: Digest::new(),
        }
    }

    /// Read the footer and return `(computed, stored)` checksums
    pub fn finish(mut self) -> io::Result<(u32, u32)> {
        let computed = self.digest.finalize();
        let mut footer = [0u8; 4];
        self.inner.read_exact(&mut footer)?;
        Ok((computed, u32::from_le_bytes(footer)))
    }
}

impl<R: Read> Read for CrcReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.digest.update(&buf[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_known_value() {
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_crc32_incremental() {
        let data = b"hello world";
        let mut digest = Digest::new();
        digest.update(&data[..5]);
        digest.update(&data[5..]);
        assert_eq!(digest.finalize(), checksum(data));
    }

    #[test]
    fn test_writer_reader_footer_agree() {
        let mut writer = CrcWriter::new(Vec::new());
        writer.write_all(b"kestrel").unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes.len(), 7 + 4);

        let mut reader = CrcReader::new(&bytes[..]);
        let mut body = [0u8; 7];
        reader.read_exact(&mut body).unwrap();
        let (computed, stored) = reader.finish().unwrap();
        assert_eq!(computed, stored);
        assert_eq!(computed, checksum(b"kestrel"));
    }
}
