//! Dataset timestamp (plain text)

use kestrel_common::Result;
use std::path::Path;

/// Reported when a dataset carries no timestamp
pub const UNKNOWN_TIMESTAMP: &str = "n/a";

pub fn write<P: AsRef<Path>>(path: P, timestamp: &str) -> Result<()> {
    std::fs::write(path, timestamp.trim())?;
    Ok(())
}

/// Read a timestamp; a missing or empty file yields [`UNKNOWN_TIMESTAMP`]
pub fn read<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => Ok(content.trim().to_string()),
        Ok(_) => Ok(UNKNOWN_TIMESTAMP.to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(file = %path.display(), "no timestamp file, reporting n/a");
            Ok(UNKNOWN_TIMESTAMP.to_string())
        }
        Err(e) => Err(e.into()),
    }
}

/// Current UTC time in the format written by `prepare`
pub fn now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
