//! Versioned hand-off between the preparer and running queries
//!
//! Queries hold an `Arc<Generation>` for their whole lifetime; a reload
//! builds the next generation off to the side and swaps the pointer.

use kestrel_common::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use super::generation::{Generation, ServerPaths};

/// Source of the dataset version token
pub trait GenerationSignal: Send + Sync {
    fn current(&self) -> Result<u64>;
}

/// In-process counter
#[derive(Debug, Default)]
pub struct AtomicGeneration(AtomicU64);

impl AtomicGeneration {
    pub fn new(initial: u64) -> Self {
        Self(AtomicU64::new(initial))
    }

    /// Announce a new dataset; returns the new token
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl GenerationSignal for AtomicGeneration {
    fn current(&self) -> Result<u64> {
        Ok(self.0.load(Ordering::Acquire))
    }
}

impl<T: GenerationSignal + ?Sized> GenerationSignal for Arc<T> {
    fn current(&self) -> Result<u64> {
        (**self).current()
    }
}

/// Integer token kept in a text file; a missing file reads as 0
#[derive(Debug, Clone)]
pub struct FileGeneration {
    path: PathBuf,
}

impl FileGeneration {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl GenerationSignal for FileGeneration {
    fn current(&self) -> Result<u64> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => text
                .trim()
                .parse()
                .map_err(|_| Error::format(&self.path, format!("version token {:?}", text.trim()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct ReloadingFacade {
    paths: ServerPaths,
    signal: Box<dyn GenerationSignal>,
    current: RwLock<Arc<Generation>>,
    /// Writer lock; holds the last token whose generation failed to load
    reload: Mutex<Option<u64>>,
}

impl ReloadingFacade {
    pub fn new(paths: ServerPaths, signal: Box<dyn GenerationSignal>) -> Result<Self> {
        let version = signal.current()?;
        let generation = Generation::load(&paths, version)?;
        Ok(Self {
            paths,
            signal,
            current: RwLock::new(Arc::new(generation)),
            reload: Mutex::new(None),
        })
    }

    /// The generation new queries should run on
    pub fn snapshot(&self) -> Arc<Generation> {
        Arc::clone(&self.current.read())
    }

    /// Load and install a new generation if the signal moved; returns
    /// whether a swap happened
    ///
    /// A token whose generation failed to load is tried once; later calls
    /// keep the current generation until the signal moves again.
    pub fn check_and_reload(&self) -> Result<bool> {
        let token = self.signal.current()?;
        if token == self.current.read().version() {
            return Ok(false);
        }

        let mut failed = self.reload.lock();
        let previous = self.current.read().version();
        if token == previous || *failed == Some(token) {
            // another writer got here first, or this token is known bad
            return Ok(false);
        }
        match Generation::load(&self.paths, token) {
            Ok(next) => {
                *self.current.write() = Arc::new(next);
                *failed = None;
                info!(previous, current = token, "dataset generation swapped");
                Ok(true)
            }
            Err(e) => {
                *failed = Some(token);
                Err(e)
            }
        }
    }
}
