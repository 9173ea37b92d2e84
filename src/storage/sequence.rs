//! Persistent flight sequence numbers
//!
//! The counter file holds the next value to hand out. An absent or
//! unreadable counter starts over at zero.

use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::IgcLoggerError;

/// Integer key-value persistence
#[cfg_attr(test, mockall::automock)]
pub trait CounterStore {
    /// Stored value for `key`, `None` if absent or unreadable
    fn read_integer(&self, key: &str) -> Option<u32>;

    /// Replace the stored value for `key`
    fn write_integer(&mut self, key: &str, value: u32) -> io::Result<()>;
}

/// Counter store keeping one `<key>.txt` file per key in a directory
#[derive(Debug, Clone)]
pub struct FileCounterStore {
    dir: PathBuf,
}

impl FileCounterStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", key))
    }
}

impl CounterStore for FileCounterStore {
    fn read_integer(&self, key: &str) -> Option<u32> {
        let text = fs::read_to_string(self.path_for(key)).ok()?;
        text.trim().parse().ok()
    }

    fn write_integer(&mut self, key: &str, value: u32) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), format!("{}\r\n", value))
    }
}

/// Result of one allocation
#[derive(Debug)]
pub struct Allocation {
    /// The sequence number to use
    pub value: u32,
    /// Set when the incremented counter could not be written back
    pub persist_error: Option<IgcLoggerError>,
}

/// Hands out flight sequence numbers from a [`CounterStore`]
#[derive(Debug)]
pub struct SequenceAllocator<C: CounterStore> {
    store: C,
    key: String,
}

impl<C: CounterStore> SequenceAllocator<C> {
    pub fn new(store: C, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Allocate the next sequence number.
    ///
    /// Returns the value read from the store and persists `value + 1`. A
    /// failed write does not invalidate the value; it is reported in
    /// [`Allocation::persist_error`] and the same value may be handed out
    /// again next time.
    pub fn next(&mut self) -> Allocation {
        let value = self.store.read_integer(&self.key).unwrap_or(0);
        let persist_error = match self.store.write_integer(&self.key, value.wrapping_add(1)) {
            Ok(()) => None,
            Err(source) => {
                warn!("Failed to persist sequence counter '{}': {}", self.key, source);
                Some(IgcLoggerError::SequencePersistFailed {
                    key: self.key.clone(),
                    source,
                })
            }
        };
        debug!("Allocated flight sequence {} from '{}'", value, self.key);
        Allocation { value, persist_error }
    }
}
