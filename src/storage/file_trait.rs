//! Trait abstraction for durable file operations to enable testing

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

/// How [`Storage::open`] treats existing content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create or empty the file
    Truncate,
    /// Create if missing, keep content, write position at 0
    Write,
}

/// One open file on the durable medium
pub trait DurableFile {
    /// Move the write position to `offset` from the start
    fn seek(&mut self, offset: u64) -> io::Result<()>;

    /// Write all of `buf` at the current position
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Current file length in bytes
    fn current_length(&mut self) -> io::Result<u64>;

    /// Cut or extend the file to exactly `len` bytes
    fn set_length(&mut self, len: u64) -> io::Result<()>;

    /// Flush to the medium and release the handle
    fn close(self) -> io::Result<()>;
}

/// Filesystem primitives consumed by the writer and the session
pub trait Storage {
    type File: DurableFile;

    /// Open `path` for writing
    fn open(&mut self, path: &Path, mode: OpenMode) -> io::Result<Self::File>;

    /// Create a directory (and its parents); existing directories are fine
    fn make_directory(&mut self, path: &Path) -> io::Result<()>;

    /// Atomically replace `to` with `from`; the new directory entry is
    /// durable once this returns
    fn rename(&mut self, from: &Path, to: &Path) -> io::Result<()>;
}

/// [`Storage`] over the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl FsStorage {
    pub fn new() -> Self {
        Self
    }
}

/// Wrapper around `std::fs::File` that implements [`DurableFile`]
#[derive(Debug)]
pub struct FsFile {
    file: File,
}

impl DurableFile for FsFile {
    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset)).map(|_| ())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.write_all(buf)
    }

    fn current_length(&mut self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn set_length(&mut self, len: u64) -> io::Result<()> {
        self.file.set_len(len)
    }

    fn close(mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()
    }
}

impl Storage for FsStorage {
    type File = FsFile;

    fn open(&mut self, path: &Path, mode: OpenMode) -> io::Result<FsFile> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(mode == OpenMode::Truncate)
            .open(path)?;
        Ok(FsFile { file })
    }

    fn make_directory(&mut self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn rename(&mut self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)?;
        sync_parent_dir(to)
    }
}

/// Flush the directory holding `path` so a rename survives power loss
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(dir)?.sync_all()
}

// Directory handles cannot be synced here; rename durability is left to the OS
#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
