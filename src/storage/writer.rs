//! # Signed Append Writer
//!
//! Owns one IGC file and keeps it ending in a valid G-record trailer after
//! every append, so a flight cut short by power loss is still verifiable up
//! to its last committed fix.
//!
//! ## States
//!
//! ```text
//! Empty --write_header--> HeaderWritten --append--> HasFixes --append--> HasFixes
//! ```
//!
//! The writer tracks a cursor: the byte offset right after the last fix
//! record. Everything before the cursor is committed; the trailer, when
//! present, starts at the cursor and is replaced by the next append.
//!
//! ## Commit strategies
//!
//! - [`CommitStrategy::Seek`]: reopen the file, seek to the cursor, write the
//!   new fixes over the old trailer, write a fresh trailer, cut the file.
//! - [`CommitStrategy::Atomic`]: keep header and fixes in memory and write
//!   the whole file to `<name>.tmp`, then rename it over the target. The
//!   target always holds a complete, verifiable file.
//!
//! In both strategies the cursor and digests only move after every storage
//! call of the append has succeeded.

use bytes::{BufMut, BytesMut};
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use super::file_trait::{DurableFile, OpenMode, Storage};
use crate::error::{IgcLoggerError, Result};
use crate::igc::digest::DigestBank;
use crate::igc::encoder::encode_g_records;
use crate::igc::protocol::{GRecordLayout, IGC_EOL};

/// How an append reaches the medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitStrategy {
    /// Write-to-temp then rename; the default on hosted filesystems
    #[default]
    Atomic,
    /// Seek to the cursor and overwrite the trailer in place
    Seek,
}

/// Writer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Empty,
    HeaderWritten,
    HasFixes,
}

/// Appends signed IGC records to one file
pub struct SignedAppendWriter<S: Storage> {
    storage: S,
    path: PathBuf,
    temp_path: PathBuf,
    strategy: CommitStrategy,
    layout: GRecordLayout,
    state: WriterState,
    cursor: u64,
    digests: DigestBank,
    /// Header and fix bytes, kept only for [`CommitStrategy::Atomic`]
    committed: BytesMut,
}

impl<S: Storage> std::fmt::Debug for SignedAppendWriter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedAppendWriter")
            .field("path", &self.path)
            .field("strategy", &self.strategy)
            .field("layout", &self.layout)
            .field("state", &self.state)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

/// `flight.igc` -> `flight.igc.tmp`
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Append `line` and CRLF to `buf`
fn put_line(buf: &mut BytesMut, line: &str) {
    buf.put_slice(line.as_bytes());
    buf.put_slice(IGC_EOL);
}

impl<S: Storage> SignedAppendWriter<S> {
    /// Create a writer for `path`. Nothing touches storage until the header
    /// is written.
    pub fn new(storage: S, path: impl Into<PathBuf>, strategy: CommitStrategy, layout: GRecordLayout) -> Self {
        let path = path.into();
        Self {
            storage,
            temp_path: temp_path_for(&path),
            path,
            strategy,
            layout,
            state: WriterState::Empty,
            cursor: 0,
            digests: DigestBank::new(),
            committed: BytesMut::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Offset right after the last committed fix (or the header block)
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn layout(&self) -> GRecordLayout {
        self.layout
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The G lines the file currently ends with, computed from the live
    /// digests. Calling this never changes writer state.
    pub fn trailer(&self) -> Vec<String> {
        encode_g_records(&self.digests.snapshot(), self.layout)
    }

    fn trailer_bytes(&self, digests: &DigestBank) -> BytesMut {
        let lines = encode_g_records(&digests.snapshot(), self.layout);
        let mut buf = BytesMut::with_capacity(self.layout.trailer_len());
        for line in &lines {
            put_line(&mut buf, line);
        }
        buf
    }

    fn storage_error(&self, path: &Path, source: std::io::Error) -> IgcLoggerError {
        warn!("IGC storage failure on {}: {}", path.display(), source);
        IgcLoggerError::storage(path, source)
    }

    /// Write the manufacturer record and header block, truncating any
    /// existing file. A no-op once the header is written.
    ///
    /// # Arguments
    ///
    /// * `records` - A record followed by H/I records, without terminators
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the file cannot be written; the
    /// writer stays `Empty` and the call may be repeated.
    pub fn write_header(&mut self, records: &[String]) -> Result<()> {
        if self.state != WriterState::Empty {
            debug!("IGC header already written to {}", self.path.display());
            return Ok(());
        }

        let mut block = BytesMut::new();
        for record in records {
            put_line(&mut block, record);
        }

        let length = match self.strategy {
            CommitStrategy::Seek => {
                let path = self.path.clone();
                self.write_in_place(&path, &block)
                    .map_err(|e| self.storage_error(&path, e))?
            }
            CommitStrategy::Atomic => {
                self.replace_file(&[&block[..]])?;
                block.len() as u64
            }
        };

        if self.strategy == CommitStrategy::Atomic {
            self.committed = block;
        }
        self.cursor = length;
        self.state = WriterState::HeaderWritten;
        debug!("IGC header written to {} ({} bytes)", self.path.display(), length);
        Ok(())
    }

    /// Truncating write used for the header in seek mode
    fn write_in_place(&mut self, path: &Path, block: &[u8]) -> std::io::Result<u64> {
        let mut file = self.storage.open(path, OpenMode::Truncate)?;
        file.write_bytes(block)?;
        let length = file.current_length()?;
        file.close()?;
        Ok(length)
    }

    /// Append one fix record and rewrite the trailer
    pub fn append_fix(&mut self, record: &str) -> Result<()> {
        self.append_fixes(std::slice::from_ref(&record))
    }

    /// Append several fix records in one commit and rewrite the trailer
    ///
    /// # Arguments
    ///
    /// * `records` - Formatted B records, without terminators
    ///
    /// # Errors
    ///
    /// - `HeaderNotWritten` if called before [`write_header`](Self::write_header)
    /// - `StorageUnavailable` if any storage step fails; cursor and digests
    ///   are left exactly as before the call
    pub fn append_fixes<R: AsRef<str>>(&mut self, records: &[R]) -> Result<()> {
        if self.state == WriterState::Empty {
            return Err(IgcLoggerError::HeaderNotWritten);
        }
        if records.is_empty() {
            return Ok(());
        }

        let mut digests = self.digests.clone();
        let mut fixes = BytesMut::new();
        for record in records {
            let line = record.as_ref();
            digests.update(line.as_bytes());
            put_line(&mut fixes, line);
        }
        let trailer = self.trailer_bytes(&digests);
        let new_cursor = self.cursor + fixes.len() as u64;

        match self.strategy {
            CommitStrategy::Seek => {
                let path = self.path.clone();
                self.overwrite_at_cursor(&path, &fixes, &trailer)
                    .map_err(|e| self.storage_error(&path, e))?;
            }
            CommitStrategy::Atomic => {
                let committed = self.committed.clone();
                self.replace_file(&[&committed[..], &fixes[..], &trailer[..]])?;
                self.committed.put_slice(&fixes);
            }
        }

        self.digests = digests;
        self.cursor = new_cursor;
        self.state = WriterState::HasFixes;
        trace!(
            "Appended {} fix record(s) to {}, cursor at {}",
            records.len(),
            self.path.display(),
            self.cursor
        );
        Ok(())
    }

    /// Seek-mode commit: new fixes start where the old trailer started
    fn overwrite_at_cursor(&mut self, path: &Path, fixes: &[u8], trailer: &[u8]) -> std::io::Result<()> {
        let mut file = self.storage.open(path, OpenMode::Write)?;
        if self.cursor > 0 {
            file.seek(self.cursor)?;
        }
        file.write_bytes(fixes)?;
        file.write_bytes(trailer)?;
        file.set_length(self.cursor + (fixes.len() + trailer.len()) as u64)?;
        file.close()
    }

    /// Atomic-mode commit: write `parts` to the temp file, then rename it
    /// over the target. The second-to-last write boundary is where a crash
    /// between "fixes written" and "trailer written" would land.
    fn replace_file(&mut self, parts: &[&[u8]]) -> Result<()> {
        let temp = self.temp_path.clone();
        let result = (|| -> std::io::Result<()> {
            let mut file = self.storage.open(&temp, OpenMode::Truncate)?;
            for part in parts.iter().filter(|p| !p.is_empty()) {
                file.write_bytes(part)?;
            }
            file.close()
        })();
        result.map_err(|e| self.storage_error(&temp, e))?;

        let target = self.path.clone();
        self.storage
            .rename(&temp, &target)
            .map_err(|e| self.storage_error(&target, e))
    }

    /// Release the storage handle
    pub fn into_storage(self) -> S {
        self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::igc::protocol::{FIX_RECORD_LEN, G_LINE_LEN};
    use crate::igc::verify::verify;
    use crate::storage::file_trait::mocks::MemoryStorage;
    use std::io::ErrorKind;

    const HEADER: [&str; 3] = ["AXLK001", "HFDTE150221", "I023638FXA3940SIU"];
    const HEADER_LEN: u64 = 9 + 13 + 19;
    const FIX_1: &str = "B1200005230000N00515000EA001000010401008";
    const FIX_2: &str = "B1200025230000N00515000EA001010010501008";
    const FIX_3: &str = "B1200045230000N00515000EA001020010601008";

    fn header() -> Vec<String> {
        HEADER.iter().map(|s| s.to_string()).collect()
    }

    fn writer(strategy: CommitStrategy) -> (MemoryStorage, SignedAppendWriter<MemoryStorage>) {
        let storage = MemoryStorage::new();
        let writer = SignedAppendWriter::new(
            storage.clone(),
            "20210215/lg000.igc",
            strategy,
            GRecordLayout::Compact,
        );
        (storage, writer)
    }

    fn file_of(storage: &MemoryStorage) -> Vec<u8> {
        storage.contents(Path::new("20210215/lg000.igc")).unwrap()
    }

    fn line_len() -> u64 {
        (FIX_RECORD_LEN + IGC_EOL.len()) as u64
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path_for(Path::new("20210215/lg007.igc")),
            PathBuf::from("20210215/lg007.igc.tmp")
        );
    }

    #[test]
    fn test_header_block_has_no_trailer() {
        for strategy in [CommitStrategy::Seek, CommitStrategy::Atomic] {
            let (storage, mut writer) = writer(strategy);
            writer.write_header(&header()).unwrap();

            assert_eq!(writer.state(), WriterState::HeaderWritten);
            assert_eq!(writer.cursor(), HEADER_LEN);
            assert_eq!(
                file_of(&storage),
                b"AXLK001\r\nHFDTE150221\r\nI023638FXA3940SIU\r\n".to_vec()
            );
        }
    }

    #[test]
    fn test_header_written_once() {
        let (storage, mut writer) = writer(CommitStrategy::Seek);
        writer.write_header(&header()).unwrap();
        writer.append_fix(FIX_1).unwrap();
        let before = file_of(&storage);

        writer.write_header(&header()).unwrap();
        assert_eq!(file_of(&storage), before);
        assert_eq!(writer.state(), WriterState::HasFixes);
    }

    #[test]
    fn test_fix_before_header_is_rejected() {
        let (_, mut writer) = writer(CommitStrategy::Seek);
        assert!(matches!(
            writer.append_fix(FIX_1),
            Err(IgcLoggerError::HeaderNotWritten)
        ));
        assert_eq!(writer.cursor(), 0);
    }

    #[test]
    fn test_file_grows_by_one_line_per_fix() {
        for strategy in [CommitStrategy::Seek, CommitStrategy::Atomic] {
            let (storage, mut writer) = writer(strategy);
            writer.write_header(&header()).unwrap();

            for (n, fix) in [FIX_1, FIX_2, FIX_3].iter().enumerate() {
                writer.append_fix(fix).unwrap();
                let n = n as u64 + 1;
                assert_eq!(writer.cursor(), HEADER_LEN + n * line_len());
                let file = file_of(&storage);
                assert_eq!(
                    file.len() as u64,
                    HEADER_LEN + n * line_len() + 2 * G_LINE_LEN as u64
                );

                let report = verify(&file).unwrap();
                assert_eq!(report.fix_count as u64, n);
            }
        }
    }

    #[test]
    fn test_strategies_produce_identical_files() {
        let (seek_storage, mut seek) = writer(CommitStrategy::Seek);
        let (atomic_storage, mut atomic) = writer(CommitStrategy::Atomic);
        for w in [&mut seek, &mut atomic] {
            w.write_header(&header()).unwrap();
            w.append_fix(FIX_1).unwrap();
            w.append_fixes(&[FIX_2, FIX_3]).unwrap();
        }
        assert_eq!(file_of(&seek_storage), file_of(&atomic_storage));
    }

    #[test]
    fn test_trailer_is_idempotent_and_tracks_fixes() {
        let (storage, mut writer) = writer(CommitStrategy::Seek);
        writer.write_header(&header()).unwrap();
        writer.append_fix(FIX_1).unwrap();
        writer.append_fix(FIX_2).unwrap();

        let after_two = writer.trailer();
        assert_eq!(writer.trailer(), after_two);

        let file = String::from_utf8(file_of(&storage)).unwrap();
        assert!(file.ends_with(&format!("{}\r\n{}\r\n", after_two[0], after_two[1])));

        writer.append_fix(FIX_3).unwrap();
        assert_ne!(writer.trailer(), after_two);
    }

    #[test]
    fn test_open_failure_leaves_state_unchanged() {
        for strategy in [CommitStrategy::Seek, CommitStrategy::Atomic] {
            let (storage, mut writer) = writer(strategy);
            writer.write_header(&header()).unwrap();
            writer.append_fix(FIX_1).unwrap();
            let cursor = writer.cursor();
            let trailer = writer.trailer();

            storage.set_open_error(Some(ErrorKind::PermissionDenied));
            let err = writer.append_fix(FIX_2).unwrap_err();
            assert!(err.is_retryable());
            assert_eq!(writer.cursor(), cursor);
            assert_eq!(writer.trailer(), trailer);

            storage.set_open_error(None);
            writer.append_fix(FIX_2).unwrap();
            assert_eq!(verify(&file_of(&storage)).unwrap().fix_count, 2);
        }
    }

    #[test]
    fn test_seek_failure_leaves_state_unchanged() {
        let (storage, mut writer) = writer(CommitStrategy::Seek);
        writer.write_header(&header()).unwrap();
        writer.append_fix(FIX_1).unwrap();
        let before = file_of(&storage);

        storage.set_seek_error(Some(ErrorKind::Other));
        assert!(writer.append_fix(FIX_2).is_err());
        assert_eq!(file_of(&storage), before);
        assert_eq!(writer.state(), WriterState::HasFixes);
        assert_eq!(writer.cursor(), HEADER_LEN + line_len());
    }

    #[test]
    fn test_header_failure_can_be_retried() {
        let (storage, mut writer) = writer(CommitStrategy::Atomic);
        storage.set_rename_error(Some(ErrorKind::Other));
        assert!(writer.write_header(&header()).is_err());
        assert_eq!(writer.state(), WriterState::Empty);
        assert!(!storage.exists(Path::new("20210215/lg000.igc")));

        storage.set_rename_error(None);
        writer.write_header(&header()).unwrap();
        assert_eq!(writer.state(), WriterState::HeaderWritten);
    }

    #[test]
    fn test_atomic_crash_between_fix_and_trailer_keeps_previous_trailer() {
        let (storage, mut writer) = writer(CommitStrategy::Atomic);
        writer.write_header(&header()).unwrap();
        writer.append_fix(FIX_1).unwrap();
        writer.append_fix(FIX_2).unwrap();
        let before = file_of(&storage);

        // committed block and new fix land, the trailer write fails
        storage.fail_writes_after(2);
        assert!(writer.append_fix(FIX_3).is_err());

        let after = file_of(&storage);
        assert_eq!(after, before);
        let report = verify(&after).unwrap();
        assert_eq!(report.fix_count, 2);
        assert_eq!(writer.cursor(), HEADER_LEN + 2 * line_len());

        storage.clear_write_failure();
        writer.append_fix(FIX_3).unwrap();
        assert_eq!(verify(&file_of(&storage)).unwrap().fix_count, 3);
    }

    #[test]
    fn test_seek_crash_is_repaired_by_next_append() {
        let (storage, mut writer) = writer(CommitStrategy::Seek);
        writer.write_header(&header()).unwrap();
        writer.append_fix(FIX_1).unwrap();
        let trailer = writer.trailer();

        // fix bytes overwrite the old trailer, then the trailer write fails
        storage.fail_writes_after(1);
        assert!(writer.append_fix(FIX_2).is_err());
        assert_eq!(writer.cursor(), HEADER_LEN + line_len());
        assert_eq!(writer.trailer(), trailer);

        storage.clear_write_failure();
        writer.append_fix(FIX_3).unwrap();

        let file = file_of(&storage);
        let report = verify(&file).unwrap();
        assert_eq!(report.fix_count, 2);
        let text = String::from_utf8(file).unwrap();
        assert!(!text.contains(FIX_2));
        assert!(text.contains(FIX_3));
    }

    #[test]
    fn test_per_digest_layout_trailer_length() {
        let storage = MemoryStorage::new();
        let mut writer = SignedAppendWriter::new(
            storage.clone(),
            "20210215/lg000.igc",
            CommitStrategy::Seek,
            GRecordLayout::PerDigest,
        );
        writer.write_header(&header()).unwrap();
        writer.append_fix(FIX_1).unwrap();
        writer.append_fix(FIX_2).unwrap();

        let file = file_of(&storage);
        assert_eq!(file.len() as u64, HEADER_LEN + 2 * line_len() + 8 * G_LINE_LEN as u64);
        assert_eq!(verify(&file).unwrap().layout, Some(GRecordLayout::PerDigest));
    }

    #[test]
    fn test_each_append_reopens_the_file() {
        let (storage, mut writer) = writer(CommitStrategy::Seek);
        writer.write_header(&header()).unwrap();
        writer.append_fix(FIX_1).unwrap();
        writer.append_fix(FIX_2).unwrap();
        assert_eq!(storage.open_count(), 3);
    }

    #[test]
    fn test_writer_with_filesystem() {
        use crate::storage::file_trait::FsStorage;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lg000.igc");
        let mut writer = SignedAppendWriter::new(FsStorage::new(), &path, CommitStrategy::Atomic, GRecordLayout::Compact);
        writer.write_header(&header()).unwrap();
        writer.append_fix(FIX_1).unwrap();

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(verify(&contents).unwrap().fix_count, 1);
        assert!(!dir.path().join("lg000.igc.tmp").exists());
    }
}
