//! # Flight Log Session
//!
//! One IGC file for one flight: allocates the sequence number, creates the
//! dated directory and drives a [`SignedAppendWriter`] from header to the
//! last fix.
//!
//! Files land at `<root>/<YYYYMMDD>/<prefix><NNN>.igc`, `NNN` being the
//! allocated sequence number modulo 1000.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{IgcLoggerError, Result};
use crate::igc::encoder::{encode_fix_record, encode_header_records, encode_manufacturer_record};
use crate::igc::protocol::{FixSample, GRecordLayout, HeaderFields};
use crate::storage::sequence::{CounterStore, SequenceAllocator};
use crate::storage::writer::{CommitStrategy, SignedAppendWriter, WriterState};
use crate::storage::Storage;

/// Default file name prefix
pub const DEFAULT_FILE_PREFIX: &str = "lg";

/// Where and how session files are written
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub root_dir: PathBuf,
    pub file_prefix: String,
    pub commit: CommitStrategy,
    pub layout: GRecordLayout,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            commit: CommitStrategy::default(),
            layout: GRecordLayout::default(),
        }
    }
}

/// What a closed session produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub path: PathBuf,
    pub fix_count: u64,
}

/// `<root>/<YYYYMMDD>`
pub fn day_directory(root: &Path, date: NaiveDate) -> PathBuf {
    root.join(date.format("%Y%m%d").to_string())
}

/// `<prefix><NNN>.igc`
pub fn file_name(prefix: &str, sequence: u32) -> String {
    format!("{}{:03}.igc", prefix, sequence % 1000)
}

/// An open flight log
pub struct FlightLogSession<S: Storage> {
    writer: SignedAppendWriter<S>,
    fields: HeaderFields,
    date: NaiveDate,
    fix_count: u64,
}

impl<S: Storage> FlightLogSession<S> {
    /// Open a session for a flight on `date`.
    ///
    /// Creates the dated directory and allocates a sequence number. No file
    /// is written until the header or the first fix.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryCreateFailed` if the dated directory cannot be
    /// created; no sequence number is used in that case. A counter that
    /// cannot be persisted is logged and ignored.
    pub fn open<C: CounterStore>(
        mut storage: S,
        allocator: &mut SequenceAllocator<C>,
        fields: HeaderFields,
        date: NaiveDate,
        options: &SessionOptions,
    ) -> Result<Self> {
        let dir = day_directory(&options.root_dir, date);
        storage
            .make_directory(&dir)
            .map_err(|source| IgcLoggerError::DirectoryCreateFailed {
                path: dir.clone(),
                source,
            })?;

        // Only a usable directory consumes a sequence number
        let allocation = allocator.next();
        if let Some(err) = &allocation.persist_error {
            warn!("Continuing with sequence {}: {}", allocation.value, err);
        }

        let path = dir.join(file_name(&options.file_prefix, allocation.value));
        info!("Opened flight log {}", path.display());

        Ok(Self {
            writer: SignedAppendWriter::new(storage, path, options.commit, options.layout),
            fields,
            date,
            fix_count: 0,
        })
    }

    pub fn path(&self) -> &Path {
        self.writer.path()
    }

    pub fn fix_count(&self) -> u64 {
        self.fix_count
    }

    pub fn writer(&self) -> &SignedAppendWriter<S> {
        &self.writer
    }

    /// Write the A record and header block. A no-op once written.
    pub fn write_header(&mut self, fields: &HeaderFields, date: NaiveDate) -> Result<()> {
        if self.writer.state() != WriterState::Empty {
            return Ok(());
        }
        let mut records = vec![encode_manufacturer_record()];
        records.extend(encode_header_records(fields, date));
        self.writer.write_header(&records)
    }

    /// Append one fix, writing the header first if needed
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the header or the fix could not be
    /// committed; the fix counter is unchanged.
    pub fn write_fix(&mut self, sample: &FixSample) -> Result<()> {
        if self.writer.state() == WriterState::Empty {
            let fields = self.fields.clone();
            self.write_header(&fields, self.date)?;
        }

        let record = encode_fix_record(sample);
        debug!("B record: {}", record);
        self.writer.append_fix(&record)?;
        self.fix_count += 1;
        Ok(())
    }

    /// Finish the flight. The file already ends with a valid trailer.
    pub fn close(self) -> SessionSummary {
        let summary = SessionSummary {
            path: self.writer.path().to_path_buf(),
            fix_count: self.fix_count,
        };
        info!(
            "Closed flight log {} with {} fix record(s)",
            summary.path.display(),
            summary.fix_count
        );
        summary
    }
}
