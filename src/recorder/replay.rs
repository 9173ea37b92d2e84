//! JSON Lines sample source
//!
//! Each line is one receiver sample; every field is optional:
//!
//! ```text
//! {"date":"2021-02-15","time":"12:00:01","lat":52.1,"lon":5.2,"pressure_altitude":100,"gps_altitude":104,"hdop":0.9,"satellites":8}
//! ```

use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, warn};

use crate::error::Result;
use crate::igc::protocol::FixSample;

/// One replayed sample: the fix plus the UTC date it was taken on
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct SampleLine {
    #[serde(default)]
    pub date: Option<NaiveDate>,

    #[serde(flatten)]
    pub fix: FixSample,
}

/// Reads [`SampleLine`]s from any async line source
pub struct SampleReader<R> {
    lines: Lines<R>,
    line_number: usize,
}

impl SampleReader<BufReader<File>> {
    /// Open a JSON Lines file
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).await?;
        debug!("Replaying samples from {}", path.as_ref().display());
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin> SampleReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }

    /// Line number of the last line read, 1-based
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Next sample, `None` at end of input.
    ///
    /// Blank lines are skipped. Lines that fail to parse are logged and
    /// skipped; only read errors end the stream with an error.
    pub async fn next_sample(&mut self) -> Result<Option<SampleLine>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_number += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<SampleLine>(line) {
                Ok(sample) => return Ok(Some(sample)),
                Err(e) => warn!("Skipping sample on line {}: {}", self.line_number, e),
            }
        }
        Ok(None)
    }
}
