//! # Flight Recorder
//!
//! Turns a stream of receiver samples into one signed IGC file.
//!
//! Per sample:
//! 1. Open the session once the sample carries both a date and a time
//! 2. Feed the pressure altitude to the liftoff detector
//! 3. When in flight with a valid position, log a fix every
//!    `log_interval_s` seconds of sample time
//!
//! A failed append is logged and the recorder carries on with the next
//! sample; the file on storage still ends with the last good trailer.

pub mod liftoff;
pub mod replay;
pub mod session;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::igc::protocol::HeaderFields;
use crate::storage::sequence::{CounterStore, SequenceAllocator};
use crate::storage::Storage;
use liftoff::LiftoffDetector;
use replay::SampleLine;
use session::{FlightLogSession, SessionOptions, SessionSummary};

const MS_PER_DAY: u64 = 86_400_000;

/// Everything the recorder needs besides storage and the counter
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    pub fields: HeaderFields,
    pub session: SessionOptions,
    pub log_interval_s: u32,
    pub liftoff_detection: bool,
    pub liftoff_threshold: f32,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            fields: HeaderFields::default(),
            session: SessionOptions::default(),
            log_interval_s: 2,
            liftoff_detection: true,
            liftoff_threshold: liftoff::DEFAULT_LIFTOFF_THRESHOLD,
        }
    }
}

/// What happened to one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// No date/time yet, or not in flight
    Waiting,
    /// In flight but inside the log interval, or without a position
    Skipped,
    /// Fix committed
    Logged,
    /// Append failed; the sample is dropped
    Failed,
}

/// Sample counters for the end-of-run report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub samples: u64,
    pub logged: u64,
    pub failed: u64,
}

/// Sample-driven recorder owning at most one flight log session
pub struct FlightRecorder<S: Storage, C: CounterStore> {
    /// Handle cloned into the session once a dated sample arrives
    storage: S,
    allocator: SequenceAllocator<C>,
    settings: RecorderSettings,
    detector: LiftoffDetector,
    session: Option<FlightLogSession<S>>,
    last_logged_ms: Option<u64>,
    clock: SampleClock,
    stats: RecorderStats,
}

impl<S: Storage + Clone, C: CounterStore> FlightRecorder<S, C> {
    pub fn new(storage: S, allocator: SequenceAllocator<C>, settings: RecorderSettings) -> Self {
        let detector = LiftoffDetector::new(settings.liftoff_detection, settings.liftoff_threshold);
        if detector.in_flight() {
            info!("Liftoff detection disabled, logging from the first fix");
        }
        Self {
            storage,
            allocator,
            settings,
            detector,
            session: None,
            last_logged_ms: None,
            clock: SampleClock::default(),
            stats: RecorderStats::default(),
        }
    }

    pub fn session(&self) -> Option<&FlightLogSession<S>> {
        self.session.as_ref()
    }

    pub fn in_flight(&self) -> bool {
        self.detector.in_flight()
    }

    pub fn stats(&self) -> RecorderStats {
        self.stats
    }

    /// Process one sample
    ///
    /// # Errors
    ///
    /// Only session opening errors (`DirectoryCreateFailed`) are returned;
    /// the next dated sample tries to open the session again. Append
    /// failures are reported as [`SampleOutcome::Failed`].
    pub fn process(&mut self, sample: &SampleLine) -> Result<SampleOutcome> {
        self.stats.samples += 1;
        let fix = &sample.fix;

        let Some(time) = fix.time else {
            return Ok(SampleOutcome::Waiting);
        };
        let now_ms = self.clock.advance(time);

        if self.session.is_none() {
            if let Some(date) = sample.date {
                let session = FlightLogSession::open(
                    self.storage.clone(),
                    &mut self.allocator,
                    self.settings.fields.clone(),
                    date,
                    &self.settings.session,
                )?;
                self.session = Some(session);
            }
        }

        if let Some(altitude) = fix.pressure_altitude {
            self.detector.update(altitude as f32, now_ms, fix.has_position());
        }

        let Some(session) = self.session.as_mut() else {
            return Ok(SampleOutcome::Waiting);
        };
        if !self.detector.in_flight() {
            return Ok(SampleOutcome::Waiting);
        }
        if !fix.has_position() {
            return Ok(SampleOutcome::Skipped);
        }

        let interval_ms = u64::from(self.settings.log_interval_s) * 1000;
        if let Some(last) = self.last_logged_ms {
            if now_ms.saturating_sub(last) < interval_ms {
                return Ok(SampleOutcome::Skipped);
            }
        }

        match session.write_fix(fix) {
            Ok(()) => {
                self.last_logged_ms = Some(now_ms);
                self.stats.logged += 1;
                Ok(SampleOutcome::Logged)
            }
            Err(e) => {
                warn!("Dropping fix at {}: {}", time, e);
                self.stats.failed += 1;
                Ok(SampleOutcome::Failed)
            }
        }
    }

    /// Close the session, if one was opened
    pub fn finish(self) -> Option<SessionSummary> {
        debug!(
            "Recorder finished: {} samples, {} logged, {} failed",
            self.stats.samples, self.stats.logged, self.stats.failed
        );
        self.session.map(FlightLogSession::close)
    }
}

/// Milliseconds of sample time, continuous across UTC midnight
#[derive(Debug, Default)]
struct SampleClock {
    last_of_day: Option<u64>,
    day_offset: u64,
}

impl SampleClock {
    fn advance(&mut self, time: chrono::NaiveTime) -> u64 {
        use chrono::Timelike;

        let of_day = u64::from(time.num_seconds_from_midnight()) * 1000 + u64::from(time.nanosecond() / 1_000_000);
        if let Some(last) = self.last_of_day {
            if of_day < last {
                self.day_offset += MS_PER_DAY;
            }
        }
        self.last_of_day = Some(of_day);
        self.day_offset + of_day
    }
}
