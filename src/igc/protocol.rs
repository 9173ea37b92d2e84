//! # IGC Record Constants and Types
//!
//! Core format definitions for the IGC flight recorder file.

use chrono::{NaiveTime, Timelike};
use serde::Deserialize;

/// Line terminator for every record on disk
pub const IGC_EOL: &[u8] = b"\r\n";

/// Manufacturer (A) record: uncertified manufacturer `XLK`, serial `001`
pub const MANUFACTURER_RECORD: &str = "AXLK001";

/// Longest header line the formatter emits (80-byte line buffer minus NUL)
pub const MAX_HEADER_LINE_LEN: usize = 79;

/// Core B record: tag + time + lat + lng + validity + pressure alt + GPS alt
pub const FIX_RECORD_CORE_LEN: usize = 35;

/// Full B record including the FXA (36-38) and SIU (39-40) extensions
pub const FIX_RECORD_LEN: usize = 40;

/// Extension declaration matching [`FIX_RECORD_LEN`]
pub const FIX_EXTENSION_RECORD: &str = "I023638FXA3940SIU";

/// Encoded latitude width (`DDMMmmmH`)
pub const LATITUDE_WIDTH: usize = 8;

/// Encoded longitude width (`DDDMMmmmH`)
pub const LONGITUDE_WIDTH: usize = 9;

/// Hex characters per G line
pub const G_RECORD_HEX_LEN: usize = 16;

/// Bytes of one G line on disk: `G` + hex + CRLF
pub const G_LINE_LEN: usize = 1 + G_RECORD_HEX_LEN + 2;

/// Factor turning HDOP into a rough 2-sigma horizontal error in meters
pub const HDOP_TO_FXA: f32 = 5.1 * 2.0;

/// Per-field limits for caller-supplied header text
pub const PILOT_MAX_LEN: usize = 79;
pub const COPILOT_MAX_LEN: usize = 79;
pub const GLIDER_TYPE_MAX_LEN: usize = 39;
pub const REGISTRATION_MAX_LEN: usize = 9;
pub const COMPETITION_ID_MAX_LEN: usize = 9;
pub const COMPETITION_CLASS_MAX_LEN: usize = 19;
pub const GPS_RECEIVER_MAX_LEN: usize = 49;

/// Coordinate axis selector for the coordinate encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    /// Encoded width including the hemisphere letter
    pub fn width(self) -> usize {
        match self {
            Axis::Latitude => LATITUDE_WIDTH,
            Axis::Longitude => LONGITUDE_WIDTH,
        }
    }

    /// Hemisphere letter for a signed coordinate on this axis
    pub fn hemisphere(self, negative: bool) -> char {
        match (self, negative) {
            (Axis::Latitude, false) => 'N',
            (Axis::Latitude, true) => 'S',
            (Axis::Longitude, false) => 'E',
            (Axis::Longitude, true) => 'W',
        }
    }
}

/// Layout of the trailing G records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GRecordLayout {
    /// Two lines: the four digests XOR-folded into one 128-bit value
    #[default]
    Compact,
    /// Eight lines: two per digest stream (LK8000 layout)
    PerDigest,
}

impl GRecordLayout {
    /// Number of G lines in the trailer
    pub fn line_count(self) -> usize {
        match self {
            GRecordLayout::Compact => 2,
            GRecordLayout::PerDigest => 8,
        }
    }

    /// Trailer size on disk in bytes
    pub fn trailer_len(self) -> usize {
        self.line_count() * G_LINE_LEN
    }

    /// Layout that produces `lines` G lines, if any
    pub fn from_line_count(lines: usize) -> Option<Self> {
        match lines {
            2 => Some(GRecordLayout::Compact),
            8 => Some(GRecordLayout::PerDigest),
            _ => None,
        }
    }
}

/// One position/altitude sample, consumed immediately by the formatter.
///
/// Every component is optional; a missing component is encoded as zeros
/// for its full field width.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct FixSample {
    /// UTC time of day
    #[serde(default)]
    pub time: Option<NaiveTime>,

    /// Decimal degrees, negative for south
    #[serde(default, rename = "lat")]
    pub latitude: Option<f64>,

    /// Decimal degrees, negative for west
    #[serde(default, rename = "lon")]
    pub longitude: Option<f64>,

    /// Barometric altitude in meters (ISA)
    #[serde(default)]
    pub pressure_altitude: Option<i32>,

    /// GNSS altitude in meters
    #[serde(default)]
    pub gps_altitude: Option<i32>,

    /// Horizontal dilution of precision
    #[serde(default)]
    pub hdop: Option<f32>,

    /// Satellites in use
    #[serde(default)]
    pub satellites: Option<u32>,
}

impl FixSample {
    /// True when both coordinates are present
    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Time of day as `(hour, minute, second)`
    pub fn hms(&self) -> Option<(u32, u32, u32)> {
        self.time.map(|t| (t.hour(), t.minute(), t.second()))
    }

    /// Fix accuracy in meters derived from HDOP, clamped to `0..=999`.
    ///
    /// Negative, NaN and missing HDOP values all map to 0.
    pub fn fix_accuracy(&self) -> u16 {
        let Some(hdop) = self.hdop else {
            return 0;
        };
        let fxa = hdop * HDOP_TO_FXA;
        if !fxa.is_finite() {
            return if fxa == f32::INFINITY { 999 } else { 0 };
        }
        fxa.clamp(0.0, 999.0) as u16
    }
}

/// Pilot and equipment metadata written once per flight in the H records
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderFields {
    pub pilot: String,
    pub copilot: String,
    pub glider_type: String,
    pub registration: String,
    pub competition_id: String,
    pub competition_class: String,
    pub gps_receiver: String,
}
