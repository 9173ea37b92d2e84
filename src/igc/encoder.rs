//! # IGC Record Formatter
//!
//! Builds A, H, I, B and G records as text. Records are returned without
//! their `\r\n` terminator; the writer adds it when the record hits storage.

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use super::coord;
use super::digest::to_hex;
use super::protocol::*;

/// Return `c` if it may appear in IGC text, a space otherwise.
///
/// Control characters, non-ASCII and the reserved `$ * , ! \ ^ ~` are
/// replaced.
pub fn clean_igc_char(c: char) -> char {
    match c {
        '$' | '*' | ',' | '!' | '\\' | '^' | '~' => ' ',
        ' '..='}' => c,
        _ => ' ',
    }
}

/// Apply [`clean_igc_char`] to every character of a record
pub fn sanitize(text: &str) -> String {
    text.chars().map(clean_igc_char).collect()
}

/// Cut `text` to at most `max` characters.
///
/// Only ever called on sanitized (ASCII) text, so characters are bytes.
fn bounded(text: String, max: usize, what: &str) -> String {
    if text.len() <= max {
        return text;
    }
    debug!("Truncating {} from {} to {} characters", what, text.len(), max);
    let mut text = text;
    text.truncate(max);
    text
}

/// Header line `prefix` + caller value, with field and line limits applied
fn header_line(prefix: &str, value: &str, max_value_len: usize, what: &str) -> String {
    let value = bounded(sanitize(value), max_value_len, what);
    bounded(format!("{}{}", prefix, value), MAX_HEADER_LINE_LEN, what)
}

/// Encode the manufacturer (A) record
pub fn encode_manufacturer_record() -> String {
    MANUFACTURER_RECORD.to_string()
}

/// Encode the H records and the trailing I record, in file order
///
/// # Arguments
///
/// * `fields` - Pilot and equipment metadata
/// * `date` - UTC date of the flight
///
/// # Returns
///
/// * `Vec<String>` - Header lines, each passed through [`sanitize`];
///   position in the vector is significant
pub fn encode_header_records(fields: &HeaderFields, date: NaiveDate) -> Vec<String> {
    let lines = [
        format!("HFDTE{:02}{:02}{:02}", date.day(), date.month(), date.year().rem_euclid(100)),
        "HFFXA035".to_string(),
        header_line("HFPLTPILOTINCHARGE: ", &fields.pilot, PILOT_MAX_LEN, "pilot"),
        header_line("HFCM2CREW2: ", &fields.copilot, COPILOT_MAX_LEN, "co-pilot"),
        header_line("HFGTYGLIDERTYPE: ", &fields.glider_type, GLIDER_TYPE_MAX_LEN, "glider type"),
        header_line("HFGIDGLIDERID: ", &fields.registration, REGISTRATION_MAX_LEN, "registration"),
        "HFDTM100GPSDATUM: WGS-1984".to_string(),
        "HFRHWHARDWAREVERSION: 2021".to_string(),
        "HFFTYFRTYPE:Simple Arduino Logger".to_string(),
        header_line("HFGPSRECEIVER: ", &fields.gps_receiver, GPS_RECEIVER_MAX_LEN, "GPS receiver"),
        "HFALGALTGPS:GEO".to_string(),
        "HFALPALTPRESSURE:ISA".to_string(),
        "HFPRSPRESSALTSENSOR: Bosch Sensortec,BMP280,max9000m".to_string(),
        header_line("HFCIDCOMPETITIONID: ", &fields.competition_id, COMPETITION_ID_MAX_LEN, "competition id"),
        header_line(
            "HFCCLCOMPETITIONCLASS: ",
            &fields.competition_class,
            COMPETITION_CLASS_MAX_LEN,
            "competition class",
        ),
        FIX_EXTENSION_RECORD.to_string(),
    ];
    lines.iter().map(|line| sanitize(line)).collect()
}

/// Five-character altitude, sign-aware zero padded (`00123`, `-0012`)
fn encode_altitude(meters: Option<i32>) -> String {
    match meters {
        Some(m) => format!("{:05}", m.clamp(-9_999, 99_999)),
        None => "00000".to_string(),
    }
}

/// Encode a fix (B) record, always [`FIX_RECORD_LEN`] characters
///
/// # Arguments
///
/// * `sample` - Position/altitude sample; missing parts encode as zeros
///
/// # Examples
///
/// ```
/// use chrono::NaiveTime;
/// use igc_logger::igc::encoder::encode_fix_record;
/// use igc_logger::igc::protocol::FixSample;
///
/// let sample = FixSample {
///     time: NaiveTime::from_hms_opt(12, 0, 5),
///     latitude: Some(54.11868),
///     longitude: Some(-2.82237),
///     pressure_altitude: Some(100),
///     gps_altitude: Some(104),
///     hdop: Some(1.0),
///     satellites: Some(8),
/// };
/// assert_eq!(encode_fix_record(&sample), "B1200055407121N00249342WA001000010401008");
/// ```
pub fn encode_fix_record(sample: &FixSample) -> String {
    let mut record = String::with_capacity(FIX_RECORD_LEN);
    record.push('B');

    match sample.hms() {
        Some((h, m, s)) => record.push_str(&format!("{:02}{:02}{:02}", h, m, s)),
        None => record.push_str("000000"),
    }

    match sample.latitude {
        Some(lat) => record.push_str(&coord::encode_signed(lat, Axis::Latitude)),
        None => record.push_str(&coord::missing(Axis::Latitude)),
    }
    match sample.longitude {
        Some(lng) => record.push_str(&coord::encode_signed(lng, Axis::Longitude)),
        None => record.push_str(&coord::missing(Axis::Longitude)),
    }

    let valid = sample.has_position() && sample.gps_altitude.is_some();
    record.push(if valid { 'A' } else { 'V' });

    record.push_str(&encode_altitude(sample.pressure_altitude));
    record.push_str(&encode_altitude(sample.gps_altitude));
    record.push_str(&format!("{:03}", sample.fix_accuracy()));
    record.push_str(&format!("{:02}", sample.satellites.unwrap_or(0).min(99)));

    debug_assert_eq!(record.len(), FIX_RECORD_LEN);
    record
}

/// Encode the G records for a digest snapshot
///
/// # Arguments
///
/// * `digests` - Finalized copies of the four digest streams
/// * `layout` - Trailer layout
///
/// # Returns
///
/// * `Vec<String>` - `G` + 16 hex characters per line
pub fn encode_g_records(digests: &[[u8; 16]; 4], layout: GRecordLayout) -> Vec<String> {
    let hex: Vec<String> = match layout {
        GRecordLayout::Compact => {
            let mut folded = [0u8; 16];
            for digest in digests {
                for (acc, byte) in folded.iter_mut().zip(digest) {
                    *acc ^= byte;
                }
            }
            vec![to_hex(&folded)]
        }
        GRecordLayout::PerDigest => digests.iter().map(|d| to_hex(d)).collect(),
    };

    hex.iter()
        .flat_map(|h| [&h[..G_RECORD_HEX_LEN], &h[G_RECORD_HEX_LEN..]])
        .map(|half| format!("G{}", half))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::igc::digest::DigestBank;
    use chrono::NaiveTime;

    fn full_sample() -> FixSample {
        FixSample {
            time: NaiveTime::from_hms_opt(9, 5, 7),
            latitude: Some(52.5),
            longitude: Some(5.25),
            pressure_altitude: Some(100),
            gps_altitude: Some(110),
            hdop: Some(0.9),
            satellites: Some(11),
        }
    }

    #[test]
    fn test_fix_record_fields() {
        let record = encode_fix_record(&full_sample());
        assert_eq!(record.len(), FIX_RECORD_LEN);
        assert_eq!(&record[0..1], "B");
        assert_eq!(&record[1..7], "090507");
        assert_eq!(&record[7..15], "5230000N");
        assert_eq!(&record[15..24], "00515000E");
        assert_eq!(&record[24..25], "A");
        assert_eq!(&record[25..30], "00100");
        assert_eq!(&record[30..35], "00110");
        assert_eq!(&record[35..38], "009"); // 0.9 * 10.2 = 9.18
        assert_eq!(&record[38..40], "11");
    }

    #[test]
    fn test_fix_record_missing_components_are_zero_filled() {
        let record = encode_fix_record(&FixSample::default());
        assert_eq!(record, "B00000000000000000000000V000000000000000");
        assert_eq!(record.len(), FIX_RECORD_LEN);
    }

    #[test]
    fn test_fix_record_without_gps_altitude_is_invalid() {
        let mut sample = full_sample();
        sample.gps_altitude = None;
        let record = encode_fix_record(&sample);
        assert_eq!(&record[24..25], "V");
        assert_eq!(&record[30..35], "00000");
    }

    #[test]
    fn test_fix_record_negative_and_huge_altitudes() {
        let mut sample = full_sample();
        sample.pressure_altitude = Some(-12);
        sample.gps_altitude = Some(123_456);
        let record = encode_fix_record(&sample);
        assert_eq!(&record[25..30], "-0012");
        assert_eq!(&record[30..35], "99999");
        assert_eq!(record.len(), FIX_RECORD_LEN);

        sample.pressure_altitude = Some(-50_000);
        assert_eq!(&encode_fix_record(&sample)[25..30], "-9999");
    }

    #[test]
    fn test_fix_record_clamps_satellites() {
        let mut sample = full_sample();
        sample.satellites = Some(250);
        assert_eq!(&encode_fix_record(&sample)[38..40], "99");
    }

    #[test]
    fn test_southern_western_fix() {
        let mut sample = full_sample();
        sample.latitude = Some(-33.5);
        sample.longitude = Some(-70.75);
        let record = encode_fix_record(&sample);
        assert_eq!(&record[7..15], "3330000S");
        assert_eq!(&record[15..24], "07045000W");
    }

    #[test]
    fn test_header_order_and_values() {
        let fields = HeaderFields {
            pilot: "A B".to_string(),
            copilot: "not recorded".to_string(),
            glider_type: "Duo Discus".to_string(),
            registration: "PH-1035".to_string(),
            competition_id: "SAL".to_string(),
            competition_class: "Two Seater".to_string(),
            gps_receiver: "Beitian BN-880Q".to_string(),
        };
        let date = NaiveDate::from_ymd_opt(2021, 2, 15).unwrap();
        let lines = encode_header_records(&fields, date);

        assert_eq!(
            lines,
            vec![
                "HFDTE150221",
                "HFFXA035",
                "HFPLTPILOTINCHARGE: A B",
                "HFCM2CREW2: not recorded",
                "HFGTYGLIDERTYPE: Duo Discus",
                "HFGIDGLIDERID: PH-1035",
                "HFDTM100GPSDATUM: WGS-1984",
                "HFRHWHARDWAREVERSION: 2021",
                "HFFTYFRTYPE:Simple Arduino Logger",
                "HFGPSRECEIVER: Beitian BN-880Q",
                "HFALGALTGPS:GEO",
                "HFALPALTPRESSURE:ISA",
                "HFPRSPRESSALTSENSOR: Bosch Sensortec BMP280 max9000m",
                "HFCIDCOMPETITIONID: SAL",
                "HFCCLCOMPETITIONCLASS: Two Seater",
                "I023638FXA3940SIU",
            ]
        );
    }

    #[test]
    fn test_header_field_truncation() {
        let fields = HeaderFields {
            registration: "PH-1035-EXTRA-LONG".to_string(),
            pilot: "x".repeat(200),
            ..Default::default()
        };
        let date = NaiveDate::from_ymd_opt(2021, 2, 15).unwrap();
        let lines = encode_header_records(&fields, date);

        assert_eq!(lines[5], "HFGIDGLIDERID: PH-1035-E");
        assert_eq!(lines[2].len(), MAX_HEADER_LINE_LEN);
        assert!(lines[2].starts_with("HFPLTPILOTINCHARGE: xxx"));
    }

    #[test]
    fn test_header_values_are_sanitized() {
        let fields = HeaderFields {
            pilot: "Jö$e\tDoe".to_string(),
            ..Default::default()
        };
        let date = NaiveDate::from_ymd_opt(2021, 2, 15).unwrap();
        let lines = encode_header_records(&fields, date);
        assert_eq!(lines[2], "HFPLTPILOTINCHARGE: J  e Doe");
    }

    #[test]
    fn test_constant_header_lines_are_clean() {
        let date = NaiveDate::from_ymd_opt(2021, 2, 15).unwrap();
        for line in encode_header_records(&HeaderFields::default(), date) {
            assert_eq!(line, sanitize(&line));
            assert!(!line.contains(','), "reserved character in {:?}", line);
        }
    }

    #[test]
    fn test_clean_igc_char() {
        assert_eq!(clean_igc_char('A'), 'A');
        assert_eq!(clean_igc_char(' '), ' ');
        assert_eq!(clean_igc_char('}'), '}');
        assert_eq!(clean_igc_char('~'), ' ');
        assert_eq!(clean_igc_char(','), ' ');
        assert_eq!(clean_igc_char('\r'), ' ');
        assert_eq!(clean_igc_char('é'), ' ');
    }

    #[test]
    fn test_g_records_compact() {
        let mut bank = DigestBank::new();
        bank.update(b"B0905075230000N00515000EA001000011000911");
        let lines = encode_g_records(&bank.snapshot(), GRecordLayout::Compact);

        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert_eq!(line.len(), 1 + G_RECORD_HEX_LEN);
            assert!(line.starts_with('G'));
            assert!(line[1..].bytes().all(|b| b.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_g_records_per_digest_split_each_stream() {
        let bank = DigestBank::new();
        let digests = bank.snapshot();
        let lines = encode_g_records(&digests, GRecordLayout::PerDigest);

        assert_eq!(lines.len(), 8);
        let first = to_hex(&digests[0]);
        assert_eq!(lines[0], format!("G{}", &first[..16]));
        assert_eq!(lines[1], format!("G{}", &first[16..]));
    }

    #[test]
    fn test_compact_is_xor_of_streams() {
        let digests = [[0x01u8; 16], [0x02u8; 16], [0x04u8; 16], [0x08u8; 16]];
        let lines = encode_g_records(&digests, GRecordLayout::Compact);
        assert_eq!(lines, vec!["G0f0f0f0f0f0f0f0f", "G0f0f0f0f0f0f0f0f"]);
    }
}
