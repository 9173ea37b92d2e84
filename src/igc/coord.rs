//! # Coordinate Encoder
//!
//! Converts decimal degrees into the sexagesimal `DDMMmmm` / `DDDMMmmm`
//! text used in B records. The hemisphere letter is chosen by the caller
//! from the sign of the raw coordinate; the sign of `degrees` is ignored.
//!
//! Range is not validated: out-of-range input produces a numerically
//! meaningless (but still digit-only) string.

use super::protocol::Axis;

/// Split decimal degrees into `(degrees, minutes, thousandths of a minute)`.
///
/// Degrees truncate toward zero, thousandths are rounded. A rounding carry
/// is propagated into minutes and degrees so no field overflows its width.
pub fn to_sexagesimal(degrees: f64) -> (u32, u32, u32) {
    let abs = if degrees.is_finite() { degrees.abs() } else { 0.0 };

    let mut deg = abs.trunc() as u32;
    let total_minutes = (abs - abs.trunc()) * 60.0;
    let mut minutes = total_minutes.trunc() as u32;
    let mut thousandths = ((total_minutes - total_minutes.trunc()) * 1000.0).round() as u32;

    if thousandths >= 1000 {
        thousandths -= 1000;
        minutes += 1;
    }
    if minutes >= 60 {
        minutes -= 60;
        deg += 1;
    }

    (deg, minutes, thousandths)
}

/// Encode a coordinate with an explicit hemisphere letter.
///
/// Degrees wider than the axis allows keep only their low digits, so the
/// result is always [`Axis::width`] bytes.
///
/// # Examples
///
/// ```
/// use igc_logger::igc::coord::encode_coordinate;
/// use igc_logger::igc::protocol::Axis;
///
/// assert_eq!(encode_coordinate(54.11868, Axis::Latitude, 'N'), "5407121N");
/// assert_eq!(encode_coordinate(-2.82237, Axis::Longitude, 'W'), "00249342W");
/// ```
pub fn encode_coordinate(degrees: f64, axis: Axis, hemisphere: char) -> String {
    let (deg, minutes, thousandths) = to_sexagesimal(degrees);
    match axis {
        Axis::Latitude => format!("{:02}{:02}{:03}{}", deg % 100, minutes, thousandths, hemisphere),
        Axis::Longitude => format!("{:03}{:02}{:03}{}", deg % 1000, minutes, thousandths, hemisphere),
    }
}

/// Encode a signed coordinate, deriving the hemisphere from its sign
pub fn encode_signed(degrees: f64, axis: Axis) -> String {
    let negative = degrees.is_sign_negative() && degrees != 0.0;
    encode_coordinate(degrees, axis, axis.hemisphere(negative))
}

/// Placeholder for a missing coordinate: zeros for the full field width
pub fn missing(axis: Axis) -> String {
    "0".repeat(axis.width())
}
