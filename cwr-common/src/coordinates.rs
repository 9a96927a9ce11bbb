//! Degrees-decimal-minutes (DDM) coordinate conversion
//!
//! Pure functions shared by every component that touches coordinate text:
//! - [`to_decimal`]: `"N 49° 45.558 E 005° 58.554"` → `(49.7593, 5.9759)`
//! - [`to_ddm`]: decimal degrees → canonical DDM text
//! - [`split_ddm`]: DDM text → separate latitude / longitude halves
//! - [`find_ddm`]: first DDM pair embedded in free text
//!
//! None of these functions panic on malformed input; they return `None`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Latitude half: hemisphere, degrees, minutes. Degree marks and minute quotes optional.
const LAT_PART: &str = r"([NS])\s*(\d{1,2})\s*[°º]?\s*(\d{1,2}(?:[.,]\d+)?)\s*['′’]?";

/// Longitude half: hemisphere, degrees, minutes.
const LON_PART: &str = r"([EW])\s*(\d{1,3})\s*[°º]?\s*(\d{1,2}(?:[.,]\d+)?)\s*['′’]?";

/// Whole-string DDM pair (surrounding whitespace and one optional separator tolerated)
static DDM_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^\s*{LAT_PART}\s*[,;/]?\s*{LON_PART}\s*$"))
        .expect("DDM pair pattern is valid")
});

/// DDM pair embedded in text. Minutes must carry decimals to keep false positives down.
static DDM_SCAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b([NS])\s*(\d{1,2})\s*[°º]?\s*(\d{1,2}[.,]\d+)\s*['′’]?\s*[,;/]?\s*([EW])\s*(\d{1,3})\s*[°º]?\s*(\d{1,2}[.,]\d+)\s*['′’]?",
    )
    .expect("DDM scan pattern is valid")
});

/// Decimal-degree coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecimalCoordinates {
    /// Latitude in degrees, positive north
    pub lat: f64,
    /// Longitude in degrees, positive east
    pub lon: f64,
}

impl DecimalCoordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when both values are finite and inside the valid latitude/longitude ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Canonical DDM text for this pair
    pub fn to_ddm(&self) -> String {
        to_ddm(self.lat, self.lon)
    }
}

/// Parse a DDM pair into decimal degrees
///
/// Returns `None` when the text does not match, when minutes are not below 60,
/// or when the result falls outside the valid latitude/longitude ranges.
///
/// # Examples
/// ```
/// use cwr_common::coordinates::to_decimal;
///
/// let coords = to_decimal("N 49° 45.558 E 005° 58.554").unwrap();
/// assert!((coords.lat - 49.7593).abs() < 1e-4);
/// assert!((coords.lon - 5.9759).abs() < 1e-4);
/// assert!(to_decimal("not a coordinate").is_none());
/// ```
pub fn to_decimal(ddm: &str) -> Option<DecimalCoordinates> {
    let caps = DDM_PAIR.captures(ddm)?;
    decimal_from_captures(&caps)
}

/// Format decimal degrees as canonical DDM text
///
/// Minutes are rounded to 3 decimals and zero-padded to two integer digits;
/// latitude degrees use two digits and longitude degrees three.
///
/// # Examples
/// ```
/// use cwr_common::coordinates::to_ddm;
///
/// assert_eq!(to_ddm(49.7593, 5.9759), "N 49° 45.558 E 005° 58.554");
/// assert_eq!(to_ddm(-33.8688, -70.1355), "S 33° 52.128 W 070° 08.130");
/// ```
pub fn to_ddm(lat: f64, lon: f64) -> String {
    let lat_hemisphere = if lat >= 0.0 { 'N' } else { 'S' };
    let lon_hemisphere = if lon >= 0.0 { 'E' } else { 'W' };
    let (lat_degrees, lat_minutes) = degrees_and_minutes(lat);
    let (lon_degrees, lon_minutes) = degrees_and_minutes(lon);

    format!(
        "{} {:02}° {:06.3} {} {:03}° {:06.3}",
        lat_hemisphere, lat_degrees, lat_minutes, lon_hemisphere, lon_degrees, lon_minutes
    )
}

/// Split DDM text into its latitude and longitude halves
///
/// The halves are normalized (`"N 49° 45.558"`, `"E 005° 58.554"`) so backends
/// receive one consistent shape regardless of how the plugin spelled it.
pub fn split_ddm(ddm: &str) -> Option<(String, String)> {
    let caps = DDM_PAIR.captures(ddm)?;
    decimal_from_captures(&caps)?;
    Some(halves_from_captures(&caps))
}

/// Find the first DDM pair embedded in free text
///
/// Returns the normalized DDM text of the first match whose numbers are valid.
pub fn find_ddm(text: &str) -> Option<String> {
    DDM_SCAN
        .captures_iter(text)
        .find(|caps| decimal_from_captures(caps).is_some())
        .map(|caps| {
            let (lat, lon) = halves_from_captures(&caps);
            format!("{} {}", lat, lon)
        })
}

fn decimal_from_captures(caps: &Captures<'_>) -> Option<DecimalCoordinates> {
    let lat = hemisphere_value(&caps[1], &caps[2], &caps[3])?;
    let lon = hemisphere_value(&caps[4], &caps[5], &caps[6])?;
    let coords = DecimalCoordinates::new(lat, lon);
    coords.is_valid().then_some(coords)
}

fn hemisphere_value(hemisphere: &str, degrees: &str, minutes: &str) -> Option<f64> {
    let degrees: f64 = degrees.parse().ok()?;
    let minutes: f64 = minutes.replace(',', ".").parse().ok()?;
    if !(0.0..60.0).contains(&minutes) {
        return None;
    }

    let value = degrees + minutes / 60.0;
    match hemisphere {
        "S" | "s" | "W" | "w" => Some(-value),
        _ => Some(value),
    }
}

fn halves_from_captures(caps: &Captures<'_>) -> (String, String) {
    let lat = format!(
        "{} {:0>2}° {}",
        caps[1].to_ascii_uppercase(),
        trim_degrees(&caps[2]),
        normalize_minutes(&caps[3])
    );
    let lon = format!(
        "{} {:0>3}° {}",
        caps[4].to_ascii_uppercase(),
        trim_degrees(&caps[5]),
        normalize_minutes(&caps[6])
    );
    (lat, lon)
}

fn trim_degrees(degrees: &str) -> &str {
    let trimmed = degrees.trim_start_matches('0');
    if trimmed.is_empty() {
        "0"
    } else {
        trimmed
    }
}

fn normalize_minutes(minutes: &str) -> String {
    let minutes = minutes.replace(',', ".");
    let integer_digits = minutes.find('.').unwrap_or(minutes.len());
    if integer_digits < 2 {
        format!("0{}", minutes)
    } else {
        minutes
    }
}

fn degrees_and_minutes(value: f64) -> (u32, f64) {
    let abs = value.abs();
    let mut degrees = abs.trunc();
    let mut minutes = ((abs - degrees) * 60.0 * 1000.0).round() / 1000.0;

    // 59.9996' rounds to 60.000', which belongs to the next degree
    if minutes >= 60.0 {
        degrees += 1.0;
        minutes = 0.0;
    }

    (degrees as u32, minutes)
}
