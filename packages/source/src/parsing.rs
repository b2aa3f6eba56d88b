//! Shared parsing utilities for accident rows.
//!
//! Date, coordinate, and severity parsing used by both the sheet merger and
//! the cached CSV loader. A bad date or coordinate drops the row; a blank
//! or unreadable severity only leaves the record without a code.

use bridge_accidents_accident_models::{AccidentRecord, SeverityCode};
use chrono::{NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// Parses an accident date, discarding any time-of-day component.
#[must_use]
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Parses a single coordinate. Returns `None` if empty, a `.` placeholder,
/// unparseable, not finite, or zero.
#[must_use]
pub fn parse_coordinate(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "." {
        return None;
    }
    let value = s.parse::<f64>().ok()?;
    if !value.is_finite() || value == 0.0 {
        return None;
    }
    Some(value)
}

/// Parses lat/lng strings. Returns `None` if either is unusable.
#[must_use]
pub fn parse_lat_lng_str(lat: &str, lng: &str) -> Option<(f64, f64)> {
    Some((parse_coordinate(lat)?, parse_coordinate(lng)?))
}

/// Parses a severity code, accepting integral floats such as `"2.0"`
/// written by spreadsheet exports.
#[must_use]
pub fn parse_severity(s: &str) -> Option<SeverityCode> {
    let s = s.trim();
    if let Ok(code) = s.parse::<u8>() {
        return Some(SeverityCode(code));
    }
    let value = s.parse::<f64>().ok()?;
    if value.fract() != 0.0 || !(0.0..=f64::from(u8::MAX)).contains(&value) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let code = value as u8;
    Some(SeverityCode(code))
}

/// Builds a record from raw cell values, or `None` if the date or either
/// coordinate is unusable. An unusable severity becomes `None` on the
/// record.
#[must_use]
pub fn parse_record(date: &str, lat: &str, lng: &str, severity: &str) -> Option<AccidentRecord> {
    let date = parse_date(date)?;
    let (latitude, longitude) = parse_lat_lng_str(lat, lng)?;
    let code = parse_severity(severity);
    if code.is_none() && !severity.trim().is_empty() {
        log::trace!("  unreadable severity {severity:?} on {date}");
    }
    Some(AccidentRecord {
        date,
        latitude,
        longitude,
        severity: code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_date() {
        let d = parse_date("2007-01-28").unwrap();
        assert_eq!(d.to_string(), "2007-01-28");
    }

    #[test]
    fn parses_datetime_and_drops_time() {
        assert_eq!(
            parse_date("2016-04-03 17:45:00").unwrap().to_string(),
            "2016-04-03"
        );
        assert_eq!(
            parse_date("2016-04-03T17:45:00.000").unwrap().to_string(),
            "2016-04-03"
        );
    }

    #[test]
    fn parses_us_date() {
        assert_eq!(parse_date("12/28/2010").unwrap().to_string(), "2010-12-28");
        assert_eq!(
            parse_date("12/28/2010 08:15").unwrap().to_string(),
            "2010-12-28"
        );
    }

    #[test]
    fn rejects_invalid_date() {
        assert!(parse_date("not-a-date").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn rejects_placeholder_coordinates() {
        assert!(parse_coordinate(".").is_none());
        assert!(parse_coordinate(" ").is_none());
        assert!(parse_coordinate("0").is_none());
        assert!(parse_coordinate("NaN").is_none());
        assert!(parse_coordinate("inf").is_none());
        assert!(parse_coordinate("abc").is_none());
    }

    #[test]
    fn parses_lat_lng_strings() {
        let (la, lo) = parse_lat_lng_str("44.9460", " -93.0789").unwrap();
        assert!((la - 44.9460).abs() < f64::EPSILON);
        assert!((lo - -93.0789).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_partial_lat_lng() {
        assert!(parse_lat_lng_str("44.9460", ".").is_none());
        assert!(parse_lat_lng_str("0.0", "-93.0789").is_none());
    }

    #[test]
    fn parses_severity_codes() {
        assert_eq!(parse_severity("2"), Some(SeverityCode(2)));
        assert_eq!(parse_severity("4.0"), Some(SeverityCode(4)));
        assert_eq!(parse_severity("2.5"), None);
        assert_eq!(parse_severity("-1"), None);
        assert_eq!(parse_severity(""), None);
    }

    #[test]
    fn builds_record() {
        let record = parse_record("2010-12-28", "44.94", "-93.08", "3").unwrap();
        assert_eq!(record.date.to_string(), "2010-12-28");
        assert_eq!(record.severity, Some(SeverityCode(3)));
        assert!(parse_record("2010-12-28", "44.94", ".", "3").is_none());
        assert!(parse_record("2010-13-28", "44.94", "-93.08", "3").is_none());
    }

    #[test]
    fn keeps_record_with_unusable_severity() {
        let blank = parse_record("2010-12-28", "44.94", "-93.08", "").unwrap();
        assert_eq!(blank.severity, None);
        let fractional = parse_record("2010-12-28", "44.94", "-93.08", "2.5").unwrap();
        assert_eq!(fractional.severity, None);
    }
}
