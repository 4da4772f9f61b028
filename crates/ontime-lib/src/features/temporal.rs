//! Calendar and time-of-day features derived from a scheduled departure

use crate::error::ParseError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Hours treated as peak departure banks
pub const RUSH_HOURS: [u32; 8] = [6, 7, 8, 9, 17, 18, 19, 20];

/// Months with holiday and school-break traffic
pub const HIGH_SEASON_MONTHS: [u32; 4] = [1, 2, 7, 12];

/// Day-of-month bounds that count as the start or end of a month
pub const MONTH_START_LAST_DAY: u32 = 5;
pub const MONTH_END_FIRST_DAY: u32 = 26;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalFeatures {
    pub hour: u32,
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: u32,
    pub month: u32,
    pub day_of_month: u32,
    pub is_weekend: bool,
    pub is_rush_hour: bool,
    pub is_high_season: bool,
    pub is_month_edge: bool,
}

impl TemporalFeatures {
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        let hour = dt.hour();
        let day_of_week = dt.weekday().num_days_from_monday();
        let month = dt.month();
        let day_of_month = dt.day();

        Self {
            hour,
            day_of_week,
            month,
            day_of_month,
            is_weekend: day_of_week >= 5,
            is_rush_hour: RUSH_HOURS.contains(&hour),
            is_high_season: HIGH_SEASON_MONTHS.contains(&month),
            is_month_edge: day_of_month <= MONTH_START_LAST_DAY
                || day_of_month >= MONTH_END_FIRST_DAY,
        }
    }
}

/// Parse a departure timestamp, keeping its wall-clock time.
///
/// Offsets are honoured only to read the local time they describe; no zone
/// conversion happens, so `08:00-03:00` is hour 8.
pub fn parse_departure(input: &str) -> Result<NaiveDateTime, ParseError> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_local());
    }

    let local = strip_offset(trimmed);
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(local, format) {
            return Ok(dt);
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ParseError::new(input))
}

/// Drop a trailing `Z`, `±hh`, `±hhmm` or `±hh:mm` offset after the time part.
/// Anything that is not a well-formed offset is returned untouched.
fn strip_offset(input: &str) -> &str {
    // shortest timestamp with a time part is "YYYY-MM-DDTHH:MM"
    const TIME_END: usize = 16;
    if input.len() <= TIME_END {
        return input;
    }

    if let Some(rest) = input.strip_suffix(['Z', 'z']) {
        return rest;
    }

    let Some(sign) = input.rfind(['+', '-']).filter(|&idx| idx >= TIME_END) else {
        return input;
    };
    let offset = &input[sign + 1..];
    let (hours, minutes) = match offset.len() {
        2 => (offset, "00"),
        4 => (&offset[..2], &offset[2..]),
        5 if offset.as_bytes()[2] == b':' => (&offset[..2], &offset[3..]),
        _ => return input,
    };
    let valid = [hours, minutes]
        .iter()
        .all(|part| part.bytes().all(|b| b.is_ascii_digit()))
        && hours.parse::<u32>().is_ok_and(|h| h <= 23)
        && minutes.parse::<u32>().is_ok_and(|m| m <= 59);

    if valid {
        &input[..sign]
    } else {
        input
    }
}

/// Parse and extract in one step
pub fn extract(input: &str) -> Result<TemporalFeatures, ParseError> {
    parse_departure(input).map(|dt| TemporalFeatures::from_datetime(&dt))
}
