//! Date formats used by the engine
//!
//! Timestamps are stored as text in the long format below. Ordering
//! operators fall back to these parsers when an operand is not numeric.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Format of generated timestamps (`NOW()`, `LOCALTIMESTAMP`)
pub const DATE_LONG_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f %z";

/// `2006-Jan-02`
pub const DATE_SHORT_FORMAT: &str = "%Y-%b-%d";

/// `2006-01-02`
pub const DATE_NUMBER_FORMAT: &str = "%Y-%m-%d";

const DATETIME_NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Current time formatted with `DATE_LONG_FORMAT`.
pub fn now_formatted() -> String {
    Utc::now().format(DATE_LONG_FORMAT).to_string()
}

/// Parse a date in any of the supported forms. Naive forms are read as UTC.
pub fn parse_date(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }

    let utc = FixedOffset::east_opt(0)?;
    for format in DATETIME_NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return utc.from_local_datetime(&naive).single();
        }
    }
    for format in [DATE_SHORT_FORMAT, DATE_NUMBER_FORMAT] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            let midnight = date.and_hms_opt(0, 0, 0)?;
            return utc.from_local_datetime(&midnight).single();
        }
    }
    None
}
