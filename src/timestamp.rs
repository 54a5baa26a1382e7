//! Timestamp resolution for observation lines.
//!
//! Tag logs carry either one combined date-time field or a date and a time in
//! separate pieces. Both shapes go through [`DateTimeSource::resolve`], which
//! yields canonical seconds since the Unix epoch (UTC).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];

/// Where the date and time of an observation come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeSource<'a> {
    /// Date and time held separately; a missing time means midnight
    SeparateDateAndTime { date: &'a str, time: Option<&'a str> },
    /// One field holding both, e.g. `2005-07-10 0:00:00`
    CombinedDateTime(&'a str),
}

impl<'a> DateTimeSource<'a> {
    /// Pick the source shape for a single raw field
    pub fn from_field(field: &'a str) -> Self {
        let field = field.trim();
        if field.contains([' ', 'T']) {
            DateTimeSource::CombinedDateTime(field)
        } else {
            DateTimeSource::SeparateDateAndTime {
                date: field,
                time: None,
            }
        }
    }

    /// Resolve to seconds since the epoch, or `None` if the text is not a timestamp
    pub fn resolve(&self) -> Option<i64> {
        match *self {
            DateTimeSource::CombinedDateTime(text) => resolve_combined(text),
            DateTimeSource::SeparateDateAndTime { date, time } => {
                let date = parse_date(date)?;
                let time = match time {
                    Some(t) => parse_time(t)?,
                    None => NaiveTime::MIN,
                };
                Some(NaiveDateTime::new(date, time).and_utc().timestamp())
            }
        }
    }
}

/// Resolve one raw timestamp field (quotes allowed)
pub fn parse_timestamp(field: &str) -> Option<i64> {
    let cleaned = field.trim().trim_matches('"').trim();
    if cleaned.is_empty() {
        return None;
    }
    DateTimeSource::from_field(cleaned).resolve()
}

fn resolve_combined(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp());
    }

    let text = text
        .strip_suffix('Z')
        .or_else(|| text.strip_suffix(" UTC"))
        .unwrap_or(text);
    let (date, time) = text.split_once([' ', 'T'])?;

    DateTimeSource::SeparateDateAndTime {
        date,
        time: Some(time.trim()),
    }
    .resolve()
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
}

/// Render epoch seconds as RFC 3339 for attribute values
pub fn format_timestamp(seconds: i64) -> Option<String> {
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.to_rfc3339())
}
