//! Line classification for tag log files
//!
//! Header attributes, histogram bin definitions and timestamped observations
//! are interleaved in a tag log. Each trimmed line is inspected on its own and
//! sorted into one of those kinds, or rejected.

use super::LineError;
use crate::constants::{
    COLUMN_HEADER_NAMES, COMMENT_MARKERS, DESCRIPTION_PREFIX, HEADER_MARKER, MAX_DATA_FIELDS,
    MIN_DATA_FIELDS,
};
use crate::timestamp::parse_timestamp;

/// A timestamped observation line split into its fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLine {
    pub timestamp: i64,
    pub variable_id: String,
    pub value: String,
    pub variable: String,
    pub unit: String,
}

/// What a line turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// Blank lines, comments and the literal column header row
    Ignored,
    GlobalAttribute,
    /// Fields of a line with no timestamp
    BinDefinition(Vec<String>),
    DataObservation(DataLine),
    Unparseable(LineError),
}

/// Classify one trimmed line
pub fn classify_line(line: &str) -> LineClass {
    let line = line.trim();

    if line.is_empty() || COMMENT_MARKERS.iter().any(|m| line.starts_with(m)) {
        return LineClass::Ignored;
    }

    if is_header_line(line) {
        return LineClass::GlobalAttribute;
    }

    let fields = match split_fields(line) {
        Some(fields) => fields,
        None => return LineClass::Unparseable(LineError::Unsplittable),
    };

    if fields.first().is_none_or(|f| f.is_empty()) {
        return LineClass::BinDefinition(fields);
    }

    if !(MIN_DATA_FIELDS..=MAX_DATA_FIELDS).contains(&fields.len()) {
        return LineClass::Unparseable(LineError::UnexpectedFieldCount(fields.len()));
    }

    if is_column_header(&fields[0]) {
        return LineClass::Ignored;
    }

    match parse_data_fields(fields) {
        Ok(data) => LineClass::DataObservation(data),
        Err(e) => LineClass::Unparseable(e),
    }
}

fn is_header_line(line: &str) -> bool {
    line.starts_with(HEADER_MARKER)
        || line
            .get(..DESCRIPTION_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(DESCRIPTION_PREFIX))
}

fn is_column_header(first_field: &str) -> bool {
    let lowered = first_field.trim().to_ascii_lowercase();
    COLUMN_HEADER_NAMES.contains(&lowered.as_str())
}

/// Split a comma-separated line, honouring double quotes
pub fn split_fields(line: &str) -> Option<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => Some(record.iter().map(|f| f.to_string()).collect()),
        _ => None,
    }
}

fn parse_data_fields(fields: Vec<String>) -> Result<DataLine, LineError> {
    let mut fields = fields.into_iter();
    let raw_timestamp = fields.next().unwrap_or_default();
    let variable_id = fields.next().unwrap_or_default();
    let value = fields.next().unwrap_or_default();
    let variable = fields.next().unwrap_or_default();
    let unit = fields.next().unwrap_or_default();

    let timestamp =
        parse_timestamp(&raw_timestamp).ok_or(LineError::InvalidTimestamp(raw_timestamp))?;

    if variable.trim().is_empty() {
        return Err(LineError::MissingVariableName);
    }

    Ok(DataLine {
        timestamp,
        variable_id,
        value,
        variable,
        unit,
    })
}
