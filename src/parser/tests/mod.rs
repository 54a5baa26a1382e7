//! Test utilities for tag log parser testing
//!
//! Shared fixtures and helpers used across the parser test modules.

use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

use crate::parser::{ParsedFile, TagFileParser};
use crate::profile::MetadataProfile;


/// Helper to create a representative tag log
pub fn create_test_tag_log() -> String {
    r#"// Tag Universal File Format
:serial_number = "05A0001"
:ptt = 57441
:species = "Thunnus orientalis"
Description: archival tag recovered off Baja California
"Date","VariableID","Value","VariableName","Units"
,,21.5,"HistTempBin3","Celsius"
,,25.0,"HistTempBinMax3","Celsius"
"2005-07-10 0:00:00",2,36.55,"latitude","degrees_north"
"2005-07-10 0:00:00",3,-122.10,"longitude","degrees_east"
"2005-07-10 0:00:00",6,15.10,"temperature","Celsius"
"2005-07-10 0:01:00",6,15.20,"temperature","Celsius"
"2005-07-10 0:02:00",6,15.30,"temperature","Celsius"
"2005-07-10 0:00:30",7,12.0,"depth","m"
garbage line without structure
"#
    .to_string()
}

/// Profile declaring a couple of grouped attributes
pub fn create_test_profile() -> MetadataProfile {
    MetadataProfile::from_json(
        r#"[
            {"name": "ptt", "group": "tag", "type": "int"},
            {"name": "species", "group": "animal", "type": "string"}
        ]"#,
    )
    .unwrap()
}

pub fn parse_text(content: &str) -> ParsedFile {
    let parser = TagFileParser::new(Arc::new(create_test_profile()));
    parser
        .parse_lines(content.lines().map(|l| Ok(l.to_string())))
        .unwrap()
}

/// Helper to create a temporary file with given content
pub fn create_temp_file(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "{}", content).unwrap();
    temp_file
}
