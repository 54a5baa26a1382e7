//! Tests for the conversion pipeline and batch orchestration
//!
//! Fixtures are written to temporary directories and converted end to end.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::config::ConversionConfig;
use crate::processor::TrajectoryConverter;
use crate::profile::MetadataProfile;


/// 2005-07-10T00:00:00Z
pub const DEPLOYMENT_START: i64 = 1_120_953_600;

/// Tag log with three location fixes, six temperatures, a single depth
/// reading, fourteen light readings and two histogram bins
pub fn create_test_tag_log() -> String {
    let mut lines = vec![
        "// Tag Universal File Format".to_string(),
        ":serial_number = \"05A0001\"".to_string(),
        ":ptt = 57441".to_string(),
        "Description: archival tag recovered off Baja California".to_string(),
        "\"Date\",\"VariableID\",\"Value\",\"VariableName\",\"Units\"".to_string(),
        ",,10.0,\"HistTempBin1\",\"Celsius\"".to_string(),
        ",,20.0,\"HistTempBin2\",\"Celsius\"".to_string(),
    ];

    for (minute, lat, lon) in [(0, "36.50", "-122.10"), (10, "36.60", "-122.20"), (20, "36.70", "-122.30")] {
        lines.push(format!(
            "\"2005-07-10 00:{:02}:00\",2,{},\"latitude\",\"degrees_north\"",
            minute, lat
        ));
        lines.push(format!(
            "\"2005-07-10 00:{:02}:00\",3,{},\"longitude\",\"degrees_east\"",
            minute, lon
        ));
    }

    for (minute, value) in [(0, "15.10"), (4, "15.20"), (9, "15.30"), (11, "15.40"), (15, "15.50"), (19, "15.60")] {
        lines.push(format!(
            "\"2005-07-10 00:{:02}:00\",6,{},\"temperature\",\"Celsius\"",
            minute, value
        ));
    }

    lines.push("\"2005-07-10 00:05:00\",7,12.0,\"depth\",\"m\"".to_string());

    for minute in 0..14 {
        lines.push(format!(
            "\"2005-07-10 00:{:02}:00\",8,{},\"light\"",
            minute,
            100 + minute
        ));
    }

    lines.join("\n") + "\n"
}

/// Tag log with sensor data but no location fixes
pub fn create_tag_log_without_location() -> String {
    [
        ":serial_number = 7",
        "\"2005-07-10 00:00:00\",6,15.10,\"temperature\",\"Celsius\"",
        "\"2005-07-10 00:01:00\",6,15.20,\"temperature\",\"Celsius\"",
    ]
    .join("\n")
}

pub fn create_test_profile() -> MetadataProfile {
    MetadataProfile::from_json(r#"[{"name": "ptt", "group": "tag", "type": "int"}]"#).unwrap()
}

pub fn create_converter(config: ConversionConfig) -> TrajectoryConverter {
    TrajectoryConverter::new(config, Arc::new(create_test_profile()))
}

/// Write a fixture into `dir` and return its path
pub fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Schema of a written file, metadata included
pub fn read_schema(path: &Path) -> SchemaRef {
    let file = fs::File::open(path).unwrap();
    ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .schema()
        .clone()
}
