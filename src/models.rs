//! Core data structures and types for tag trajectory conversion.
//!
//! Defines observations, histogram bin definitions, global attributes and
//! the per-file and per-batch reporting types used throughout the library.

use crate::constants::ROOT_GROUP;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single timestamped sample for one variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    pub value: String,
    pub unit: String,
}

impl Observation {
    pub fn new(timestamp: i64, value: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            timestamp,
            value: value.into(),
            unit: unit.into(),
        }
    }

    /// Numeric view of the value, if it parses
    pub fn numeric_value(&self) -> Option<f64> {
        self.value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

/// One histogram bin edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinDefinition {
    pub bin_index: u32,
    pub value: f64,
    pub unit: String,
}

/// Declared value type of a global attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    #[default]
    String,
    Int,
    Float,
    Double,
}

impl AttributeType {
    /// Check whether a raw value is acceptable for this type
    pub fn accepts(&self, value: &str) -> bool {
        let value = value.trim();
        match self {
            AttributeType::String => true,
            AttributeType::Int => value.parse::<i64>().is_ok(),
            AttributeType::Float | AttributeType::Double => value.parse::<f64>().is_ok(),
        }
    }
}

/// Global attribute extracted from a header line or supplied by a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalAttribute {
    pub name: String,
    pub value: String,
    pub group: String,
    pub declared_type: AttributeType,
}

impl GlobalAttribute {
    /// Attribute in the root group with string type
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            group: ROOT_GROUP.to_string(),
            declared_type: AttributeType::String,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_type(mut self, declared_type: AttributeType) -> Self {
        self.declared_type = declared_type;
        self
    }

    pub fn is_root(&self) -> bool {
        self.group.is_empty() || self.group == ROOT_GROUP
    }

    /// Storage key: `group/name` when groups are available, `name` otherwise
    pub fn storage_key(&self, grouped: bool) -> String {
        if grouped && !self.is_root() {
            format!("{}/{}", self.group.trim_matches('/'), self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Outcome of one successful file conversion
#[derive(Debug, Clone, Serialize)]
pub struct ConversionSummary {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub trajectory_id: String,
    pub samples: usize,
    pub variables: Vec<String>,
    pub dropped_variables: Vec<String>,
    pub lines_read: usize,
    pub lines_skipped: usize,
    pub matchup_misses: usize,
    pub processing_time_ms: u128,
}

/// A file whose conversion did not complete
#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a batch run: partial success is the normal case
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub converted: Vec<ConversionSummary>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<FailedFile>,
    pub processing_time_ms: u128,
}

impl BatchReport {
    pub fn files_attempted(&self) -> usize {
        self.converted.len() + self.failed.len() + self.skipped.len()
    }

    pub fn total_samples(&self) -> usize {
        self.converted.iter().map(|s| s.samples).sum()
    }

    /// True when there was work and none of it succeeded
    pub fn all_failed(&self) -> bool {
        !self.failed.is_empty() && self.converted.is_empty() && self.skipped.is_empty()
    }
}
