//! Parsing statistics and result structures for tag log processing
//!
//! Every line of a file is accounted for here: what it was classified as,
//! and why it was skipped when it could not be used.

use super::bins::BinAggregator;
use crate::models::GlobalAttribute;
use crate::store::ObservationStore;

/// Everything extracted from one tag log
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Per-variable observation streams
    pub store: ObservationStore,

    /// Histogram bin edges, kept off the time axis
    pub bins: BinAggregator,

    /// Global attributes in file order
    pub attributes: Vec<GlobalAttribute>,

    /// Line accounting
    pub stats: ParseStats,
}

impl ParsedFile {
    pub fn attribute(&self, name: &str) -> Option<&GlobalAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Simple parsing statistics
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ParseStats {
    /// Total number of lines read
    pub total_lines: usize,

    /// Lines stored as observations
    pub data_lines: usize,

    /// Lines extracted as global attributes
    pub attribute_lines: usize,

    /// Lines recorded as histogram bin edges
    pub bin_lines: usize,

    /// Blank lines, comments and column header rows
    pub ignored_lines: usize,

    /// Lines rejected as malformed
    pub lines_skipped: usize,

    /// Observations that replaced an earlier one at the same timestamp
    pub duplicate_timestamps: usize,

    /// Rejection reasons, one per skipped line
    pub errors: Vec<String>,
}

impl ParseStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rejected line
    pub fn reject(&mut self, line_number: usize, reason: impl std::fmt::Display) {
        self.lines_skipped += 1;
        self.errors.push(format!("Line {}: {}", line_number, reason));
    }

    /// Share of non-ignored lines that were usable, as a percentage
    pub fn success_rate(&self) -> f64 {
        let considered = self.total_lines - self.ignored_lines;
        if considered == 0 {
            0.0
        } else {
            ((considered - self.lines_skipped) as f64 / considered as f64) * 100.0
        }
    }
}
