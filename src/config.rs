//! Configuration management and validation.
//!
//! Provides the per-run conversion settings: which matchup policy aligns the
//! variable streams, whether grouped attributes are available in the output,
//! the series-length tolerance, and batch concurrency limits.

use crate::constants::{DEFAULT_FILE_PATTERNS, DEFAULT_SERIES_TOLERANCE};
use crate::error::{Result, TagError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Policy used to align variable streams onto one time axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchupMode {
    /// Location timestamps form the axis; other variables take the nearest sample
    #[default]
    OneLocationOneObservation,
    /// The densest stream forms the axis; other variables take the latest sample at or before it
    OneLocationManyObservations,
}

impl MatchupMode {
    pub fn from_flag(many_observations: bool) -> Self {
        if many_observations {
            MatchupMode::OneLocationManyObservations
        } else {
            MatchupMode::OneLocationOneObservation
        }
    }

    pub fn records_freshness(&self) -> bool {
        matches!(self, MatchupMode::OneLocationManyObservations)
    }
}

/// Main configuration for tag trajectory conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Matchup policy applied to every file in the run
    pub matchup_mode: MatchupMode,

    /// Grouped (hierarchical) attributes are available in the output format
    pub grouped_output: bool,

    /// Maximum sample count drift for a variable to count as a time series
    pub series_tolerance: usize,

    /// Maximum concurrent file conversions
    pub max_concurrent_files: usize,

    /// Optional deadline around each file conversion
    #[serde(with = "optional_seconds")]
    pub file_timeout: Option<Duration>,

    /// Glob patterns matched against file names when walking directories
    pub file_patterns: Vec<String>,

    /// Replace existing output files instead of skipping them
    pub overwrite: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            matchup_mode: MatchupMode::default(),
            grouped_output: true,
            series_tolerance: DEFAULT_SERIES_TOLERANCE,
            max_concurrent_files: num_cpus::get().max(1),
            file_timeout: None,
            file_patterns: DEFAULT_FILE_PATTERNS.iter().map(|p| p.to_string()).collect(),
            overwrite: false,
        }
    }
}

impl ConversionConfig {
    /// Load configuration from a JSON document; absent keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ConversionConfig =
            serde_json::from_str(&content).map_err(|e| TagError::Configuration {
                message: format!("Invalid config file {}: {}", path.display(), e),
            })?;
        debug!("Loaded configuration from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    pub fn with_matchup_mode(mut self, mode: MatchupMode) -> Self {
        self.matchup_mode = mode;
        self
    }

    pub fn with_grouped_output(mut self, grouped: bool) -> Self {
        self.grouped_output = grouped;
        self
    }

    pub fn with_series_tolerance(mut self, tolerance: usize) -> Self {
        self.series_tolerance = tolerance;
        self
    }

    pub fn with_max_concurrent_files(mut self, max_files: usize) -> Self {
        self.max_concurrent_files = max_files;
        self
    }

    pub fn with_file_timeout(mut self, timeout: Duration) -> Self {
        self.file_timeout = Some(timeout);
        self
    }

    pub fn with_file_patterns(mut self, patterns: Vec<String>) -> Self {
        self.file_patterns = patterns;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Check the configuration for values that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_files == 0 {
            return Err(TagError::configuration(
                "max_concurrent_files must be at least 1",
            ));
        }
        if self.file_patterns.is_empty() {
            return Err(TagError::configuration(
                "at least one input file pattern is required",
            ));
        }
        for pattern in &self.file_patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                TagError::configuration(format!("invalid file pattern '{}': {}", pattern, e))
            })?;
        }
        if self.file_timeout.is_some_and(|t| t.is_zero()) {
            return Err(TagError::configuration("file timeout must be non-zero"));
        }
        Ok(())
    }
}

mod optional_seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
