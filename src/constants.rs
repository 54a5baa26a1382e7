//! Application constants for tag trajectory conversion
//!
//! Line markers, coordinate naming, output variable names and default
//! processing parameters used throughout the converter.

// =============================================================================
// Line Classification Markers
// =============================================================================

/// Comment markers; lines starting with any of these are ignored
pub const COMMENT_MARKERS: &[&str] = &["//", "#"];

/// Leading character of a global attribute line (`:name = value`)
pub const HEADER_MARKER: char = ':';

/// Dataset description lines are global attributes too
pub const DESCRIPTION_PREFIX: &str = "description";

/// First-field values that identify the literal column header row
pub const COLUMN_HEADER_NAMES: &[&str] = &["date", "datetime", "timestamp"];

/// Data lines carry 4 (no unit) or 5 fields
pub const MIN_DATA_FIELDS: usize = 4;
pub const MAX_DATA_FIELDS: usize = 5;

/// UTF-8 byte order mark as it appears after ISO-8859-1 decoding
pub const LATIN1_BOM: &str = "\u{ef}\u{bb}\u{bf}";

/// Gzip magic bytes
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// =============================================================================
// Histogram Bins
// =============================================================================

pub const BIN_MIN_MARKER: &str = "BinMin";
pub const BIN_MAX_MARKER: &str = "BinMax";
pub const BIN_MARKER: &str = "Bin";
pub const HISTOGRAM_MARKER: &str = "Hist";

/// Attribute group that receives histogram bin definitions
pub const HISTOGRAM_GROUP: &str = "histograms";

// =============================================================================
// Coordinates and Output Variables
// =============================================================================

pub const LATITUDE_ALIASES: &[&str] = &["latitude", "lat"];
pub const LONGITUDE_ALIASES: &[&str] = &["longitude", "lon", "long"];
pub const DEPTH_ALIASES: &[&str] = &["depth", "pressure_depth"];

pub const TIME_VARIABLE: &str = "time";
pub const LATITUDE_VARIABLE: &str = "latitude";
pub const LONGITUDE_VARIABLE: &str = "longitude";
pub const DEPTH_VARIABLE: &str = "depth";
pub const TRAJECTORY_VARIABLE: &str = "trajectory";
pub const FRESHNESS_VARIABLE: &str = "freshness";

/// Observation dimension shared by every output variable
pub const OBS_DIMENSION: &str = "obs";

pub const TIME_UNITS: &str = "seconds since 1970-01-01T00:00:00Z";
pub const FRESHNESS_UNITS: &str = "seconds";

/// Global attribute supplying the trajectory identifier
pub const SERIAL_NUMBER_ATTRIBUTE: &str = "serial_number";
pub const DEFAULT_TRAJECTORY_ID: &str = "1";

/// Root attribute group
pub const ROOT_GROUP: &str = "/";

pub const CONVENTIONS: &str = "CF-1.6";
pub const FEATURE_TYPE: &str = "trajectory";

// =============================================================================
// Processing Defaults
// =============================================================================

/// Allowed difference between a variable's sample count and the expected
/// series length before it is dropped from the trajectory
pub const DEFAULT_SERIES_TOLERANCE: usize = 10;

/// Input file patterns used when walking directories
pub const DEFAULT_FILE_PATTERNS: &[&str] = &["*.txt", "*.csv", "*.tuff", "*.gz"];

pub const OUTPUT_EXTENSION: &str = "parquet";

// =============================================================================
// Command Line Defaults
// =============================================================================

/// Directory name under the user config directory
pub const APP_CONFIG_DIR: &str = "tag-trajectory";

/// Profile picked up from the user config directory when `--profile` is absent
pub const DEFAULT_PROFILE_FILE: &str = "profile.json";

pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Suffix of the hidden file an output is written to before it is published
pub const STAGING_EXTENSION: &str = "partial";
