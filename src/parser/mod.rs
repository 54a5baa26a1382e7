//! Tag telemetry flat-file parser
//!
//! Turns a raw tag log into per-variable observation streams, histogram bin
//! definitions and global attributes. Lines of every kind are interleaved in
//! these files, so each one is classified on its own and routed accordingly.
//!
//! ## Architecture
//!
//! - [`reader`] - Input opening, gzip detection and ISO-8859-1 line decoding
//! - [`classifier`] - Decides what kind of line a raw line is
//! - [`attributes`] - Header line to global attribute extraction
//! - [`bins`] - Histogram bin-edge aggregation
//! - [`tag_file`] - Orchestration over a whole file
//! - [`stats`] - Parse statistics and result structures
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tag_trajectory::parser::TagFileParser;
//! use tag_trajectory::profile::MetadataProfile;
//!
//! # fn example() -> tag_trajectory::Result<()> {
//! let parser = TagFileParser::new(Arc::new(MetadataProfile::default()));
//! let parsed = parser.parse_file(std::path::Path::new("tag_05A0001.txt"))?;
//!
//! println!("Parsed {} observations across {} variables",
//!          parsed.store.total_observations(),
//!          parsed.store.len());
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod bins;
pub mod classifier;
pub mod reader;
pub mod stats;
pub mod tag_file;

#[cfg(test)]
pub mod tests;

use thiserror::Error;

pub use attributes::GlobalAttributeExtractor;
pub use bins::{BinAggregator, BinEdge};
pub use classifier::{DataLine, LineClass, classify_line};
pub use stats::{ParseStats, ParsedFile};
pub use tag_file::TagFileParser;

/// Why a single line was rejected; never fatal to the file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("malformed global attribute '{0}'")]
    MalformedAttribute(String),

    #[error("bin name '{0}' does not split into a base name and bin index")]
    MalformedBinName(String),

    #[error("bin value '{value}' for '{name}' is not a number")]
    InvalidBinValue { name: String, value: String },

    #[error("bin definition has {0} fields, expected at least 4")]
    ShortBinDefinition(usize),

    #[error("expected 4 or 5 fields, found {0}")]
    UnexpectedFieldCount(usize),

    #[error("unrecognised timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("data line has no variable name")]
    MissingVariableName,

    #[error("line could not be split into fields")]
    Unsplittable,
}
