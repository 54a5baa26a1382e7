//! Tag Trajectory Library
//!
//! A Rust library for converting irregularly sampled animal-tag telemetry
//! logs into time-aligned trajectory datasets stored as Apache Parquet.
//!
//! This library provides tools for:
//! - Parsing tag flat files (plain or gzip, ISO-8859-1) into global attributes,
//!   histogram bin definitions and per-variable observation streams
//! - Aligning every variable onto one time axis under two matchup policies
//! - Assembling trajectory datasets with mandatory coordinate variables
//! - Writing Parquet files with variable and global attributes, then amending
//!   them with bounds computed from the persisted data
//! - Converting batches of files concurrently with per-file failure isolation

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod matchup;
pub mod models;
pub mod parser;
pub mod processor;
pub mod profile;
pub mod store;
pub mod timestamp;
pub mod trajectory;

// Re-export commonly used types
pub use config::{ConversionConfig, MatchupMode};
pub use error::{Result, TagError};
pub use models::{BatchReport, ConversionSummary, FailedFile, GlobalAttribute, Observation};
pub use processor::{BatchProcessor, TrajectoryConverter};
pub use profile::{MetadataProfile, Template};
pub use store::ObservationStore;
pub use trajectory::{TrajectoryAssembler, TrajectoryDataset};
