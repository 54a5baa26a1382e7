//! Core tag log parser implementation
//!
//! Reads a file line by line, classifies each line and routes it to the
//! attribute extractor, the bin aggregator or the observation store. Bad
//! lines are counted and skipped; only I/O failures abort the parse.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::attributes::GlobalAttributeExtractor;
use super::bins::BinAggregator;
use super::classifier::{LineClass, classify_line};
use super::reader::open_input;
use super::stats::{ParseStats, ParsedFile};
use crate::constants::LATIN1_BOM;
use crate::error::Result;
use crate::models::Observation;
use crate::profile::MetadataProfile;
use crate::store::ObservationStore;

/// Parser for tag telemetry flat files
#[derive(Debug, Clone)]
pub struct TagFileParser {
    profile: Arc<MetadataProfile>,
}

impl TagFileParser {
    /// Create a new parser with the metadata profile used for attributes
    pub fn new(profile: Arc<MetadataProfile>) -> Self {
        Self { profile }
    }

    /// Parse a tag log from disk (plain or gzip)
    pub fn parse_file(&self, file_path: &Path) -> Result<ParsedFile> {
        info!("Parsing tag file: {}", file_path.display());
        let parsed = self.parse_lines(open_input(file_path)?)?;
        info!(
            "Parsed {} observations in {} variables from {} lines ({} skipped)",
            parsed.store.total_observations(),
            parsed.store.len(),
            parsed.stats.total_lines,
            parsed.stats.lines_skipped
        );
        Ok(parsed)
    }

    /// Parse already-decoded lines
    pub fn parse_lines<I>(&self, lines: I) -> Result<ParsedFile>
    where
        I: IntoIterator<Item = std::io::Result<String>>,
    {
        let extractor = GlobalAttributeExtractor::new(&self.profile);
        let mut store = ObservationStore::new();
        let mut bins = BinAggregator::new();
        let mut attributes = Vec::new();
        let mut stats = ParseStats::new();

        for (index, line) in lines.into_iter().enumerate() {
            let line = line?;
            let line_number = index + 1;
            stats.total_lines += 1;

            let line = if index == 0 {
                line.trim().trim_start_matches(LATIN1_BOM).trim_start_matches('\u{feff}')
            } else {
                line.trim()
            };

            match classify_line(line) {
                LineClass::Ignored => stats.ignored_lines += 1,
                LineClass::GlobalAttribute => match extractor.extract(line) {
                    Ok(attribute) => {
                        debug!("Attribute {} = {}", attribute.name, attribute.value);
                        stats.attribute_lines += 1;
                        attributes.push(attribute);
                    }
                    Err(e) => {
                        debug!("Skipped line {}: {}", line_number, e);
                        stats.reject(line_number, e);
                    }
                },
                LineClass::BinDefinition(fields) => match bins.record_bin(&fields) {
                    Ok(()) => stats.bin_lines += 1,
                    Err(e) => {
                        debug!("Skipped line {}: {}", line_number, e);
                        stats.reject(line_number, e);
                    }
                },
                LineClass::DataObservation(data) => {
                    let observation = Observation::new(data.timestamp, data.value, data.unit);
                    if store.insert(&data.variable, observation) {
                        debug!(
                            "Line {}: duplicate timestamp {} for '{}', keeping the later value",
                            line_number, data.timestamp, data.variable
                        );
                        stats.duplicate_timestamps += 1;
                    }
                    stats.data_lines += 1;
                }
                LineClass::Unparseable(e) => {
                    debug!("Skipped line {}: {}", line_number, e);
                    stats.reject(line_number, e);
                }
            }
        }

        Ok(ParsedFile {
            store,
            bins,
            attributes,
            stats,
        })
    }
}
