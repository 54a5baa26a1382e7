//! Second-pass statistics over a written dataset
//!
//! Bounds of the matched time axis (and of freshness) are only known once the
//! tolerance filter and matchup have run, so they are read back from the
//! persisted file and attached as attributes in a second write pass.

use super::writer::{AttributeAmendment, ColumnValues, DatasetWriter};
use crate::config::MatchupMode;
use crate::constants::{FRESHNESS_VARIABLE, TIME_VARIABLE};
use crate::error::{Result, TagError};
use crate::timestamp::format_timestamp;
use tracing::{debug, info};

/// Computes `valid_min`/`valid_max` from written data and amends the file
#[derive(Debug, Clone, Copy)]
pub struct StatisticsFinalizer {
    mode: MatchupMode,
}

impl StatisticsFinalizer {
    pub fn new(mode: MatchupMode) -> Self {
        Self { mode }
    }

    /// Read back, compute bounds, amend; returns the attributes that were set
    pub fn finalize(&self, writer: &mut dyn DatasetWriter) -> Result<AttributeAmendment> {
        let mut amendment = AttributeAmendment::default();

        let time = read_integers(writer, TIME_VARIABLE)?;
        if let Some((min, max)) = integer_bounds(&time) {
            amendment.set_variable(TIME_VARIABLE, "valid_min", min.to_string());
            amendment.set_variable(TIME_VARIABLE, "valid_max", max.to_string());
            if let Some(start) = format_timestamp(min) {
                amendment.set_global("time_coverage_start", start);
            }
            if let Some(end) = format_timestamp(max) {
                amendment.set_global("time_coverage_end", end);
            }
        }

        if self.mode.records_freshness() {
            let freshness = read_integers(writer, FRESHNESS_VARIABLE)?;
            match integer_bounds(&freshness) {
                Some((min, max)) => {
                    amendment.set_variable(FRESHNESS_VARIABLE, "valid_min", min.to_string());
                    amendment.set_variable(FRESHNESS_VARIABLE, "valid_max", max.to_string());
                }
                None => debug!("Freshness has no values; no bounds recorded"),
            }
        }

        writer.amend_attributes(&amendment)?;
        info!(
            "Finalized statistics for {}",
            writer.output_path().display()
        );
        Ok(amendment)
    }
}

fn read_integers(writer: &dyn DatasetWriter, name: &str) -> Result<Vec<Option<i64>>> {
    match writer.read_variable(name)? {
        ColumnValues::Int(values) => Ok(values),
        _ => Err(TagError::writer(
            writer.output_path(),
            format!("variable '{}' is not an integer column", name),
        )),
    }
}

/// Min and max over non-null values
pub fn integer_bounds(values: &[Option<i64>]) -> Option<(i64, i64)> {
    values.iter().flatten().fold(None, |bounds, &v| match bounds {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_bounds_skip_nulls() {
        assert_eq!(integer_bounds(&[None, Some(40), Some(-3), None]), Some((-3, 40)));
        assert_eq!(integer_bounds(&[None, None]), None);
        assert_eq!(integer_bounds(&[]), None);
    }
}
