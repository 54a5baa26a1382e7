//! Histogram bin-edge aggregation
//!
//! Bin definition lines carry no timestamp: `,,21.5,"HistTempBin3","Celsius"`.
//! The name splits into a base variable and a bin index around a `BinMin`,
//! `BinMax` or bare `Bin` marker. Minimum and maximum edges are kept apart,
//! keyed by base name and then by bin index.

use super::LineError;
use crate::constants::{BIN_MARKER, BIN_MAX_MARKER, BIN_MIN_MARKER, HISTOGRAM_MARKER};
use crate::models::BinDefinition;
use crate::store::normalize_name;
use std::collections::BTreeMap;
use tracing::debug;

/// Which edge store a bin definition belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinEdge {
    Min,
    Max,
}

type BinStore = BTreeMap<String, BTreeMap<u32, BinDefinition>>;

/// Collected histogram bin edges for one file
#[derive(Debug, Clone, Default)]
pub struct BinAggregator {
    min_bins: BinStore,
    max_bins: BinStore,
}

impl BinAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one bin definition line from its split fields
    pub fn record_bin(&mut self, fields: &[String]) -> Result<(), LineError> {
        if fields.len() < 4 {
            return Err(LineError::ShortBinDefinition(fields.len()));
        }

        let raw_value = fields[2].trim();
        let name = normalize_name(&fields[3]);
        let unit = fields.get(4).map(|u| u.trim().to_string()).unwrap_or_default();

        let (base, bin_index, edge) = split_bin_name(&name)?;
        let value = raw_value
            .parse::<f64>()
            .map_err(|_| LineError::InvalidBinValue {
                name: name.clone(),
                value: raw_value.to_string(),
            })?;

        debug!(
            "Bin {:?} {} #{} = {} {}",
            edge, base, bin_index, value, unit
        );

        let store = match edge {
            BinEdge::Min => &mut self.min_bins,
            BinEdge::Max => &mut self.max_bins,
        };
        store.entry(base).or_default().insert(
            bin_index,
            BinDefinition {
                bin_index,
                value,
                unit,
            },
        );
        Ok(())
    }

    /// Bins for one base name, ordered by bin index
    pub fn bins(&self, edge: BinEdge, base: &str) -> Option<impl Iterator<Item = &BinDefinition>> {
        let store = match edge {
            BinEdge::Min => &self.min_bins,
            BinEdge::Max => &self.max_bins,
        };
        store.get(base).map(|bins| bins.values())
    }

    /// Every base name with at least one edge, in order
    pub fn base_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .min_bins
            .keys()
            .chain(self.max_bins.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.min_bins
            .values()
            .chain(self.max_bins.values())
            .map(BTreeMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split `HistTempBinMin3` into (`Temp`, 3, Min)
pub fn split_bin_name(name: &str) -> Result<(String, u32, BinEdge), LineError> {
    let (marker, edge) = if name.contains(BIN_MAX_MARKER) {
        (BIN_MAX_MARKER, BinEdge::Max)
    } else if name.contains(BIN_MIN_MARKER) {
        (BIN_MIN_MARKER, BinEdge::Min)
    } else {
        (BIN_MARKER, BinEdge::Min)
    };

    let parts: Vec<&str> = name.split(marker).collect();
    if parts.len() != 2 {
        return Err(LineError::MalformedBinName(name.to_string()));
    }

    let bin_index = parts[1]
        .parse::<u32>()
        .map_err(|_| LineError::MalformedBinName(name.to_string()))?;
    let base = parts[0].replace(HISTOGRAM_MARKER, "");
    if base.is_empty() {
        return Err(LineError::MalformedBinName(name.to_string()));
    }

    Ok((base, bin_index, edge))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(line: &[&str]) -> Vec<String> {
        line.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_hist_bin_routes_to_min_store() {
        let mut bins = BinAggregator::new();
        bins.record_bin(&fields(&["", "", "21.5", "HistTempBin3", "Celsius"]))
            .unwrap();

        let recorded: Vec<&BinDefinition> = bins.bins(BinEdge::Min, "Temp").unwrap().collect();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].bin_index, 3);
        assert_eq!(recorded[0].value, 21.5);
        assert_eq!(recorded[0].unit, "Celsius");
        assert!(bins.bins(BinEdge::Max, "Temp").is_none());
    }

    #[test]
    fn test_min_and_max_markers() {
        assert_eq!(
            split_bin_name("HistDepthBinMax12").unwrap(),
            ("Depth".to_string(), 12, BinEdge::Max)
        );
        assert_eq!(
            split_bin_name("HistDepthBinMin1").unwrap(),
            ("Depth".to_string(), 1, BinEdge::Min)
        );
    }

    #[test]
    fn test_bins_are_ordered_by_index() {
        let mut bins = BinAggregator::new();
        for (index, value) in [(3, "30"), (1, "10"), (2, "20")] {
            let name = format!("HistDepthBinMax{}", index);
            bins.record_bin(&fields(&["", "", value, &name, "m"])).unwrap();
        }

        let values: Vec<f64> = bins
            .bins(BinEdge::Max, "Depth")
            .unwrap()
            .map(|b| b.value)
            .collect();
        assert_eq!(values, vec![10.0, 20.0, 30.0]);
        assert_eq!(bins.base_names(), vec!["Depth"]);
        assert_eq!(bins.len(), 3);
    }

    #[test]
    fn test_malformed_bin_names() {
        assert!(matches!(
            split_bin_name("HistTemp"),
            Err(LineError::MalformedBinName(_))
        ));
        assert!(matches!(
            split_bin_name("TempBinMaxBinMax2"),
            Err(LineError::MalformedBinName(_))
        ));
        assert!(matches!(
            split_bin_name("TempBinMaxA"),
            Err(LineError::MalformedBinName(_))
        ));
        assert!(matches!(
            split_bin_name("HistBin2"),
            Err(LineError::MalformedBinName(_))
        ));
    }

    #[test]
    fn test_invalid_value_and_short_lines() {
        let mut bins = BinAggregator::new();
        assert!(matches!(
            bins.record_bin(&fields(&["", "", "warm", "HistTempBin1", "C"])),
            Err(LineError::InvalidBinValue { .. })
        ));
        assert_eq!(
            bins.record_bin(&fields(&["", "", "1.0"])),
            Err(LineError::ShortBinDefinition(3))
        );
        assert!(bins.is_empty());
    }
}
