//! Trajectory assembly
//!
//! Decides which streams become output variables and pulls them onto one
//! reference time axis. Coordinates are always present; any other stream only
//! survives if its sample count stays within the configured tolerance of the
//! expected series length, which keeps one-off readings and stray bin data out
//! of the time series.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tag_trajectory::config::ConversionConfig;
//! use tag_trajectory::store::ObservationStore;
//! use tag_trajectory::trajectory::TrajectoryAssembler;
//!
//! # fn example(store: &ObservationStore) -> tag_trajectory::Result<()> {
//! let config = ConversionConfig::default();
//! let assembler = TrajectoryAssembler::new(Path::new("tag.txt"), &config);
//! let layout = assembler.assemble(store, &[])?;
//! let dataset = assembler.build_dataset(store, &layout, Vec::new());
//! println!("{} samples for trajectory {}", dataset.len(), dataset.trajectory_id);
//! # Ok(())
//! # }
//! ```

use crate::config::{ConversionConfig, MatchupMode};
use crate::constants::{
    DEFAULT_TRAJECTORY_ID, FRESHNESS_UNITS, FRESHNESS_VARIABLE, HISTOGRAM_GROUP,
    SERIAL_NUMBER_ATTRIBUTE, TIME_UNITS, TIME_VARIABLE, TRAJECTORY_VARIABLE,
};
use crate::error::{Result, TagError};
use crate::matchup::{MatchupEngine, MatchupStats};
use crate::models::GlobalAttribute;
use crate::parser::{BinAggregator, BinEdge};
use crate::store::{CoordinateKind, ObservationStore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Per-variable attributes, ordered by name
pub type VariableAttributes = BTreeMap<String, String>;

const COORDINATE_KINDS: [CoordinateKind; 3] = [
    CoordinateKind::Latitude,
    CoordinateKind::Longitude,
    CoordinateKind::Depth,
];

/// Aligned values of one output variable
#[derive(Debug, Clone, PartialEq)]
pub enum VariableValues {
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl VariableValues {
    /// Numeric when every matched value parses, text otherwise
    pub fn from_matched(values: Vec<Option<String>>) -> Self {
        let numeric: Option<Vec<Option<f64>>> = values
            .iter()
            .map(|value| match value {
                None => Some(None),
                Some(text) => parse_number(text).map(Some),
            })
            .collect();

        match numeric {
            Some(numbers) => VariableValues::Float(numbers),
            None => VariableValues::Text(values),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VariableValues::Float(values) => values.len(),
            VariableValues::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        match self {
            VariableValues::Float(values) => values.iter().filter(|v| v.is_none()).count(),
            VariableValues::Text(values) => values.iter().filter(|v| v.is_none()).count(),
        }
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// One output variable on the observation dimension
#[derive(Debug, Clone, PartialEq)]
pub struct DataVariable {
    pub name: String,
    /// Set for latitude, longitude and depth
    pub coordinate: Option<CoordinateKind>,
    pub values: VariableValues,
    pub attributes: VariableAttributes,
}

/// Where one coordinate column comes from
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateSlot {
    pub kind: CoordinateKind,
    /// Stream feeding the column; `None` leaves the column empty
    pub source: Option<String>,
    /// Min and max over the source stream's own values
    pub bounds: Option<(f64, f64)>,
}

/// Which streams become which output variables
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryLayout {
    pub mode: MatchupMode,
    /// Stream whose timestamps form the reference axis
    pub reference_variable: String,
    pub reference_times: Vec<i64>,
    pub expected_length: usize,
    /// Designated location stream
    pub location_variable: Option<String>,
    pub coordinates: Vec<CoordinateSlot>,
    /// Data variables in lexicographic order
    pub data_variables: Vec<String>,
    pub dropped_variables: Vec<String>,
    pub trajectory_id: String,
}

impl TrajectoryLayout {
    /// Output variables in write order: coordinates first, then data variables
    pub fn variable_order(&self) -> Vec<&str> {
        let mut order = vec![TIME_VARIABLE];
        order.extend(self.coordinates.iter().map(|slot| slot.kind.variable_name()));
        order.push(TRAJECTORY_VARIABLE);
        order.extend(self.data_variables.iter().map(String::as_str));
        if self.mode.records_freshness() {
            order.push(FRESHNESS_VARIABLE);
        }
        order
    }
}

/// The finished dataset handed to the writer
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryDataset {
    pub trajectory_id: String,
    pub mode: MatchupMode,
    /// Seconds since the epoch, ascending
    pub time: Vec<i64>,
    pub time_attributes: VariableAttributes,
    pub trajectory_attributes: VariableAttributes,
    /// Coordinates, then data variables
    pub variables: Vec<DataVariable>,
    /// Seconds since the latest location fix; many-observations mode only
    pub freshness: Option<Vec<Option<i64>>>,
    pub freshness_attributes: VariableAttributes,
    pub global_attributes: Vec<GlobalAttribute>,
    pub dropped_variables: Vec<String>,
    pub matchup: MatchupStats,
}

impl TrajectoryDataset {
    /// Length of the observation dimension
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn variable(&self, name: &str) -> Option<&DataVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn data_variable_names(&self) -> Vec<&str> {
        self.variables
            .iter()
            .filter(|v| v.coordinate.is_none())
            .map(|v| v.name.as_str())
            .collect()
    }

    /// True when every array has the length of the time axis
    pub fn is_aligned(&self) -> bool {
        let n = self.time.len();
        self.variables.iter().all(|v| v.values.len() == n)
            && self.freshness.as_ref().is_none_or(|f| f.len() == n)
    }
}

/// Chooses output variables and builds the aligned dataset for one file
#[derive(Debug, Clone)]
pub struct TrajectoryAssembler {
    source: PathBuf,
    mode: MatchupMode,
    tolerance: usize,
}

impl TrajectoryAssembler {
    pub fn new(source: &Path, config: &ConversionConfig) -> Self {
        Self {
            source: source.to_path_buf(),
            mode: config.matchup_mode,
            tolerance: config.series_tolerance,
        }
    }

    /// Pick the reference axis, coordinate sources and qualifying data variables
    pub fn assemble(
        &self,
        store: &ObservationStore,
        attributes: &[GlobalAttribute],
    ) -> Result<TrajectoryLayout> {
        if store.is_empty() {
            return Err(TagError::EmptyDataset {
                path: self.source.clone(),
            });
        }

        let location = store.coordinate_stream(CoordinateKind::Latitude);
        let (reference_variable, reference_stream) = match self.mode {
            MatchupMode::OneLocationOneObservation => {
                location.ok_or_else(|| TagError::NoLocationData {
                    path: self.source.clone(),
                })?
            }
            MatchupMode::OneLocationManyObservations => {
                let (name, _) = store.max_series_length().ok_or_else(|| TagError::EmptyDataset {
                    path: self.source.clone(),
                })?;
                let stream = store.stream_for(name).ok_or_else(|| TagError::EmptyDataset {
                    path: self.source.clone(),
                })?;
                (name, stream)
            }
        };

        let expected_length = reference_stream.len();
        check_dimension(reference_variable, expected_length)?;

        if self.mode.records_freshness() && location.is_none() {
            warn!(
                "No location stream in {}; freshness will be empty",
                self.source.display()
            );
        }

        let coordinates: Vec<CoordinateSlot> = COORDINATE_KINDS
            .iter()
            .map(|&kind| match store.coordinate_stream(kind) {
                Some((name, stream)) => CoordinateSlot {
                    kind,
                    source: Some(name.to_string()),
                    bounds: stream.numeric_bounds(),
                },
                None => {
                    debug!("No {} stream; column stays empty", kind.variable_name());
                    CoordinateSlot {
                        kind,
                        source: None,
                        bounds: None,
                    }
                }
            })
            .collect();

        let mut data_variables = Vec::new();
        let mut dropped_variables = Vec::new();

        for (name, stream) in store.streams() {
            if CoordinateKind::from_name(name).is_some() {
                let is_source = coordinates
                    .iter()
                    .any(|slot| slot.source.as_deref() == Some(name));
                if !is_source {
                    warn!("Ignoring second coordinate stream '{}'", name);
                    dropped_variables.push(name.to_string());
                }
                continue;
            }

            if stream.len().abs_diff(expected_length) <= self.tolerance {
                data_variables.push(name.to_string());
            } else {
                debug!(
                    "Dropping '{}': {} samples against an expected {}",
                    name,
                    stream.len(),
                    expected_length
                );
                dropped_variables.push(name.to_string());
            }
        }

        let layout = TrajectoryLayout {
            mode: self.mode,
            reference_variable: reference_variable.to_string(),
            reference_times: reference_stream.timestamps().collect(),
            expected_length,
            location_variable: location.map(|(name, _)| name.to_string()),
            coordinates,
            data_variables,
            dropped_variables,
            trajectory_id: trajectory_id(attributes),
        };

        info!(
            "Trajectory '{}': {} samples on '{}', {} data variables, {} dropped",
            layout.trajectory_id,
            layout.expected_length,
            layout.reference_variable,
            layout.data_variables.len(),
            layout.dropped_variables.len()
        );

        Ok(layout)
    }

    /// Run the matchup and produce the aligned dataset
    pub fn build_dataset(
        &self,
        store: &ObservationStore,
        layout: &TrajectoryLayout,
        global_attributes: Vec<GlobalAttribute>,
    ) -> TrajectoryDataset {
        let mut names: Vec<&str> = layout
            .coordinates
            .iter()
            .filter_map(|slot| slot.source.as_deref())
            .collect();
        names.extend(layout.data_variables.iter().map(String::as_str));

        let engine = MatchupEngine::new(store, layout.mode);
        let alignment = engine.align(
            &layout.reference_times,
            &names,
            layout.location_variable.as_deref(),
        );
        let n = alignment.len();

        let mut variables = Vec::with_capacity(layout.coordinates.len() + layout.data_variables.len());

        for slot in &layout.coordinates {
            let series = slot.source.as_deref().and_then(|s| alignment.series(s));
            let values = match series {
                Some(series) => series
                    .values
                    .iter()
                    .map(|v| v.as_deref().and_then(parse_number))
                    .collect(),
                None => vec![None; n],
            };

            let mut attributes = VariableAttributes::new();
            let units = series
                .and_then(|s| s.unit.clone())
                .unwrap_or_else(|| slot.kind.default_units().to_string());
            attributes.insert("units".to_string(), units);
            attributes.insert(
                "standard_name".to_string(),
                slot.kind.standard_name().to_string(),
            );
            attributes.insert(
                "long_name".to_string(),
                slot.kind.standard_name().to_string(),
            );
            if let Some((min, max)) = slot.bounds {
                attributes.insert("valid_min".to_string(), min.to_string());
                attributes.insert("valid_max".to_string(), max.to_string());
            }

            variables.push(DataVariable {
                name: slot.kind.variable_name().to_string(),
                coordinate: Some(slot.kind),
                values: VariableValues::Float(values),
                attributes,
            });
        }

        for name in &layout.data_variables {
            let Some(series) = alignment.series(name) else {
                continue;
            };
            let mut attributes = VariableAttributes::new();
            attributes.insert("long_name".to_string(), name.clone());
            if let Some(unit) = &series.unit {
                attributes.insert("units".to_string(), unit.clone());
            }

            let values = VariableValues::from_matched(series.values.clone());
            if matches!(values, VariableValues::Text(_)) {
                debug!("Variable '{}' holds non-numeric values; keeping text", name);
            }

            variables.push(DataVariable {
                name: name.clone(),
                coordinate: None,
                values,
                attributes,
            });
        }

        let mut time_attributes = VariableAttributes::new();
        time_attributes.insert("units".to_string(), TIME_UNITS.to_string());
        time_attributes.insert("standard_name".to_string(), "time".to_string());
        time_attributes.insert("long_name".to_string(), "time".to_string());
        time_attributes.insert("axis".to_string(), "T".to_string());

        let mut trajectory_attributes = VariableAttributes::new();
        trajectory_attributes.insert("cf_role".to_string(), "trajectory_id".to_string());
        trajectory_attributes.insert("long_name".to_string(), "trajectory identifier".to_string());

        let mut freshness_attributes = VariableAttributes::new();
        if alignment.freshness.is_some() {
            freshness_attributes.insert("units".to_string(), FRESHNESS_UNITS.to_string());
            freshness_attributes.insert(
                "long_name".to_string(),
                "time since the most recent location fix".to_string(),
            );
        }

        let dataset = TrajectoryDataset {
            trajectory_id: layout.trajectory_id.clone(),
            mode: layout.mode,
            time: alignment.times,
            time_attributes,
            trajectory_attributes,
            variables,
            freshness: alignment.freshness,
            freshness_attributes,
            global_attributes,
            dropped_variables: layout.dropped_variables.clone(),
            matchup: alignment.stats,
        };
        debug_assert!(dataset.is_aligned());
        dataset
    }
}

/// `serial_number` when present and non-empty, `"1"` otherwise
pub fn trajectory_id(attributes: &[GlobalAttribute]) -> String {
    attributes
        .iter()
        .rev()
        .find(|a| a.name == SERIAL_NUMBER_ATTRIBUTE)
        .map(|a| a.value.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_TRAJECTORY_ID)
        .to_string()
}

/// Histogram bin edges as global attributes in the histogram group
pub fn bin_attributes(bins: &BinAggregator) -> Vec<GlobalAttribute> {
    let mut attributes = Vec::new();

    for base in bins.base_names() {
        let mut unit = None;
        for (edge, suffix) in [(BinEdge::Min, "bin_min"), (BinEdge::Max, "bin_max")] {
            let Some(edges) = bins.bins(edge, base) else {
                continue;
            };
            let mut values = Vec::new();
            for bin in edges {
                if unit.is_none() && !bin.unit.is_empty() {
                    unit = Some(bin.unit.clone());
                }
                values.push(bin.value.to_string());
            }
            attributes.push(
                GlobalAttribute::new(format!("{}_{}", base, suffix), values.join(","))
                    .with_group(HISTOGRAM_GROUP),
            );
        }
        if let Some(unit) = unit {
            attributes.push(
                GlobalAttribute::new(format!("{}_bin_units", base), unit).with_group(HISTOGRAM_GROUP),
            );
        }
    }

    attributes
}

/// Dimension lengths are stored as signed 32-bit integers
pub fn check_dimension(variable: &str, count: usize) -> Result<i32> {
    i32::try_from(count).map_err(|_| TagError::DimensionOverflow {
        variable: variable.to_string(),
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Observation;

    fn series(store: &mut ObservationStore, name: &str, times: impl IntoIterator<Item = i64>) {
        for t in times {
            store.insert(name, Observation::new(t, format!("{}.5", t), "u"));
        }
    }

    fn assembler(mode: MatchupMode) -> TrajectoryAssembler {
        let config = ConversionConfig::default().with_matchup_mode(mode);
        TrajectoryAssembler::new(Path::new("tag.txt"), &config)
    }

    #[test]
    fn test_dimension_limit() {
        assert_eq!(check_dimension("time", i32::MAX as usize).unwrap(), i32::MAX);
        assert_eq!(check_dimension("time", 0).unwrap(), 0);

        let result = check_dimension("latitude", i32::MAX as usize + 1);
        match result {
            Err(TagError::DimensionOverflow { variable, count }) => {
                assert_eq!(variable, "latitude");
                assert_eq!(count, 2_147_483_648);
            }
            other => panic!("expected a dimension overflow, got {:?}", other),
        }
    }

    #[test]
    fn test_tolerance_filter() {
        let mut store = ObservationStore::new();
        series(&mut store, "latitude", 0..100);
        series(&mut store, "longitude", 0..100);
        series(&mut store, "temperature", 0..90);
        series(&mut store, "light", 0..89);
        series(&mut store, "battery", 0..1);

        let layout = assembler(MatchupMode::OneLocationOneObservation)
            .assemble(&store, &[])
            .unwrap();

        assert_eq!(layout.expected_length, 100);
        assert_eq!(layout.data_variables, vec!["temperature"]);
        assert_eq!(layout.dropped_variables, vec!["battery", "light"]);
    }

    #[test]
    fn test_coordinates_always_present() {
        let mut store = ObservationStore::new();
        series(&mut store, "lat", [0, 60]);
        series(&mut store, "temp", [0, 60]);

        let assembler = assembler(MatchupMode::OneLocationOneObservation);
        let layout = assembler.assemble(&store, &[]).unwrap();
        assert_eq!(
            layout.variable_order(),
            vec!["time", "latitude", "longitude", "depth", "trajectory", "temp"]
        );

        let dataset = assembler.build_dataset(&store, &layout, Vec::new());
        assert!(dataset.is_aligned());
        let longitude = dataset.variable("longitude").unwrap();
        assert_eq!(longitude.values, VariableValues::Float(vec![None, None]));
        assert_eq!(longitude.attributes["units"], "degrees_east");
        let latitude = dataset.variable("latitude").unwrap();
        assert_eq!(latitude.attributes["valid_min"], "0.5");
        assert_eq!(latitude.attributes["valid_max"], "60.5");
    }

    #[test]
    fn test_missing_location_is_fatal_for_one_observation_mode() {
        let mut store = ObservationStore::new();
        series(&mut store, "temp", [0, 60]);

        let result = assembler(MatchupMode::OneLocationOneObservation).assemble(&store, &[]);
        assert!(matches!(result, Err(TagError::NoLocationData { .. })));

        let layout = assembler(MatchupMode::OneLocationManyObservations)
            .assemble(&store, &[])
            .unwrap();
        assert_eq!(layout.reference_variable, "temp");
        assert!(layout.location_variable.is_none());
    }

    #[test]
    fn test_empty_store() {
        let result =
            assembler(MatchupMode::OneLocationOneObservation).assemble(&ObservationStore::new(), &[]);
        assert!(matches!(result, Err(TagError::EmptyDataset { .. })));
    }

    #[test]
    fn test_many_observations_uses_densest_stream() {
        let mut store = ObservationStore::new();
        series(&mut store, "latitude", [0, 300]);
        series(&mut store, "depth", (0..10).map(|i| i * 60));
        series(&mut store, "temp", (0..10).map(|i| i * 60));

        let assembler = assembler(MatchupMode::OneLocationManyObservations);
        let layout = assembler.assemble(&store, &[]).unwrap();
        assert_eq!(layout.reference_variable, "depth");
        assert_eq!(layout.expected_length, 10);

        let dataset = assembler.build_dataset(&store, &layout, Vec::new());
        let freshness = dataset.freshness.as_ref().unwrap();
        assert_eq!(freshness[0], Some(0));
        assert_eq!(freshness[4], Some(240));
        assert_eq!(freshness[5], Some(0));
        assert!(layout.variable_order().contains(&"freshness"));
    }

    #[test]
    fn test_isolated_sample_is_not_on_the_axis() {
        let mut store = ObservationStore::new();
        series(&mut store, "latitude", [1000, 1060]);
        series(&mut store, "temp", [1000, 1060, 999_000]);

        let assembler = assembler(MatchupMode::OneLocationOneObservation);
        let layout = assembler.assemble(&store, &[]).unwrap();
        let dataset = assembler.build_dataset(&store, &layout, Vec::new());

        assert_eq!(dataset.time, vec![1000, 1060]);
        assert!(!dataset.time.contains(&999_000));
        assert_eq!(
            dataset.variable("temp").unwrap().values,
            VariableValues::Float(vec![Some(1000.5), Some(1060.5)])
        );
    }

    #[test]
    fn test_text_values_stay_text() {
        let values = VariableValues::from_matched(vec![
            Some("1.5".to_string()),
            None,
            Some("wet".to_string()),
        ]);
        assert!(matches!(values, VariableValues::Text(_)));
        assert_eq!(values.null_count(), 1);

        let numbers = VariableValues::from_matched(vec![Some("1.5".to_string()), None]);
        assert_eq!(numbers, VariableValues::Float(vec![Some(1.5), None]));
    }

    #[test]
    fn test_trajectory_id() {
        assert_eq!(trajectory_id(&[]), "1");
        assert_eq!(
            trajectory_id(&[GlobalAttribute::new("serial_number", "05A0001")]),
            "05A0001"
        );
        assert_eq!(
            trajectory_id(&[GlobalAttribute::new("serial_number", "  ")]),
            "1"
        );
    }

    #[test]
    fn test_bin_attributes() {
        let mut bins = BinAggregator::new();
        for fields in [
            ["", "", "10", "HistTempBin1", "Celsius"],
            ["", "", "20", "HistTempBin2", "Celsius"],
            ["", "", "15", "HistTempBinMax1", "Celsius"],
        ] {
            let fields: Vec<String> = fields.iter().map(|s| s.to_string()).collect();
            bins.record_bin(&fields).unwrap();
        }

        let attributes = bin_attributes(&bins);
        let lookup = |name: &str| {
            attributes
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.value.as_str())
        };
        assert_eq!(lookup("Temp_bin_min"), Some("10,20"));
        assert_eq!(lookup("Temp_bin_max"), Some("15"));
        assert_eq!(lookup("Temp_bin_units"), Some("Celsius"));
        assert!(attributes.iter().all(|a| a.group == HISTOGRAM_GROUP));
    }
}
