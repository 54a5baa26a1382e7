//! Per-variable, time-ordered observation storage.
//!
//! Each variable accumulates into one [`ObservationStream`] keyed by epoch
//! seconds. Streams are `BTreeMap`s so that floor and ceiling lookups used by
//! the matchup engine are logarithmic, and iteration is always ascending.

use crate::constants::{
    DEPTH_ALIASES, DEPTH_VARIABLE, LATITUDE_ALIASES, LATITUDE_VARIABLE, LONGITUDE_ALIASES,
    LONGITUDE_VARIABLE,
};
use crate::models::Observation;
use std::collections::BTreeMap;

/// Role a stream plays in the trajectory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateKind {
    Latitude,
    Longitude,
    Depth,
}

impl CoordinateKind {
    /// Recognise a normalised stream name as a coordinate
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.to_ascii_lowercase();
        if LATITUDE_ALIASES.contains(&lowered.as_str()) {
            Some(CoordinateKind::Latitude)
        } else if LONGITUDE_ALIASES.contains(&lowered.as_str()) {
            Some(CoordinateKind::Longitude)
        } else if DEPTH_ALIASES.contains(&lowered.as_str()) {
            Some(CoordinateKind::Depth)
        } else {
            None
        }
    }

    /// Output column name
    pub fn variable_name(&self) -> &'static str {
        match self {
            CoordinateKind::Latitude => LATITUDE_VARIABLE,
            CoordinateKind::Longitude => LONGITUDE_VARIABLE,
            CoordinateKind::Depth => DEPTH_VARIABLE,
        }
    }

    pub fn standard_name(&self) -> &'static str {
        match self {
            CoordinateKind::Latitude => "latitude",
            CoordinateKind::Longitude => "longitude",
            CoordinateKind::Depth => "depth",
        }
    }

    pub fn default_units(&self) -> &'static str {
        match self {
            CoordinateKind::Latitude => "degrees_north",
            CoordinateKind::Longitude => "degrees_east",
            CoordinateKind::Depth => "m",
        }
    }
}

/// Strip quotes, trim, and replace spaces with underscores
pub fn normalize_name(raw: &str) -> String {
    raw.replace(['"', '\''], "").trim().replace(' ', "_")
}

/// All observations of one variable, ascending by timestamp
#[derive(Debug, Clone, Default)]
pub struct ObservationStream {
    entries: BTreeMap<i64, Observation>,
}

impl ObservationStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an observation; returns the one it replaced on a duplicate timestamp
    pub fn insert(&mut self, observation: Observation) -> Option<Observation> {
        self.entries.insert(observation.timestamp, observation)
    }

    pub fn get(&self, timestamp: i64) -> Option<&Observation> {
        self.entries.get(&timestamp)
    }

    /// Latest observation at or before `timestamp`
    pub fn floor(&self, timestamp: i64) -> Option<&Observation> {
        self.entries.range(..=timestamp).next_back().map(|(_, o)| o)
    }

    /// Earliest observation at or after `timestamp`
    pub fn ceiling(&self, timestamp: i64) -> Option<&Observation> {
        self.entries.range(timestamp..).next().map(|(_, o)| o)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.keys().copied()
    }

    pub fn observations(&self) -> impl Iterator<Item = &Observation> + '_ {
        self.entries.values()
    }

    /// Unit of the most recent observation that declared one
    pub fn unit(&self) -> Option<&str> {
        self.entries
            .values()
            .rev()
            .map(|o| o.unit.as_str())
            .find(|u| !u.is_empty())
    }

    /// Min and max over values that parse as numbers
    pub fn numeric_bounds(&self) -> Option<(f64, f64)> {
        self.entries
            .values()
            .filter_map(Observation::numeric_value)
            .fold(None, |bounds, v| match bounds {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Owned, per-file collection of observation streams
#[derive(Debug, Clone, Default)]
pub struct ObservationStore {
    streams: BTreeMap<String, ObservationStream>,
    duplicates: usize,
}

impl ObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an observation under a normalised variable name; last write wins
    pub fn insert(&mut self, variable: &str, observation: Observation) -> bool {
        let name = normalize_name(variable);
        let replaced = self.streams.entry(name).or_default().insert(observation);
        if replaced.is_some() {
            self.duplicates += 1;
        }
        replaced.is_some()
    }

    pub fn stream_for(&self, variable: &str) -> Option<&ObservationStream> {
        self.streams.get(&normalize_name(variable))
    }

    /// Variable with the most observations; the first name in order wins ties
    pub fn max_series_length(&self) -> Option<(&str, usize)> {
        self.streams
            .iter()
            .fold(None, |best: Option<(&str, usize)>, (name, stream)| match best {
                Some((_, count)) if count >= stream.len() => best,
                _ => Some((name.as_str(), stream.len())),
            })
    }

    /// First stream whose name matches the coordinate
    pub fn coordinate_stream(&self, kind: CoordinateKind) -> Option<(&str, &ObservationStream)> {
        self.streams
            .iter()
            .find(|(name, _)| CoordinateKind::from_name(name) == Some(kind))
            .map(|(name, stream)| (name.as_str(), stream))
    }

    /// Streams in lexicographic name order
    pub fn streams(&self) -> impl Iterator<Item = (&str, &ObservationStream)> + '_ {
        self.streams.iter().map(|(name, stream)| (name.as_str(), stream))
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicates
    }

    pub fn total_observations(&self) -> usize {
        self.streams.values().map(ObservationStream::len).sum()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
