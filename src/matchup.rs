//! Time matchup of variable streams onto a reference axis.
//!
//! Under [`MatchupMode::OneLocationOneObservation`] each reference time takes
//! the nearest sample of every other variable, looking both backwards and
//! forwards; on an exact tie the earlier sample wins. Under
//! [`MatchupMode::OneLocationManyObservations`] only the latest sample at or
//! before the reference time is used, and the age of the location fix at each
//! reference time is recorded as freshness.
//!
//! A reference time with no usable sample for a variable leaves that one cell
//! empty; it never aborts the alignment.

use crate::config::MatchupMode;
use crate::models::Observation;
use crate::store::{ObservationStore, ObservationStream};
use tracing::{debug, warn};

/// One variable's values aligned to the reference axis
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSeries {
    pub name: String,
    pub unit: Option<String>,
    /// One entry per reference time; `None` where nothing matched
    pub values: Vec<Option<String>>,
}

/// Matchup accounting
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct MatchupStats {
    pub lookups: usize,
    pub exact_matches: usize,
    pub misses: usize,
    pub errors: Vec<String>,
}

/// All variables aligned onto one time axis
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub times: Vec<i64>,
    pub series: Vec<AlignedSeries>,
    /// Seconds since the latest location fix; many-observations mode only
    pub freshness: Option<Vec<Option<i64>>>,
    pub stats: MatchupStats,
}

impl Alignment {
    pub fn series(&self, name: &str) -> Option<&AlignedSeries> {
        self.series.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Nearest sample to `t`; the floor wins when both sides are equally far
pub fn nearest(stream: &ObservationStream, t: i64) -> Option<&Observation> {
    match (stream.floor(t), stream.ceiling(t)) {
        (Some(floor), Some(ceiling)) => {
            if t.abs_diff(floor.timestamp) <= ceiling.timestamp.abs_diff(t) {
                Some(floor)
            } else {
                Some(ceiling)
            }
        }
        (Some(floor), None) => Some(floor),
        (None, Some(ceiling)) => Some(ceiling),
        (None, None) => None,
    }
}

/// Latest sample at or before `t`
pub fn latest(stream: &ObservationStream, t: i64) -> Option<&Observation> {
    stream.floor(t)
}

/// Aligns streams from one store under a single matchup policy
#[derive(Debug, Clone, Copy)]
pub struct MatchupEngine<'a> {
    store: &'a ObservationStore,
    mode: MatchupMode,
}

impl<'a> MatchupEngine<'a> {
    pub fn new(store: &'a ObservationStore, mode: MatchupMode) -> Self {
        Self { store, mode }
    }

    fn lookup(&self, stream: &'a ObservationStream, t: i64) -> Option<&'a Observation> {
        match self.mode {
            MatchupMode::OneLocationOneObservation => nearest(stream, t),
            MatchupMode::OneLocationManyObservations => latest(stream, t),
        }
    }

    /// Align `variables` onto the ascending `reference_times`
    ///
    /// `location` names the stream whose fix age becomes the freshness array
    /// under the many-observations policy.
    pub fn align(
        &self,
        reference_times: &[i64],
        variables: &[&str],
        location: Option<&str>,
    ) -> Alignment {
        debug_assert!(reference_times.windows(2).all(|w| w[0] < w[1]));

        let mut stats = MatchupStats::default();
        let mut series = Vec::with_capacity(variables.len());

        for &name in variables {
            let stream = self.store.stream_for(name);
            let mut values = Vec::with_capacity(reference_times.len());
            let mut misses = 0usize;

            for &t in reference_times {
                stats.lookups += 1;
                match stream.and_then(|s| self.lookup(s, t)) {
                    Some(observation) => {
                        if observation.timestamp == t {
                            stats.exact_matches += 1;
                        }
                        values.push(Some(observation.value.clone()));
                    }
                    None => {
                        debug!("No matchup for '{}' at t={}", name, t);
                        stats
                            .errors
                            .push(format!("No matchup for '{}' at t={}", name, t));
                        misses += 1;
                        values.push(None);
                    }
                }
            }

            if misses > 0 {
                warn!(
                    "Variable '{}' unmatched at {} of {} reference times",
                    name,
                    misses,
                    reference_times.len()
                );
            }
            stats.misses += misses;

            series.push(AlignedSeries {
                name: name.to_string(),
                unit: stream.and_then(|s| s.unit()).map(str::to_string),
                values,
            });
        }

        let freshness = self
            .mode
            .records_freshness()
            .then(|| self.freshness(reference_times, location, &mut stats));

        Alignment {
            times: reference_times.to_vec(),
            series,
            freshness,
            stats,
        }
    }

    fn freshness(
        &self,
        reference_times: &[i64],
        location: Option<&str>,
        stats: &mut MatchupStats,
    ) -> Vec<Option<i64>> {
        let stream = location.and_then(|name| self.store.stream_for(name));
        reference_times
            .iter()
            .map(|&t| match stream.and_then(|s| s.floor(t)) {
                Some(fix) => Some(t - fix.timestamp),
                None => {
                    stats
                        .errors
                        .push(format!("No location fix at or before t={}", t));
                    None
                }
            })
            .collect()
    }
}
