//! Position time series with named coordinate tracks.
//!
//! A [`PositionSeries`] owns one time column and any number of named tracks,
//! each holding one 3D position per sample. A single-device log uses one
//! track ([`DEFAULT_TRACK`]); a synchronized capture carries the rigid body,
//! every marker and the resampled gantry position side by side so that a
//! transform pipeline can act on a chosen subset of them.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::math::{Real, Vec3};

/// Track name used by single-track series.
pub const DEFAULT_TRACK: &str = "xyz";

/// One timestamped position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub time: Real,
    pub position: Vec3,
}

impl PositionSample {
    pub fn new(time: Real, x: Real, y: Real, z: Real) -> Self {
        Self {
            time,
            position: Vec3::new(x, y, z),
        }
    }
}

/// A named column of positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    #[serde(with = "crate::serde_undefined::points")]
    pub points: Vec<Vec3>,
}

/// Which tracks of a series an operation applies to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum TrackSelection {
    /// Every track in the series.
    #[default]
    All,
    /// Only the listed tracks; unknown names are an error.
    Named(Vec<String>),
}

impl TrackSelection {
    /// Select a single track by name.
    pub fn one(name: impl Into<String>) -> Self {
        TrackSelection::Named(vec![name.into()])
    }

    /// Resolve the selection into track indices of `series`.
    pub fn resolve(&self, series: &PositionSeries) -> Result<Vec<usize>, CoreError> {
        match self {
            TrackSelection::All => Ok((0..series.tracks.len()).collect()),
            TrackSelection::Named(names) => names
                .iter()
                .map(|name| series.index_of(name))
                .collect(),
        }
    }
}

/// Time-ordered position samples, possibly with several tracks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionSeries {
    time: Vec<Real>,
    tracks: Vec<Track>,
}

impl PositionSeries {
    /// Create an empty series over the given time column.
    ///
    /// # Errors
    ///
    /// Returns an error if the time column is not non-decreasing or contains
    /// undefined values.
    pub fn new(time: Vec<Real>) -> Result<Self, CoreError> {
        if time.iter().any(|t| t.is_nan()) {
            return Err(CoreError::Invalid(
                "time column contains undefined values".to_string(),
            ));
        }
        if let Some(idx) = time.windows(2).position(|w| w[1] < w[0]) {
            return Err(CoreError::UnsortedTime(idx + 1));
        }
        Ok(Self {
            time,
            tracks: Vec::new(),
        })
    }

    /// Create a series with a single [`DEFAULT_TRACK`].
    pub fn single(time: Vec<Real>, points: Vec<Vec3>) -> Result<Self, CoreError> {
        Self::new(time)?.with_track(DEFAULT_TRACK, points)
    }

    /// Build a single-track series from samples (which must be time-ordered).
    pub fn from_samples(samples: &[PositionSample]) -> Result<Self, CoreError> {
        let time = samples.iter().map(|s| s.time).collect();
        let points = samples.iter().map(|s| s.position).collect();
        Self::single(time, points)
    }

    /// Builder-style [`add_track`](Self::add_track).
    pub fn with_track(
        mut self,
        name: impl Into<String>,
        points: Vec<Vec3>,
    ) -> Result<Self, CoreError> {
        self.add_track(name, points)?;
        Ok(self)
    }

    /// Add a new track. Fails on a duplicate name or a length mismatch.
    pub fn add_track(&mut self, name: impl Into<String>, points: Vec<Vec3>) -> Result<(), CoreError> {
        let name = name.into();
        if self.index_of(&name).is_ok() {
            return Err(CoreError::DuplicateTrack(name));
        }
        self.check_len(&name, points.len())?;
        self.tracks.push(Track { name, points });
        Ok(())
    }

    /// Insert a track, replacing any existing track with the same name.
    pub fn set_track(&mut self, name: impl Into<String>, points: Vec<Vec3>) -> Result<(), CoreError> {
        let name = name.into();
        self.check_len(&name, points.len())?;
        match self.index_of(&name) {
            Ok(idx) => self.tracks[idx].points = points,
            Err(_) => self.tracks.push(Track { name, points }),
        }
        Ok(())
    }

    fn check_len(&self, name: &str, got: usize) -> Result<(), CoreError> {
        if got != self.time.len() {
            return Err(CoreError::TrackLength {
                name: name.to_string(),
                expected: self.time.len(),
                got,
            });
        }
        Ok(())
    }

    pub(crate) fn index_of(&self, name: &str) -> Result<usize, CoreError> {
        self.tracks
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| CoreError::UnknownTrack(name.to_string()))
    }

    pub fn time(&self) -> &[Real] {
        &self.time
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn has_track(&self, name: &str) -> bool {
        self.index_of(name).is_ok()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track_names(&self) -> impl Iterator<Item = &str> {
        self.tracks.iter().map(|t| t.name.as_str())
    }

    /// Positions of a named track.
    pub fn track(&self, name: &str) -> Result<&[Vec3], CoreError> {
        let idx = self.index_of(name)?;
        Ok(&self.tracks[idx].points)
    }

    pub fn track_mut(&mut self, name: &str) -> Result<&mut Vec<Vec3>, CoreError> {
        let idx = self.index_of(name)?;
        Ok(&mut self.tracks[idx].points)
    }

    pub(crate) fn tracks_mut(&mut self) -> &mut [Track] {
        &mut self.tracks
    }

    /// Samples of one track, in time order.
    pub fn samples<'a>(
        &'a self,
        name: &str,
    ) -> Result<impl Iterator<Item = PositionSample> + use<'a>, CoreError> {
        let points = self.track(name)?;
        Ok(self
            .time
            .iter()
            .zip(points.iter())
            .map(|(&time, &position)| PositionSample { time, position }))
    }

    /// Extract one track as a single-track series named [`DEFAULT_TRACK`].
    pub fn extract(&self, name: &str) -> Result<PositionSeries, CoreError> {
        let points = self.track(name)?.to_vec();
        Ok(PositionSeries {
            time: self.time.clone(),
            tracks: vec![Track {
                name: DEFAULT_TRACK.to_string(),
                points,
            }],
        })
    }

    /// Shift the time column by a constant, e.g. to change clock epoch.
    pub fn offset_time(&self, offset: Real) -> PositionSeries {
        PositionSeries {
            time: self.time.iter().map(|t| t + offset).collect(),
            tracks: self.tracks.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_series() -> PositionSeries {
        PositionSeries::single(
            vec![0.0, 1.0, 2.0],
            vec![Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)],
        )
        .unwrap()
    }

    #[test]
    fn rejects_unsorted_time() {
        let err = PositionSeries::new(vec![0.0, 2.0, 1.0]).unwrap_err();
        assert_eq!(err, CoreError::UnsortedTime(2));
    }

    #[test]
    fn rejects_track_length_mismatch() {
        let err = PositionSeries::new(vec![0.0, 1.0])
            .unwrap()
            .with_track("a", vec![Vec3::zeros()])
            .unwrap_err();
        assert!(matches!(err, CoreError::TrackLength { expected: 2, got: 1, .. }));
    }

    #[test]
    fn rejects_duplicate_track() {
        let err = sample_series()
            .with_track(DEFAULT_TRACK, vec![Vec3::zeros(); 3])
            .unwrap_err();
        assert_eq!(err, CoreError::DuplicateTrack(DEFAULT_TRACK.to_string()));
    }

    #[test]
    fn selection_resolves_names() {
        let series = sample_series()
            .with_track("other", vec![Vec3::zeros(); 3])
            .unwrap();
        assert_eq!(TrackSelection::All.resolve(&series).unwrap(), vec![0, 1]);
        assert_eq!(TrackSelection::one("other").resolve(&series).unwrap(), vec![1]);
        assert!(TrackSelection::one("missing").resolve(&series).is_err());
    }

    #[test]
    fn samples_iterate_in_order() {
        let series = sample_series();
        let samples: Vec<_> = series.samples(DEFAULT_TRACK).unwrap().collect();
        assert_eq!(samples[2], PositionSample::new(2.0, 2.0, 0.0, 0.0));
    }
}
