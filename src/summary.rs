//! JSON-safe summary projection of an analyzed track.
//!
//! The summary is a cache: it must always be derivable from the
//! [`AnalyzedTrack`] alone, so list views never need to decode the full
//! blob. All numeric rounding happens here, at the projection boundary,
//! never inside the analyzer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AnalyzedTrack, Bounds};

/// Configuration for the summary projection.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    /// Maximum number of evenly spaced elevation-profile samples; the
    /// final track point is force-included on top of this.
    /// Default: 200
    pub max_profile_points: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_profile_points: 200,
        }
    }
}

/// Lightweight statistics projection of an analyzed track.
///
/// Timestamps serialize as ISO-8601. `elevation_profile` is optional with
/// a serde default so summaries cached before the profile field existed
/// still deserialize; the retrieval service backfills it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub total_points: usize,
    pub total_distance_m: f64,
    pub total_distance_km: f64,
    pub duration_seconds: Option<f64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub max_elevation_m: Option<f64>,
    pub min_elevation_m: Option<f64>,
    pub average_velocity_mps: Option<f64>,
    pub max_velocity_mps: Option<f64>,
    pub rest_points_count: usize,
    pub total_rest_duration_seconds: f64,
    pub waypoints_count: usize,
    pub turn_points_count: usize,
    /// `[distance_m, elevation_m]` pairs along the accumulated-distance axis
    #[serde(default)]
    pub elevation_profile: Option<Vec<[f64; 2]>>,
    pub bounding_box: Option<Bounds>,
}

/// Round to 2 decimal places (general numeric boundary precision).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to 3 decimal places (distance boundary precision).
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Project an analyzed track into its summary.
///
/// Returns `None` for a track with zero points — the boundary renders
/// that as an empty JSON object.
pub fn extract_track_summary(track: &AnalyzedTrack, config: &SummaryConfig) -> Option<TrackSummary> {
    if track.points.is_empty() {
        return None;
    }

    let elevations: Vec<f64> = track.points.iter().filter_map(|p| p.elevation).collect();
    let max_elevation_m = elevations.iter().cloned().fold(None, fold_max);
    let min_elevation_m = elevations.iter().cloned().fold(None, fold_min);

    Some(TrackSummary {
        total_points: track.points.len(),
        total_distance_m: round3(track.total_distance_m),
        total_distance_km: round3(track.total_distance_m / 1000.0),
        duration_seconds: track.duration_seconds().map(round2),
        start_time: track.start_time(),
        end_time: track.end_time(),
        elevation_gain_m: round2(track.elevation_gain_m),
        elevation_loss_m: round2(track.elevation_loss_m),
        max_elevation_m: max_elevation_m.map(round2),
        min_elevation_m: min_elevation_m.map(round2),
        average_velocity_mps: track.average_velocity_mps().map(round2),
        max_velocity_mps: track.max_velocity_mps().map(round2),
        rest_points_count: track.rest_points.len(),
        total_rest_duration_seconds: round2(track.total_rest_duration_seconds()),
        waypoints_count: track.waypoints.len(),
        turn_points_count: track.turn_points.len(),
        elevation_profile: Some(extract_elevation_profile(track, config.max_profile_points)),
        bounding_box: track.bounds,
    })
}

/// Build the downsampled elevation profile: `[distance_m, elevation_m]`
/// pairs at evenly spaced indices over the accumulated-distance axis,
/// with the final sample always force-included.
pub fn extract_elevation_profile(track: &AnalyzedTrack, max_points: usize) -> Vec<[f64; 2]> {
    let mut samples = Vec::new();
    let mut cumulative = 0.0;
    for point in &track.points {
        cumulative += point.delta_distance_m;
        if let Some(elevation) = point.elevation {
            samples.push([round3(cumulative), round2(elevation)]);
        }
    }

    if max_points == 0 || samples.len() <= max_points {
        return samples;
    }

    let step = samples.len() as f64 / max_points as f64;
    let mut profile: Vec<[f64; 2]> = (0..max_points)
        .map(|i| samples[(i as f64 * step) as usize])
        .collect();

    // Always end the profile at the last raw sample
    let last = *samples.last().unwrap();
    if profile.last() != Some(&last) {
        profile.push(last);
    }

    profile
}

fn fold_max(acc: Option<f64>, value: f64) -> Option<f64> {
    Some(acc.map_or(value, |a| a.max(value)))
}

fn fold_min(acc: Option<f64>, value: f64) -> Option<f64> {
    Some(acc.map_or(value, |a| a.min(value)))
}
