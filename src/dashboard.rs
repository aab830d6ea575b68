//! Dashboard aggregation: cross-file trip statistics.
//!
//! Combines the cached summaries of every GPX file scoped to a trip with
//! photo capture metadata. The elevation profile and rest points come
//! from exactly one "primary" file — the first in upload order whose
//! analyzed artifact is present and decodable — never merged across
//! files. Numeric rounding happens here, at the boundary, so sums never
//! compound rounding error.

use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::retrieval::RetrievalService;
use crate::storage::{analyzed_key, BlobStore, Bucket};
use crate::summary::{round2, round3, TrackSummary};
use crate::AnalyzedTrack;

/// One GPX file scoped to a trip, in upload order, with its cached
/// summary when one was persisted.
#[derive(Debug, Clone)]
pub struct GpxEntry {
    pub file_key: String,
    pub summary: Option<TrackSummary>,
}

/// One photo scoped to a trip; only the capture timestamp matters here.
#[derive(Debug, Clone)]
pub struct PhotoEntry {
    pub photo_id: String,
    pub taken_at: Option<DateTime<Utc>>,
}

/// Summed statistics across all of a trip's GPX files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripStatistics {
    pub gpx_files_count: usize,
    pub total_distance_km: f64,
    pub total_elevation_gain_m: f64,
    pub total_elevation_loss_m: f64,
    pub total_duration_seconds: f64,
    pub total_rest_duration_seconds: f64,
    /// Max of per-file maxima; `None` only when no file contributes one
    pub max_elevation_m: Option<f64>,
    /// Total distance over total duration; `None` (not zero) when the
    /// trip carries no duration
    pub average_speed_mps: Option<f64>,
}

/// Hourly activity heatmap over photo capture timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityHeatmap {
    /// Photo counts per hour-of-day bucket (0..24)
    pub hourly_counts: Vec<u32>,
    pub peak_hour: Option<u32>,
    pub peak_count: Option<u32>,
}

/// A rest point positioned along the primary track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardRestPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub rest_duration_minutes: f64,
    /// Cumulative distance at or before the rest start; `None` when no
    /// table entry precedes it (never extrapolated)
    pub distance_from_start_km: Option<f64>,
}

/// Complete dashboard payload for one trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardPayload {
    pub trip_id: String,
    pub statistics: TripStatistics,
    /// Profile of the primary file only; `None` when no file has a
    /// decodable analyzed artifact
    pub elevation_profile: Option<Vec<[f64; 2]>>,
    pub rest_points: Vec<DashboardRestPoint>,
    pub heatmap: ActivityHeatmap,
    pub primary_file_key: Option<String>,
}

/// Builds dashboard payloads from cached summaries plus the primary
/// file's analyzed artifact.
pub struct DashboardAggregator {
    store: Arc<dyn BlobStore>,
    retrieval: RetrievalService,
}

impl DashboardAggregator {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        let retrieval = RetrievalService::new(store.clone());
        Self { store, retrieval }
    }

    /// Build the dashboard for one trip.
    ///
    /// `gpx_entries` must be in upload order: the primary-file tie-break
    /// is first-by-upload-order, deliberately not an unordered
    /// collection's iteration order.
    pub fn build_dashboard(
        &self,
        trip_id: &str,
        gpx_entries: &[GpxEntry],
        photo_entries: &[PhotoEntry],
    ) -> Result<DashboardPayload> {
        let statistics = sum_statistics(gpx_entries);
        let heatmap = build_heatmap(photo_entries);

        let primary = self.find_primary(gpx_entries)?;
        let (primary_file_key, elevation_profile, rest_points) = match primary {
            Some((key, track)) => {
                let profile = crate::summary::extract_elevation_profile(&track, 200);
                let rest_points = position_rest_points(&track);
                (Some(key), Some(profile), rest_points)
            }
            None => (None, None, Vec::new()),
        };

        Ok(DashboardPayload {
            trip_id: trip_id.to_string(),
            statistics,
            elevation_profile,
            rest_points,
            heatmap,
            primary_file_key,
        })
    }

    /// First file in upload order with a decodable analyzed artifact.
    /// An undecodable artifact is skipped, not fatal, so one corrupt
    /// blob cannot blank the whole dashboard.
    fn find_primary(&self, entries: &[GpxEntry]) -> Result<Option<(String, AnalyzedTrack)>> {
        for entry in entries {
            let key = analyzed_key(&entry.file_key);
            if !self.store.exists(&key, Bucket::AnalyzedTracks)? {
                continue;
            }
            match self.retrieval.get_analyzed_track(&key, Bucket::AnalyzedTracks) {
                Ok(Some(track)) => return Ok(Some((entry.file_key.clone(), track))),
                Ok(None) => continue,
                Err(e) => {
                    warn!(
                        "[Dashboard] skipping corrupt artifact for '{}': {e}",
                        entry.file_key
                    );
                }
            }
        }
        Ok(None)
    }
}

/// Sum the cached per-file summaries into trip totals. Files without a
/// cached summary still count toward the file total but contribute no
/// statistics.
fn sum_statistics(entries: &[GpxEntry]) -> TripStatistics {
    let mut total_distance_m = 0.0;
    let mut total_gain = 0.0;
    let mut total_loss = 0.0;
    let mut total_duration = 0.0;
    let mut total_rest = 0.0;
    let mut max_elevation: Option<f64> = None;

    for summary in entries.iter().filter_map(|e| e.summary.as_ref()) {
        total_distance_m += summary.total_distance_m;
        total_gain += summary.elevation_gain_m;
        total_loss += summary.elevation_loss_m;
        total_duration += summary.duration_seconds.unwrap_or(0.0);
        total_rest += summary.total_rest_duration_seconds;
        if let Some(elevation) = summary.max_elevation_m {
            max_elevation = Some(max_elevation.map_or(elevation, |m| m.max(elevation)));
        }
    }

    let average_speed_mps = if total_duration > 0.0 {
        Some(round2(total_distance_m / total_duration))
    } else {
        None
    };

    TripStatistics {
        gpx_files_count: entries.len(),
        total_distance_km: round3(total_distance_m / 1000.0),
        total_elevation_gain_m: round2(total_gain),
        total_elevation_loss_m: round2(total_loss),
        total_duration_seconds: round2(total_duration),
        total_rest_duration_seconds: round2(total_rest),
        max_elevation_m: max_elevation.map(round2),
        average_speed_mps,
    }
}

/// Bucket photo capture timestamps into 24 hourly bins. The bucket is
/// the plain hour component of each timestamp, not timezone-adjusted.
fn build_heatmap(photos: &[PhotoEntry]) -> ActivityHeatmap {
    let mut hourly_counts = vec![0u32; 24];
    let mut any = false;

    for taken_at in photos.iter().filter_map(|p| p.taken_at) {
        hourly_counts[taken_at.hour() as usize] += 1;
        any = true;
    }

    let (peak_hour, peak_count) = if any {
        let (hour, count) = hourly_counts
            .iter()
            .enumerate()
            .max_by_key(|(_, &count)| count)
            .map(|(hour, &count)| (hour as u32, count))
            .unwrap_or((0, 0));
        (Some(hour), Some(count))
    } else {
        (None, None)
    };

    ActivityHeatmap {
        hourly_counts,
        peak_hour,
        peak_count,
    }
}

/// Position the primary track's rest points along the route using a
/// time → cumulative-distance table walked over the track.
fn position_rest_points(track: &AnalyzedTrack) -> Vec<DashboardRestPoint> {
    let mut table: Vec<(DateTime<Utc>, f64)> = Vec::new();
    let mut cumulative = 0.0;
    for point in &track.points {
        cumulative += point.delta_distance_m;
        if let Some(time) = point.time {
            table.push((time, cumulative));
        }
    }

    track
        .rest_points
        .iter()
        .map(|rest| {
            let distance_from_start_km = table
                .iter()
                .take_while(|(time, _)| *time <= rest.start_time)
                .last()
                .map(|(_, distance)| round3(distance / 1000.0));
            DashboardRestPoint {
                lat: rest.lat,
                lon: rest.lon,
                elevation: rest.elevation,
                start_time: rest.start_time,
                end_time: rest.end_time,
                rest_duration_minutes: round2(rest.rest_duration_minutes),
                distance_from_start_km,
            }
        })
        .collect()
}
