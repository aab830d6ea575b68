//! # Track Analyzer
//!
//! GPX track analysis and derived trip statistics.
//!
//! This library provides:
//! - GPX parsing (strict, with a tolerant raw-scan fallback)
//! - Track analysis: distance, elevation gain/loss, velocity, rest and
//!   turn detection
//! - A persistable, versioned analyzed-track artifact with a JSON-safe
//!   summary projection
//! - Cross-file dashboard aggregation and time-shift projection of GPX
//!   waypoints onto planned itineraries
//!
//! ## Quick Start
//!
//! ```rust
//! use track_analyzer::{analyzer, parser, AnalyzerConfig};
//!
//! let gpx = br#"<?xml version="1.0"?>
//! <gpx version="1.1" creator="demo"><trk><trkseg>
//! <trkpt lat="51.5074" lon="-0.1278"><ele>10.0</ele></trkpt>
//! <trkpt lat="51.5080" lon="-0.1290"><ele>12.0</ele></trkpt>
//! </trkseg></trk></gpx>"#;
//!
//! let raw = parser::parse_gpx(gpx).unwrap();
//! let track = analyzer::analyze(&raw, &AnalyzerConfig::default());
//! assert!(track.total_distance_m > 0.0);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{AnalysisError, Result};

// Geographic utilities (distance, bearing, bounds calculations)
pub mod geo_utils;

// GPX parsing (strict parser + tolerant raw scan)
pub mod parser;
pub use parser::{parse_gpx, raw_scan};

// Track analysis (deltas, rest/turn detection)
pub mod analyzer;
pub use analyzer::{analyze, AnalyzerConfig};

// Summary projection (JSON-safe statistics + elevation profile)
pub mod summary;
pub use summary::{extract_track_summary, SummaryConfig, TrackSummary};

// Versioned binary codec for the persisted analyzed-track artifact
pub mod codec;
pub use codec::{decode_track, encode_track};

// Storage boundary (key-addressed blob store)
pub mod storage;
pub use storage::{analyzed_key, BlobStore, Bucket, MemoryBlobStore};

// Analysis service (parse -> analyze -> encode -> summarize)
pub mod service;
pub use service::{AnalysisResult, AnalysisService};

// Retrieval service (decode, payload build, three-tier fallback)
pub mod retrieval;
pub use retrieval::{AnalysisStatus, RetrievalService, TrackPayload};

// Dashboard aggregation across a trip's files
pub mod dashboard;
pub use dashboard::{DashboardAggregator, DashboardPayload, GpxEntry, PhotoEntry};

// Time-shift projection of waypoints onto planned itineraries
pub mod timeshift;
pub use timeshift::{
    cascade_time_update, convert_waypoints_to_features, recalculate_all_times, ConversionResult,
    FeatureCategory, PlanFeature, TimingStrategy,
};

// Plan-ingestion waypoint synthesis
pub mod plan;
pub use plan::{detect_waypoints, DetectedWaypoint};

// ============================================================================
// Core Types
// ============================================================================

/// A point as it came out of the parser: position plus optional elevation
/// and timestamp, before any deltas are derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

impl RawPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            elevation: None,
            time: None,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        geo_utils::is_valid_coordinate(self.lat, self.lon)
    }
}

/// Parser output: one main track in document order plus file-level waypoints.
///
/// This is the single canonical shape every input representation is
/// normalized into at the parser boundary; downstream components never see
/// third-party point types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTrack {
    /// Track name from the file, if present
    pub name: Option<String>,
    /// Track points in document order (not reordered or deduplicated)
    pub points: Vec<RawPoint>,
    /// Explicit `<wpt>` elements in insertion order
    pub waypoints: Vec<Waypoint>,
}

/// One recorded fix with its per-point deltas relative to the previous
/// point in the track. Deltas are zero/`None` for the first point.
/// Immutable once computed; owned by the track it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    /// Haversine distance to the previous point in meters
    pub delta_distance_m: f64,
    /// Elapsed time since the previous point in seconds
    pub delta_time_s: Option<f64>,
    /// Elevation change since the previous point in meters
    pub delta_elevation_m: Option<f64>,
}

impl TrackPoint {
    /// Per-segment velocity in m/s, only when the segment has positive
    /// elapsed time. Zero-time segments contribute no velocity sample.
    pub fn velocity_mps(&self) -> Option<f64> {
        match self.delta_time_s {
            Some(dt) if dt > 0.0 => Some(self.delta_distance_m / dt),
            _ => None,
        }
    }
}

/// An explicit GPX `<wpt>` element. Independent of track points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub note: Option<String>,
}

/// A detected stationary cluster, collapsed to the run's centroid.
/// Never present in the source file; always computed by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RestPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub rest_duration_minutes: f64,
}

/// A point where track bearing changes sharply between consecutive segments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurnPoint {
    pub lat: f64,
    pub lon: f64,
    pub bearing_change_deg: f64,
}

/// Bounding box for a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    /// Create bounds from an iterator of `(lat, lon)` pairs, ignoring
    /// invalid coordinates. Returns `None` when no valid pair exists.
    pub fn from_coords(coords: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut bounds: Option<Bounds> = None;
        for (lat, lon) in coords {
            if !geo_utils::is_valid_coordinate(lat, lon) {
                continue;
            }
            match &mut bounds {
                None => {
                    bounds = Some(Bounds {
                        min_lat: lat,
                        max_lat: lat,
                        min_lon: lon,
                        max_lon: lon,
                    })
                }
                Some(b) => {
                    b.min_lat = b.min_lat.min(lat);
                    b.max_lat = b.max_lat.max(lat);
                    b.min_lon = b.min_lon.min(lon);
                    b.max_lon = b.max_lon.max(lon);
                }
            }
        }
        bounds
    }
}

/// Aggregate produced by one analysis run: the main track with derived
/// deltas, the file's waypoints, and everything the analyzer detected.
///
/// The serialized blob is the durable form; an in-memory `AnalyzedTrack`
/// is a cache of it and is never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedTrack {
    pub name: Option<String>,
    pub points: Vec<TrackPoint>,
    pub waypoints: Vec<Waypoint>,
    pub rest_points: Vec<RestPoint>,
    pub turn_points: Vec<TurnPoint>,
    /// Cumulative track distance in meters
    pub total_distance_m: f64,
    /// Sum of positive elevation deltas in meters
    pub elevation_gain_m: f64,
    /// Sum of absolute negative elevation deltas in meters
    pub elevation_loss_m: f64,
    pub bounds: Option<Bounds>,
}

impl AnalyzedTrack {
    /// Timestamp of the first timed point.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.points.iter().find_map(|p| p.time)
    }

    /// Timestamp of the last timed point.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.points.iter().rev().find_map(|p| p.time)
    }

    /// Elapsed duration between first and last timed points, in seconds.
    pub fn duration_seconds(&self) -> Option<f64> {
        match (self.start_time(), self.end_time()) {
            (Some(start), Some(end)) => {
                Some((end - start).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }

    /// Total rest duration across all detected rest points, in seconds.
    pub fn total_rest_duration_seconds(&self) -> f64 {
        self.rest_points
            .iter()
            .map(|r| r.rest_duration_minutes * 60.0)
            .sum()
    }

    /// Largest per-segment velocity sample in m/s.
    pub fn max_velocity_mps(&self) -> Option<f64> {
        self.points
            .iter()
            .filter_map(|p| p.velocity_mps())
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }

    /// Average velocity as total distance over total elapsed duration.
    /// `None` (not zero) when the track carries no usable duration.
    pub fn average_velocity_mps(&self) -> Option<f64> {
        match self.duration_seconds() {
            Some(d) if d > 0.0 => Some(self.total_distance_m / d),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
