//! Plan-ingestion waypoint detection.
//!
//! When a GPX file carries no explicit `<wpt>` elements, a minimal
//! itinerary is synthesized from the analyzed track so a plan always has
//! start/end checkpoints when the recording carries them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AnalyzedTrack, TrackPoint};

/// Maximum number of rest stops synthesized into an itinerary.
const MAX_SYNTHESIZED_REST_STOPS: usize = 10;

/// A waypoint candidate for plan ingestion, from real GPX waypoints or
/// synthesized from the track itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedWaypoint {
    pub name: Option<String>,
    pub note: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

/// Extract plan waypoint candidates from an analyzed track.
///
/// Real GPX waypoints are used when present. Otherwise the itinerary is
/// synthesized: the track's first point ("Start"), last point ("End"),
/// and up to the first ten rest points ("Rest Stop N", 1-indexed).
pub fn detect_waypoints(track: &AnalyzedTrack) -> Vec<DetectedWaypoint> {
    if !track.waypoints.is_empty() {
        return track
            .waypoints
            .iter()
            .map(|w| DetectedWaypoint {
                name: w.name.clone(),
                note: w.note.clone(),
                lat: w.lat,
                lon: w.lon,
                elevation: w.elevation,
                time: w.time,
            })
            .collect();
    }

    let mut detected = Vec::new();

    if let Some(first) = track.points.first() {
        detected.push(track_point_waypoint(first, "Start"));
    }
    if track.points.len() > 1 {
        if let Some(last) = track.points.last() {
            detected.push(track_point_waypoint(last, "End"));
        }
    }

    for (i, rest) in track
        .rest_points
        .iter()
        .take(MAX_SYNTHESIZED_REST_STOPS)
        .enumerate()
    {
        detected.push(DetectedWaypoint {
            name: Some(format!("Rest Stop {}", i + 1)),
            note: None,
            lat: rest.lat,
            lon: rest.lon,
            elevation: rest.elevation,
            time: Some(rest.start_time),
        });
    }

    detected
}

fn track_point_waypoint(point: &TrackPoint, name: &str) -> DetectedWaypoint {
    DetectedWaypoint {
        name: Some(name.to_string()),
        note: None,
        lat: point.lat,
        lon: point.lon,
        elevation: point.elevation,
        time: point.time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RestPoint, Waypoint};
    use chrono::{Duration, TimeZone, Utc};

    fn point(lat: f64, minutes_in: i64) -> TrackPoint {
        TrackPoint {
            lat,
            lon: -0.1,
            elevation: None,
            time: Some(
                Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes_in),
            ),
            delta_distance_m: 0.0,
            delta_time_s: None,
            delta_elevation_m: None,
        }
    }

    fn rest(lat: f64) -> RestPoint {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        RestPoint {
            lat,
            lon: -0.1,
            elevation: None,
            start_time: start,
            end_time: start + Duration::minutes(10),
            rest_duration_minutes: 10.0,
        }
    }

    #[test]
    fn test_real_waypoints_are_preferred() {
        let track = AnalyzedTrack {
            points: vec![point(51.5, 0), point(51.6, 60)],
            waypoints: vec![Waypoint {
                lat: 51.55,
                lon: -0.1,
                elevation: None,
                time: None,
                name: Some("Cafe".to_string()),
                note: Some("coffee".to_string()),
            }],
            rest_points: vec![rest(51.52)],
            ..Default::default()
        };

        let detected = detect_waypoints(&track);
        assert_eq!(detected.len(), 1);
        assert_eq!(detected[0].name.as_deref(), Some("Cafe"));
    }

    #[test]
    fn test_synthesizes_start_end_and_rest_stops() {
        let track = AnalyzedTrack {
            points: vec![point(51.5, 0), point(51.6, 60)],
            rest_points: vec![rest(51.52), rest(51.55)],
            ..Default::default()
        };

        let detected = detect_waypoints(&track);
        assert_eq!(detected.len(), 4);
        assert_eq!(detected[0].name.as_deref(), Some("Start"));
        assert_eq!(detected[0].lat, 51.5);
        assert_eq!(detected[1].name.as_deref(), Some("End"));
        assert_eq!(detected[1].lat, 51.6);
        assert_eq!(detected[2].name.as_deref(), Some("Rest Stop 1"));
        assert_eq!(detected[3].name.as_deref(), Some("Rest Stop 2"));
    }

    #[test]
    fn test_rest_stops_capped_at_ten() {
        let track = AnalyzedTrack {
            points: vec![point(51.5, 0), point(51.6, 60)],
            rest_points: (0..15).map(|i| rest(51.5 + i as f64 * 0.001)).collect(),
            ..Default::default()
        };

        let detected = detect_waypoints(&track);
        assert_eq!(detected.len(), 12); // Start + End + 10 rest stops
        assert_eq!(detected.last().unwrap().name.as_deref(), Some("Rest Stop 10"));
    }

    #[test]
    fn test_empty_track_detects_nothing() {
        assert!(detect_waypoints(&AnalyzedTrack::default()).is_empty());
    }

    #[test]
    fn test_single_point_track_yields_start_only() {
        let track = AnalyzedTrack {
            points: vec![point(51.5, 0)],
            ..Default::default()
        };
        let detected = detect_waypoints(&track);
        assert_eq!(detected.len(), 1);
        assert_eq!(detected[0].name.as_deref(), Some("Start"));
    }
}
