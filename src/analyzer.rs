//! Track analysis: per-point deltas, elevation totals, rest and turn
//! detection.
//!
//! The analyzer is a pure function over a parsed [`RawTrack`]. It never
//! fails: an empty point list yields an aggregate with all derived fields
//! empty or zero.

use crate::geo_utils::{bearing, bearing_change, haversine_distance, is_valid_coordinate};
use crate::{AnalyzedTrack, Bounds, RawTrack, RestPoint, TrackPoint, TurnPoint};

/// Configuration for the track analyzer.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Segments slower than this are considered stationary.
    /// Default: 0.5 m/s (slow walking pace)
    pub rest_velocity_threshold_mps: f64,

    /// Minimum dwell time before a stationary run becomes a rest point.
    /// Default: 300 seconds
    pub min_rest_duration_s: f64,

    /// Number of consecutive non-qualifying points tolerated inside a
    /// stationary run before it is closed. Default: 0 (a single moving
    /// point splits adjacent runs)
    pub rest_merge_gap_points: u32,

    /// Bearing change between consecutive segments above which a point
    /// counts as a sharp turn. Default: 60 degrees
    pub turn_angle_threshold_deg: f64,

    /// Segments shorter than this are skipped for turn detection; GPS
    /// jitter makes bearings meaningless at near-zero segment length.
    /// Default: 5 meters
    pub min_turn_segment_m: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            rest_velocity_threshold_mps: 0.5,
            min_rest_duration_s: 300.0,
            rest_merge_gap_points: 0,
            turn_angle_threshold_deg: 60.0,
            min_turn_segment_m: 5.0,
        }
    }
}

/// Analyze a parsed track: derive per-point deltas, accumulate distance and
/// elevation totals, and detect rest points, turn points, and the bounding
/// box.
///
/// # Example
/// ```
/// use track_analyzer::{analyzer::analyze, AnalyzerConfig, RawPoint, RawTrack};
///
/// let raw = RawTrack {
///     points: vec![RawPoint::new(51.5074, -0.1278), RawPoint::new(51.5090, -0.1300)],
///     ..RawTrack::default()
/// };
/// let track = analyze(&raw, &AnalyzerConfig::default());
/// assert_eq!(track.points.len(), 2);
/// assert!(track.total_distance_m > 0.0);
/// ```
pub fn analyze(raw: &RawTrack, config: &AnalyzerConfig) -> AnalyzedTrack {
    let points = derive_points(raw);

    let total_distance_m = points.iter().map(|p| p.delta_distance_m).sum();
    let mut elevation_gain_m = 0.0;
    let mut elevation_loss_m = 0.0;
    for point in &points {
        if let Some(delta) = point.delta_elevation_m {
            if delta > 0.0 {
                elevation_gain_m += delta;
            } else {
                elevation_loss_m += delta.abs();
            }
        }
    }

    let rest_points = detect_rest_points(&points, config);
    let turn_points = detect_turn_points(&points, config);
    let bounds = Bounds::from_coords(points.iter().map(|p| (p.lat, p.lon)));

    AnalyzedTrack {
        name: raw.name.clone(),
        points,
        waypoints: raw.waypoints.clone(),
        rest_points,
        turn_points,
        total_distance_m,
        elevation_gain_m,
        elevation_loss_m,
        bounds,
    }
}

/// Compute per-point deltas against the previous point in sequence.
/// Deltas are zero/`None` for the first point; distance is only
/// accumulated between valid coordinate pairs.
fn derive_points(raw: &RawTrack) -> Vec<TrackPoint> {
    let mut points = Vec::with_capacity(raw.points.len());
    let mut prev: Option<&crate::RawPoint> = None;

    for curr in &raw.points {
        let (delta_distance_m, delta_time_s, delta_elevation_m) = match prev {
            None => (0.0, None, None),
            Some(prev) => {
                let distance = if is_valid_coordinate(prev.lat, prev.lon)
                    && is_valid_coordinate(curr.lat, curr.lon)
                {
                    haversine_distance(prev.lat, prev.lon, curr.lat, curr.lon)
                } else {
                    0.0
                };
                let elapsed = match (prev.time, curr.time) {
                    (Some(a), Some(b)) => Some((b - a).num_milliseconds() as f64 / 1000.0),
                    _ => None,
                };
                let elevation = match (prev.elevation, curr.elevation) {
                    (Some(a), Some(b)) => Some(b - a),
                    _ => None,
                };
                (distance, elapsed, elevation)
            }
        };

        points.push(TrackPoint {
            lat: curr.lat,
            lon: curr.lon,
            elevation: curr.elevation,
            time: curr.time,
            delta_distance_m,
            delta_time_s,
            delta_elevation_m,
        });
        prev = Some(curr);
    }

    points
}

/// A stationary run under construction: point indices into the track.
struct RestRun {
    start_idx: usize,
    end_idx: usize,
    gap: u32,
}

/// Scan for runs of consecutive segments whose velocity stays below the
/// stationary threshold for at least the minimum dwell time, collapsing
/// each run into one rest point at the run's centroid.
///
/// Segments without a velocity sample (no timing data) never qualify:
/// stillness cannot be established without timestamps.
fn detect_rest_points(points: &[TrackPoint], config: &AnalyzerConfig) -> Vec<RestPoint> {
    let mut rest_points = Vec::new();
    let mut run: Option<RestRun> = None;

    for (idx, point) in points.iter().enumerate().skip(1) {
        let qualifies = point
            .velocity_mps()
            .map(|v| v < config.rest_velocity_threshold_mps)
            .unwrap_or(false);

        match (&mut run, qualifies) {
            (None, true) => {
                run = Some(RestRun {
                    start_idx: idx - 1,
                    end_idx: idx,
                    gap: 0,
                });
            }
            (Some(r), true) => {
                r.end_idx = idx;
                r.gap = 0;
            }
            (Some(r), false) => {
                r.gap += 1;
                if r.gap > config.rest_merge_gap_points {
                    if let Some(rest) = close_run(points, run.take().unwrap(), config) {
                        rest_points.push(rest);
                    }
                }
            }
            (None, false) => {}
        }
    }

    if let Some(run) = run {
        if let Some(rest) = close_run(points, run, config) {
            rest_points.push(rest);
        }
    }

    rest_points
}

/// Turn a completed stationary run into a rest point when it dwelt long
/// enough. The position is the centroid of the run's points.
fn close_run(points: &[TrackPoint], run: RestRun, config: &AnalyzerConfig) -> Option<RestPoint> {
    let slice = &points[run.start_idx..=run.end_idx];
    let start_time = slice.first()?.time?;
    let end_time = slice.last()?.time?;

    let duration_s = (end_time - start_time).num_milliseconds() as f64 / 1000.0;
    if duration_s < config.min_rest_duration_s {
        return None;
    }

    let count = slice.len() as f64;
    let lat = slice.iter().map(|p| p.lat).sum::<f64>() / count;
    let lon = slice.iter().map(|p| p.lon).sum::<f64>() / count;
    let elevations: Vec<f64> = slice.iter().filter_map(|p| p.elevation).collect();
    let elevation = if elevations.is_empty() {
        None
    } else {
        Some(elevations.iter().sum::<f64>() / elevations.len() as f64)
    };

    Some(RestPoint {
        lat,
        lon,
        elevation,
        start_time,
        end_time,
        rest_duration_minutes: duration_s / 60.0,
    })
}

/// Detect points where the bearing between consecutive segments changes
/// sharply. Short segments are skipped entirely.
fn detect_turn_points(points: &[TrackPoint], config: &AnalyzerConfig) -> Vec<TurnPoint> {
    let mut turns = Vec::new();

    for window in points.windows(3) {
        let (a, b, c) = (&window[0], &window[1], &window[2]);
        let incoming_m = haversine_distance(a.lat, a.lon, b.lat, b.lon);
        let outgoing_m = haversine_distance(b.lat, b.lon, c.lat, c.lon);
        if incoming_m < config.min_turn_segment_m || outgoing_m < config.min_turn_segment_m {
            continue;
        }

        let change = bearing_change(
            bearing(a.lat, a.lon, b.lat, b.lon),
            bearing(b.lat, b.lon, c.lat, c.lon),
        );
        if change > config.turn_angle_threshold_deg {
            turns.push(TurnPoint {
                lat: b.lat,
                lon: b.lon,
                bearing_change_deg: change,
            });
        }
    }

    turns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RawPoint;
    use chrono::{Duration, TimeZone, Utc};

    fn timed_point(lat: f64, lon: f64, minutes_in: i64) -> RawPoint {
        RawPoint {
            lat,
            lon,
            elevation: None,
            time: Some(
                Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes_in),
            ),
        }
    }

    #[test]
    fn test_empty_track_analyzes_to_empty_aggregate() {
        let track = analyze(&RawTrack::default(), &AnalyzerConfig::default());
        assert!(track.points.is_empty());
        assert_eq!(track.total_distance_m, 0.0);
        assert_eq!(track.elevation_gain_m, 0.0);
        assert!(track.rest_points.is_empty());
        assert!(track.turn_points.is_empty());
        assert!(track.bounds.is_none());
    }

    #[test]
    fn test_first_point_has_no_deltas() {
        let raw = RawTrack {
            points: vec![timed_point(51.5, -0.1, 0), timed_point(51.51, -0.1, 1)],
            ..RawTrack::default()
        };
        let track = analyze(&raw, &AnalyzerConfig::default());
        assert_eq!(track.points[0].delta_distance_m, 0.0);
        assert_eq!(track.points[0].delta_time_s, None);
        assert!(track.points[1].delta_distance_m > 0.0);
        assert_eq!(track.points[1].delta_time_s, Some(60.0));
    }

    #[test]
    fn test_elevation_gain_and_loss() {
        let mut points: Vec<RawPoint> = (0..4).map(|i| timed_point(51.5, -0.1, i)).collect();
        points[0].elevation = Some(100.0);
        points[1].elevation = Some(110.0);
        points[2].elevation = Some(105.0);
        points[3].elevation = Some(112.0);

        let raw = RawTrack {
            points,
            ..RawTrack::default()
        };
        let track = analyze(&raw, &AnalyzerConfig::default());
        assert!((track.elevation_gain_m - 17.0).abs() < 1e-9);
        assert!((track.elevation_loss_m - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_cumulative_distance_is_monotonic() {
        let raw = RawTrack {
            points: (0..20)
                .map(|i| timed_point(51.5 + i as f64 * 0.001, -0.1, i))
                .collect(),
            ..RawTrack::default()
        };
        let track = analyze(&raw, &AnalyzerConfig::default());

        let mut cumulative = 0.0;
        for point in &track.points {
            assert!(point.delta_distance_m >= 0.0);
            cumulative += point.delta_distance_m;
        }
        assert!((cumulative - track.total_distance_m).abs() < 1e-6);
    }

    #[test]
    fn test_stationary_run_collapses_to_one_rest_point() {
        // 5 points, no movement, 2.5-minute gaps: one 10-minute rest
        let raw = RawTrack {
            points: (0..5)
                .map(|i| RawPoint {
                    lat: 51.5,
                    lon: -0.1,
                    elevation: Some(20.0),
                    time: Some(
                        Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
                            + Duration::seconds(i * 150),
                    ),
                })
                .collect(),
            ..RawTrack::default()
        };
        let track = analyze(&raw, &AnalyzerConfig::default());

        assert_eq!(track.rest_points.len(), 1);
        let rest = &track.rest_points[0];
        assert!((rest.rest_duration_minutes - 10.0).abs() < 1e-9);
        assert_eq!(rest.lat, 51.5);
        assert_eq!(rest.elevation, Some(20.0));
        assert_eq!((rest.end_time - rest.start_time).num_seconds(), 600);
    }

    #[test]
    fn test_short_dwell_is_not_a_rest_point() {
        // Stationary for only 2 minutes, below the 5-minute default
        let raw = RawTrack {
            points: (0..3)
                .map(|i| timed_point(51.5, -0.1, i))
                .collect(),
            ..RawTrack::default()
        };
        let track = analyze(&raw, &AnalyzerConfig::default());
        assert!(track.rest_points.is_empty());
    }

    #[test]
    fn test_moving_point_splits_adjacent_runs() {
        // Two 10-minute stationary runs separated by one fast segment
        let mut points = Vec::new();
        for i in 0..5 {
            points.push(timed_point(51.5, -0.1, i * 3));
        }
        // Jump ~1.1 km away in one minute (fast segment breaks the run)
        for i in 0..5 {
            points.push(timed_point(51.51, -0.1, 13 + i * 3));
        }
        let raw = RawTrack {
            points,
            ..RawTrack::default()
        };
        let track = analyze(&raw, &AnalyzerConfig::default());
        assert_eq!(track.rest_points.len(), 2);
    }

    #[test]
    fn test_untimed_points_never_rest() {
        let raw = RawTrack {
            points: (0..10).map(|_| RawPoint::new(51.5, -0.1)).collect(),
            ..RawTrack::default()
        };
        let track = analyze(&raw, &AnalyzerConfig::default());
        assert!(track.rest_points.is_empty());
    }

    #[test]
    fn test_right_angle_is_a_turn_point() {
        // North, then east: a 90-degree turn at the middle point
        let raw = RawTrack {
            points: vec![
                timed_point(51.500, -0.100, 0),
                timed_point(51.505, -0.100, 1),
                timed_point(51.505, -0.090, 2),
            ],
            ..RawTrack::default()
        };
        let track = analyze(&raw, &AnalyzerConfig::default());
        assert_eq!(track.turn_points.len(), 1);
        assert!(track.turn_points[0].bearing_change_deg > 60.0);
        assert_eq!(track.turn_points[0].lat, 51.505);
    }

    #[test]
    fn test_straight_line_has_no_turn_points() {
        let raw = RawTrack {
            points: (0..5)
                .map(|i| timed_point(51.5 + i as f64 * 0.005, -0.1, i))
                .collect(),
            ..RawTrack::default()
        };
        let track = analyze(&raw, &AnalyzerConfig::default());
        assert!(track.turn_points.is_empty());
    }

    #[test]
    fn test_bounds_cover_all_points() {
        let raw = RawTrack {
            points: vec![timed_point(51.5, -0.2, 0), timed_point(51.7, -0.1, 1)],
            ..RawTrack::default()
        };
        let track = analyze(&raw, &AnalyzerConfig::default());
        let bounds = track.bounds.unwrap();
        assert_eq!(bounds.min_lat, 51.5);
        assert_eq!(bounds.max_lat, 51.7);
        assert_eq!(bounds.min_lon, -0.2);
        assert_eq!(bounds.max_lon, -0.1);
    }
}
