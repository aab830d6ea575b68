//! Time-shift projection: mapping GPX waypoint timestamps onto a planned
//! activity's timeline.
//!
//! Pure, stateless time arithmetic — no I/O. Three strategies:
//! - relative shift: preserve each waypoint's offset from the GPX start
//!   and replay it from the plan start,
//! - absolute: copy the recorded timestamps verbatim,
//! - none: no timing fields at all.
//!
//! `time_offset_seconds` is the stable quantity: it survives plan-start
//! edits, and `estimated_arrival` is always recomputable as
//! `plan_start + offset`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::Waypoint;

/// How waypoint timestamps map onto the plan timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingStrategy {
    /// Project each waypoint's offset from the GPX start onto the plan start
    RelativeTimeShift,
    /// Keep the recorded timestamps as the estimated arrivals
    AbsoluteTimes,
    /// Populate no timing fields
    NoTimes,
}

/// Category of a plan feature. Cascading ignores category; only the
/// plan-start recalculation is scoped to waypoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureCategory {
    Waypoint,
    Custom,
}

/// A plan itinerary feature produced from a GPX waypoint (or authored by
/// the user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanFeature {
    pub id: String,
    pub category: FeatureCategory,
    pub name: Option<String>,
    pub note: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    /// Recorded timestamp in the source GPX, when the strategy keeps it
    pub original_gpx_time: Option<DateTime<Utc>>,
    /// Offset from the source GPX's start; stable across plan-start edits
    pub time_offset_seconds: Option<i64>,
    /// Projected arrival on the plan timeline
    pub estimated_arrival: Option<DateTime<Utc>>,
    /// Position over the selected subset, starting at 0
    pub order_index: u32,
}

/// Conversion output: the features plus non-fatal warnings (e.g. missing
/// reference times under the relative strategy).
#[derive(Debug, Clone, Default)]
pub struct ConversionResult {
    pub features: Vec<PlanFeature>,
    pub warnings: Vec<String>,
}

/// Signed offset of a waypoint timestamp from the GPX start.
pub fn time_offset(waypoint_time: DateTime<Utc>, gpx_start_time: DateTime<Utc>) -> Duration {
    waypoint_time - gpx_start_time
}

/// Project an offset onto a new plan start.
pub fn apply_shift(offset: Duration, plan_start_time: DateTime<Utc>) -> DateTime<Utc> {
    plan_start_time + offset
}

/// Convert GPX waypoints into plan features under a timing strategy.
///
/// `selected_indices` picks a subset of the waypoints (all when `None`);
/// `order_index` increases monotonically from 0 over the selected subset,
/// not the original waypoint positions. Missing reference times under
/// [`TimingStrategy::RelativeTimeShift`] yield an untimed feature and a
/// warning — the feature keeps its position and name.
pub fn convert_waypoints_to_features(
    waypoints: &[Waypoint],
    gpx_start_time: Option<DateTime<Utc>>,
    plan_start_time: Option<DateTime<Utc>>,
    strategy: TimingStrategy,
    selected_indices: Option<&[usize]>,
) -> ConversionResult {
    let mut result = ConversionResult::default();

    let indices: Vec<usize> = match selected_indices {
        Some(selected) => selected
            .iter()
            .copied()
            .filter(|&i| i < waypoints.len())
            .collect(),
        None => (0..waypoints.len()).collect(),
    };

    for (order, &idx) in indices.iter().enumerate() {
        let waypoint = &waypoints[idx];
        let mut feature = PlanFeature {
            id: format!("wpt-{idx}"),
            category: FeatureCategory::Waypoint,
            name: waypoint.name.clone(),
            note: waypoint.note.clone(),
            lat: waypoint.lat,
            lon: waypoint.lon,
            elevation: waypoint.elevation,
            original_gpx_time: None,
            time_offset_seconds: None,
            estimated_arrival: None,
            order_index: order as u32,
        };

        match strategy {
            TimingStrategy::RelativeTimeShift => {
                match (waypoint.time, gpx_start_time, plan_start_time) {
                    (Some(time), Some(gpx_start), Some(plan_start)) => {
                        let offset = time_offset(time, gpx_start);
                        feature.original_gpx_time = Some(time);
                        feature.time_offset_seconds = Some(offset.num_seconds());
                        feature.estimated_arrival = Some(apply_shift(offset, plan_start));
                    }
                    _ => {
                        result.warnings.push(format!(
                            "waypoint {idx} left untimed: relative shift needs waypoint, GPX \
                             start, and plan start times"
                        ));
                    }
                }
            }
            TimingStrategy::AbsoluteTimes => {
                feature.original_gpx_time = waypoint.time;
                feature.estimated_arrival = waypoint.time;
            }
            TimingStrategy::NoTimes => {}
        }

        result.features.push(feature);
    }

    result
}

/// Cascade a manual arrival edit to downstream features.
///
/// When the target had a prior arrival, every feature with a strictly
/// greater `order_index` that already carries an arrival is shifted by
/// the same delta; untimed features are left untouched (the cascade
/// never invents times). Without a prior arrival there is no delta, so
/// only the target is set. Category is ignored.
pub fn cascade_time_update(
    features: &[PlanFeature],
    updated_feature_id: &str,
    new_arrival: DateTime<Utc>,
) -> Vec<PlanFeature> {
    let target = match features.iter().find(|f| f.id == updated_feature_id) {
        Some(target) => target,
        None => return features.to_vec(),
    };
    let target_order = target.order_index;
    let delta = target.estimated_arrival.map(|old| new_arrival - old);

    features
        .iter()
        .map(|feature| {
            let mut feature = feature.clone();
            if feature.id == updated_feature_id {
                feature.estimated_arrival = Some(new_arrival);
            } else if let (Some(delta), Some(arrival)) = (delta, feature.estimated_arrival) {
                if feature.order_index > target_order {
                    feature.estimated_arrival = Some(arrival + delta);
                }
            }
            feature
        })
        .collect()
}

/// Recompute arrivals after a plan-start change.
///
/// Only waypoint-category features carrying a stored offset are
/// recomputed; features without one keep whatever arrival they had
/// (absolute/no-time waypoints are deliberately not auto-corrected).
pub fn recalculate_all_times(
    features: &[PlanFeature],
    new_plan_start: DateTime<Utc>,
) -> Vec<PlanFeature> {
    features
        .iter()
        .map(|feature| {
            let mut feature = feature.clone();
            if feature.category == FeatureCategory::Waypoint {
                if let Some(offset) = feature.time_offset_seconds {
                    feature.estimated_arrival =
                        Some(new_plan_start + Duration::seconds(offset));
                }
            }
            feature
        })
        .collect()
}
