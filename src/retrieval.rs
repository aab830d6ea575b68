//! Retrieval service: analyzed-artifact loading and the display fallback
//! chain.
//!
//! Display requests degrade through three tiers rather than surfacing a
//! hard failure:
//! 1. decode the persisted analyzed blob,
//! 2. recompute from the raw file (re-persisting the blob),
//! 3. raw-scan the bytes for coordinates and waypoints only.
//!
//! Only a missing raw file is a hard error. Each tier transition is
//! logged.

use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::analyzer::AnalyzerConfig;
use crate::codec::decode_track;
use crate::error::{AnalysisError, Result};
use crate::geo_utils::is_valid_coordinate;
use crate::parser::raw_scan;
use crate::service::AnalysisService;
use crate::storage::{analyzed_key, BlobStore, Bucket};
use crate::summary::{extract_elevation_profile, SummaryConfig, TrackSummary};
use crate::{AnalyzedTrack, RestPoint, Waypoint};

/// How much analysis backs a returned payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Served from the persisted analyzed artifact
    Complete,
    /// Artifact was missing or corrupt; recomputed from the raw file
    Recomputed,
    /// Analysis failed; raw-scanned coordinates only
    NotAttempted,
}

/// Map-rendering payload for one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPayload {
    /// `[lat, lon]` pairs at raw density, order-preserving
    pub coordinates: Vec<[f64; 2]>,
    pub waypoints: Vec<Waypoint>,
    pub rest_points: Vec<RestPoint>,
    /// Full summary, or `{}` / counts-only in degraded tiers
    pub track_summary: serde_json::Value,
    pub analysis_status: AnalysisStatus,
}

/// Service for reading analyzed artifacts back and building display
/// payloads. Holds its storage collaborator and an analysis service for
/// the recompute tier.
pub struct RetrievalService {
    store: Arc<dyn BlobStore>,
    analysis: AnalysisService,
    summary_config: SummaryConfig,
}

impl RetrievalService {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self::with_configs(store, AnalyzerConfig::default(), SummaryConfig::default())
    }

    pub fn with_configs(
        store: Arc<dyn BlobStore>,
        analyzer_config: AnalyzerConfig,
        summary_config: SummaryConfig,
    ) -> Self {
        let analysis = AnalysisService::with_configs(
            store.clone(),
            analyzer_config,
            summary_config.clone(),
        );
        Self {
            store,
            analysis,
            summary_config,
        }
    }

    /// Load and decode a persisted analyzed track.
    ///
    /// `Ok(None)` when the key is absent. A blob that exists but cannot
    /// be decoded is a [`AnalysisError::Deserialization`] error — the
    /// caller owns the fallback decision.
    pub fn get_analyzed_track(&self, key: &str, bucket: Bucket) -> Result<Option<AnalyzedTrack>> {
        match self.store.load(key, bucket)? {
            None => Ok(None),
            Some(blob) => decode_track(&blob).map(Some),
        }
    }

    /// Map track points to `[lat, lon]` pairs for map rendering.
    ///
    /// Order-preserving, raw density, silently skipping points with
    /// invalid coordinates.
    pub fn extract_coordinates(&self, track: &AnalyzedTrack) -> Vec<[f64; 2]> {
        track
            .points
            .iter()
            .filter(|p| is_valid_coordinate(p.lat, p.lon))
            .map(|p| [p.lat, p.lon])
            .collect()
    }

    /// Build the display payload for an analyzed track.
    ///
    /// A caller-supplied summary (e.g. from a metadata cache) is
    /// preferred; its elevation profile is backfilled from a fresh
    /// extraction when the cached copy predates the profile field.
    pub fn build_track_payload(
        &self,
        track: &AnalyzedTrack,
        cached_summary: Option<TrackSummary>,
    ) -> TrackPayload {
        let summary = match cached_summary {
            Some(mut summary) => {
                if summary.elevation_profile.is_none() {
                    summary.elevation_profile = Some(extract_elevation_profile(
                        track,
                        self.summary_config.max_profile_points,
                    ));
                }
                Some(summary)
            }
            None => self.analysis.extract_track_summary(track),
        };

        TrackPayload {
            coordinates: self.extract_coordinates(track),
            waypoints: track.waypoints.clone(),
            rest_points: track.rest_points.clone(),
            track_summary: summary
                .and_then(|s| serde_json::to_value(s).ok())
                .unwrap_or_else(|| json!({})),
            analysis_status: AnalysisStatus::Complete,
        }
    }

    /// Fetch the display payload for a raw file key, degrading through
    /// the three fallback tiers. Hard error only when the raw bytes
    /// cannot be located at all.
    pub fn fetch_track_display(&self, raw_key: &str) -> Result<TrackPayload> {
        // Tier 1: persisted analyzed artifact
        let blob_key = analyzed_key(raw_key);
        match self.get_analyzed_track(&blob_key, Bucket::AnalyzedTracks) {
            Ok(Some(track)) => return Ok(self.build_track_payload(&track, None)),
            Ok(None) => {
                info!("[Retrieval] no analyzed artifact for '{raw_key}', recomputing");
            }
            Err(e) => {
                warn!("[Retrieval] corrupt analyzed artifact for '{raw_key}': {e}");
            }
        }

        let bytes = self
            .store
            .load(raw_key, Bucket::RawFiles)?
            .ok_or_else(|| AnalysisError::storage(format!("raw file '{raw_key}' not found")))?;

        // Tier 2: recompute from the raw file and re-persist the artifact.
        // A racing duplicate overwrite is harmless: results are
        // deterministic for identical bytes.
        match self.analysis.analyze_gpx_data(&bytes, raw_key) {
            Ok(result) => {
                self.store
                    .save(&blob_key, &result.serialized_blob, Bucket::AnalyzedTracks)?;
                let mut payload = self.build_track_payload(&result.analyzed_track, result.summary);
                payload.analysis_status = AnalysisStatus::Recomputed;
                return Ok(payload);
            }
            Err(e) => {
                warn!("[Retrieval] reanalysis of '{raw_key}' failed, degrading to raw scan: {e}");
            }
        }

        // Tier 3: raw scan, coordinates and waypoints only
        let track = raw_scan(&bytes);
        let coordinates = track
            .points
            .iter()
            .filter(|p| p.is_valid())
            .map(|p| [p.lat, p.lon])
            .collect::<Vec<_>>();

        Ok(TrackPayload {
            track_summary: json!({
                "total_points": coordinates.len(),
                "waypoints_count": track.waypoints.len(),
            }),
            coordinates,
            waypoints: track.waypoints,
            rest_points: Vec::new(),
            analysis_status: AnalysisStatus::NotAttempted,
        })
    }
}
