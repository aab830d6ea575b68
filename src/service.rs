//! Analysis service: the primary GPX ingestion path.
//!
//! Orchestrates parse → analyze → encode → summarize. Failures on this
//! path are propagated, never swallowed: a parse error stays a
//! [`AnalysisError::Parse`] (so the boundary can decide to degrade), and
//! anything unexpected downstream is wrapped with filename context.

use std::sync::Arc;

use log::info;

use crate::analyzer::{analyze, AnalyzerConfig};
use crate::codec::encode_track;
use crate::error::{AnalysisError, Result};
use crate::parser::parse_gpx;
use crate::storage::{analyzed_key, BlobStore, Bucket};
use crate::summary::{extract_track_summary, SummaryConfig, TrackSummary};
use crate::AnalyzedTrack;

/// Outcome of one analysis run: the aggregate, its persistable blob form,
/// and the JSON-safe summary (`None` for a track with zero points).
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub analyzed_track: AnalyzedTrack,
    pub serialized_blob: Vec<u8>,
    pub summary: Option<TrackSummary>,
}

/// Service wrapping one analysis pipeline configuration and its storage
/// collaborator. Every call is independent; the service holds no mutable
/// state.
pub struct AnalysisService {
    store: Arc<dyn BlobStore>,
    analyzer_config: AnalyzerConfig,
    summary_config: SummaryConfig,
}

impl AnalysisService {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self::with_configs(store, AnalyzerConfig::default(), SummaryConfig::default())
    }

    pub fn with_configs(
        store: Arc<dyn BlobStore>,
        analyzer_config: AnalyzerConfig,
        summary_config: SummaryConfig,
    ) -> Self {
        Self {
            store,
            analyzer_config,
            summary_config,
        }
    }

    /// Parse and analyze raw GPX bytes.
    ///
    /// Fails with [`AnalysisError::InvalidInput`] on an empty payload and
    /// [`AnalysisError::Parse`] on malformed XML. Does not touch storage.
    pub fn analyze_gpx_data(&self, bytes: &[u8], filename: &str) -> Result<AnalysisResult> {
        if bytes.is_empty() {
            return Err(AnalysisError::invalid_input(format!(
                "empty GPX payload for '{filename}'"
            )));
        }

        let raw = parse_gpx(bytes)?;
        let analyzed_track = analyze(&raw, &self.analyzer_config);

        let serialized_blob = encode_track(&analyzed_track).map_err(|e| {
            AnalysisError::analysis_failure(filename, format!("artifact encoding failed: {e}"))
        })?;
        let summary = extract_track_summary(&analyzed_track, &self.summary_config);

        info!(
            "[Analysis] '{}': {} points, {:.0} m, {} rest points, {} waypoints",
            filename,
            analyzed_track.points.len(),
            analyzed_track.total_distance_m,
            analyzed_track.rest_points.len(),
            analyzed_track.waypoints.len(),
        );

        Ok(AnalysisResult {
            analyzed_track,
            serialized_blob,
            summary,
        })
    }

    /// Analyze raw GPX bytes and persist both artifacts: the raw file
    /// under `raw_key` and the analyzed blob under the derived key.
    pub fn analyze_and_store(&self, bytes: &[u8], raw_key: &str) -> Result<AnalysisResult> {
        let result = self.analyze_gpx_data(bytes, raw_key)?;

        self.store.save(raw_key, bytes, Bucket::RawFiles)?;
        self.store.save(
            &analyzed_key(raw_key),
            &result.serialized_blob,
            Bucket::AnalyzedTracks,
        )?;

        Ok(result)
    }

    /// Project an analyzed track into its summary using this service's
    /// configuration. `None` for a track with zero points.
    pub fn extract_track_summary(&self, track: &AnalyzedTrack) -> Option<TrackSummary> {
        extract_track_summary(track, &self.summary_config)
    }
}
