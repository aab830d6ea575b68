//! Versioned binary codec for the persisted analyzed-track artifact.
//!
//! The blob is a 4-byte magic (`ATRK`), one version byte, then a postcard
//! body. The framing is owned by this crate so the artifact stays
//! decodable regardless of any third-party library's in-memory layout.
//! Stability is only guaranteed within the same installation; the blob is
//! not a network-facing format.

use crate::error::{AnalysisError, Result};
use crate::AnalyzedTrack;

const MAGIC: &[u8; 4] = b"ATRK";
const VERSION: u8 = 1;

/// Serialize an analyzed track into its persistable blob form.
pub fn encode_track(track: &AnalyzedTrack) -> Result<Vec<u8>> {
    let body = postcard::to_allocvec(track)
        .map_err(|e| AnalysisError::deserialization(format!("encode failed: {e}")))?;

    let mut blob = Vec::with_capacity(MAGIC.len() + 1 + body.len());
    blob.extend_from_slice(MAGIC);
    blob.push(VERSION);
    blob.extend_from_slice(&body);
    Ok(blob)
}

/// Decode a persisted blob back into the in-memory aggregate.
///
/// Fails with [`AnalysisError::Deserialization`] on a wrong magic,
/// unsupported version, or corrupt body.
pub fn decode_track(blob: &[u8]) -> Result<AnalyzedTrack> {
    if blob.len() < MAGIC.len() + 1 {
        return Err(AnalysisError::deserialization("blob too short"));
    }
    if &blob[..MAGIC.len()] != MAGIC {
        return Err(AnalysisError::deserialization("bad magic"));
    }
    let version = blob[MAGIC.len()];
    if version != VERSION {
        return Err(AnalysisError::deserialization(format!(
            "unsupported artifact version {version}"
        )));
    }

    postcard::from_bytes(&blob[MAGIC.len() + 1..])
        .map_err(|e| AnalysisError::deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{analyze, AnalyzerConfig};
    use crate::{RawPoint, RawTrack};
    use chrono::{Duration, TimeZone, Utc};

    fn sample_track() -> AnalyzedTrack {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let raw = RawTrack {
            name: Some("loop".to_string()),
            points: (0..30)
                .map(|i| RawPoint {
                    lat: 51.5 + i as f64 * 0.001,
                    lon: -0.1,
                    elevation: Some(10.0 + i as f64),
                    time: Some(start + Duration::seconds(i * 30)),
                })
                .collect(),
            waypoints: vec![],
        };
        analyze(&raw, &AnalyzerConfig::default())
    }

    #[test]
    fn test_round_trip_reproduces_aggregate() {
        let track = sample_track();
        let blob = encode_track(&track).unwrap();
        let decoded = decode_track(&blob).unwrap();

        assert_eq!(decoded.points.len(), track.points.len());
        assert_eq!(decoded.total_distance_m, track.total_distance_m);
        assert_eq!(decoded.rest_points.len(), track.rest_points.len());
        assert_eq!(decoded, track);
    }

    #[test]
    fn test_blob_starts_with_magic_and_version() {
        let blob = encode_track(&sample_track()).unwrap();
        assert_eq!(&blob[..4], b"ATRK");
        assert_eq!(blob[4], 1);
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut blob = encode_track(&sample_track()).unwrap();
        blob[0] = b'X';
        assert!(matches!(
            decode_track(&blob),
            Err(AnalysisError::Deserialization { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut blob = encode_track(&sample_track()).unwrap();
        blob[4] = 99;
        assert!(decode_track(&blob).is_err());
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let blob = encode_track(&sample_track()).unwrap();
        assert!(decode_track(&blob[..blob.len() / 2]).is_err());
        assert!(decode_track(b"AT").is_err());
    }
}
