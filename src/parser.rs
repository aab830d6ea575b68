//! GPX parsing: a strict parser plus a degraded raw-scan fallback.
//!
//! Both parsers are pure transforms over raw bytes and normalize their
//! input into [`RawTrack`] at this boundary, so downstream components see
//! exactly one point shape:
//! - [`parse_gpx`]: schema-aware parse via the `gpx` crate. Fails with
//!   [`AnalysisError::Parse`] on malformed XML.
//! - [`raw_scan`]: tag-level scan via `quick-xml`. Tolerates namespace
//!   prefixes, unknown elements, and truncated documents; skips points
//!   with unparsable coordinates instead of aborting. Never fails.
//!
//! Callers decide when to degrade: the retrieval service uses `raw_scan`
//! as the last tier of its fallback chain.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use time::OffsetDateTime;

use crate::error::{AnalysisError, Result};
use crate::{RawPoint, RawTrack, Waypoint};

/// Parse GPX bytes strictly.
///
/// Produces points in document order across all tracks and segments;
/// no reordering or deduplication. The track name is taken from the
/// first named track.
///
/// # Example
/// ```
/// use track_analyzer::parser::parse_gpx;
///
/// let doc = br#"<?xml version="1.0"?>
/// <gpx version="1.1" creator="demo"><trk><name>Morning ride</name><trkseg>
/// <trkpt lat="51.5074" lon="-0.1278"/>
/// </trkseg></trk></gpx>"#;
///
/// let track = parse_gpx(doc).unwrap();
/// assert_eq!(track.name.as_deref(), Some("Morning ride"));
/// assert_eq!(track.points.len(), 1);
/// ```
pub fn parse_gpx(bytes: &[u8]) -> Result<RawTrack> {
    if bytes.is_empty() {
        return Err(AnalysisError::parse("empty document"));
    }

    let document = gpx::read(bytes).map_err(|e| AnalysisError::parse(e.to_string()))?;

    let name = document.tracks.iter().find_map(|t| t.name.clone());

    let mut points = Vec::new();
    for track in &document.tracks {
        for segment in &track.segments {
            for wpt in &segment.points {
                points.push(RawPoint {
                    lat: wpt.point().y(),
                    lon: wpt.point().x(),
                    elevation: wpt.elevation,
                    time: to_chrono(wpt.time),
                });
            }
        }
    }

    let waypoints = document
        .waypoints
        .iter()
        .map(|w| Waypoint {
            lat: w.point().y(),
            lon: w.point().x(),
            elevation: w.elevation,
            time: to_chrono(w.time),
            name: w.name.clone(),
            note: w.comment.clone().or_else(|| w.description.clone()),
        })
        .collect();

    Ok(RawTrack {
        name,
        points,
        waypoints,
    })
}

/// Convert a `time`-crate based timestamp (as produced by the `gpx` crate)
/// into the crate-wide chrono representation.
fn to_chrono(time: Option<impl Into<OffsetDateTime>>) -> Option<DateTime<Utc>> {
    let odt: OffsetDateTime = time?.into();
    DateTime::from_timestamp(odt.unix_timestamp(), odt.nanosecond())
}

// ============================================================================
// Raw scan fallback
// ============================================================================

/// Which child element of a pending point (or the track) we are inside.
enum TextTarget {
    Elevation,
    Time,
    Name,
    Note,
    TrackName,
}

/// Accumulates one `<trkpt>`/`<wpt>` while its children are scanned.
#[derive(Default)]
struct PendingPoint {
    lat: Option<f64>,
    lon: Option<f64>,
    elevation: Option<f64>,
    time: Option<DateTime<Utc>>,
    name: Option<String>,
    note: Option<String>,
    is_waypoint: bool,
}

/// Degraded tag-level scan of GPX bytes.
///
/// Matches elements by local name, so namespace prefixes are tolerated.
/// Points with missing or unparsable `lat`/`lon` are skipped. Malformed
/// XML terminates the scan, keeping whatever was extracted up to that
/// point — the worst case is an empty track, never an error.
pub fn raw_scan(bytes: &[u8]) -> RawTrack {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    let mut track = RawTrack::default();
    let mut in_track = false;
    let mut pending: Option<PendingPoint> = None;
    let mut target: Option<TextTarget> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trk" => in_track = true,
                b"trkpt" | b"wpt" => {
                    let mut point = PendingPoint {
                        is_waypoint: e.local_name().as_ref() == b"wpt",
                        ..PendingPoint::default()
                    };
                    read_coordinates(&e, &mut point);
                    pending = Some(point);
                }
                b"ele" if pending.is_some() => target = Some(TextTarget::Elevation),
                b"time" if pending.is_some() => target = Some(TextTarget::Time),
                b"name" => {
                    if pending.is_some() {
                        target = Some(TextTarget::Name);
                    } else if in_track && track.name.is_none() {
                        target = Some(TextTarget::TrackName);
                    }
                }
                b"cmt" | b"desc" if pending.is_some() => target = Some(TextTarget::Note),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if matches!(e.local_name().as_ref(), b"trkpt" | b"wpt") {
                    let mut point = PendingPoint {
                        is_waypoint: e.local_name().as_ref() == b"wpt",
                        ..PendingPoint::default()
                    };
                    read_coordinates(&e, &mut point);
                    flush_point(&mut track, point);
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(target), Ok(text)) = (&target, t.unescape()) {
                    let text = text.trim();
                    match target {
                        TextTarget::TrackName => track.name = Some(text.to_string()),
                        _ => {
                            if let Some(point) = &mut pending {
                                match target {
                                    TextTarget::Elevation => {
                                        point.elevation = text.parse().ok();
                                    }
                                    TextTarget::Time => {
                                        point.time = DateTime::parse_from_rfc3339(text)
                                            .ok()
                                            .map(|t| t.with_timezone(&Utc));
                                    }
                                    TextTarget::Name => point.name = Some(text.to_string()),
                                    TextTarget::Note => point.note = Some(text.to_string()),
                                    TextTarget::TrackName => unreachable!(),
                                }
                            }
                        }
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"trk" => in_track = false,
                b"trkpt" | b"wpt" => {
                    if let Some(point) = pending.take() {
                        flush_point(&mut track, point);
                    }
                    target = None;
                }
                b"ele" | b"time" | b"name" | b"cmt" | b"desc" => target = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            // Malformed tail: keep what we have
            Err(_) => break,
            Ok(_) => {}
        }
        buf.clear();
    }

    track
}

/// Pull `lat`/`lon` attributes off a point element, matching by local name.
fn read_coordinates(element: &quick_xml::events::BytesStart<'_>, point: &mut PendingPoint) {
    for attr in element.attributes().flatten() {
        let value = match attr.unescape_value() {
            Ok(v) => v,
            Err(_) => continue,
        };
        match attr.key.local_name().as_ref() {
            b"lat" => point.lat = value.trim().parse().ok(),
            b"lon" => point.lon = value.trim().parse().ok(),
            _ => {}
        }
    }
}

/// Move a completed pending point into the track, skipping it when the
/// coordinates did not parse.
fn flush_point(track: &mut RawTrack, point: PendingPoint) {
    let (lat, lon) = match (point.lat, point.lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return,
    };
    if point.is_waypoint {
        track.waypoints.push(Waypoint {
            lat,
            lon,
            elevation: point.elevation,
            time: point.time,
            name: point.name,
            note: point.note,
        });
    } else {
        track.points.push(RawPoint {
            lat,
            lon,
            elevation: point.elevation,
            time: point.time,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_GPX: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <wpt lat="51.5100" lon="-0.1300"><name>Cafe</name><cmt>coffee stop</cmt></wpt>
  <trk><name>Test loop</name><trkseg>
    <trkpt lat="51.5074" lon="-0.1278"><ele>12.5</ele><time>2024-01-01T08:00:00Z</time></trkpt>
    <trkpt lat="51.5080" lon="-0.1290"><ele>13.0</ele><time>2024-01-01T08:01:00Z</time></trkpt>
    <trkpt lat="51.5090" lon="-0.1300"><ele>14.5</ele><time>2024-01-01T08:02:00Z</time></trkpt>
  </trkseg></trk>
</gpx>"#;

    #[test]
    fn test_parse_gpx_simple() {
        let track = parse_gpx(SIMPLE_GPX).unwrap();
        assert_eq!(track.name.as_deref(), Some("Test loop"));
        assert_eq!(track.points.len(), 3);
        assert_eq!(track.waypoints.len(), 1);
        assert_eq!(track.points[0].lat, 51.5074);
        assert_eq!(track.points[0].elevation, Some(12.5));
        assert!(track.points[0].time.is_some());
        assert_eq!(track.waypoints[0].name.as_deref(), Some("Cafe"));
        assert_eq!(track.waypoints[0].note.as_deref(), Some("coffee stop"));
    }

    #[test]
    fn test_parse_gpx_malformed_fails() {
        let err = parse_gpx(b"<gpx><trk><trkseg>").unwrap_err();
        assert!(matches!(err, AnalysisError::Parse { .. }));
    }

    #[test]
    fn test_parse_gpx_empty_fails() {
        assert!(parse_gpx(b"").is_err());
    }

    #[test]
    fn test_raw_scan_matches_strict_on_valid_input() {
        let strict = parse_gpx(SIMPLE_GPX).unwrap();
        let scanned = raw_scan(SIMPLE_GPX);
        assert_eq!(scanned.points.len(), strict.points.len());
        assert_eq!(scanned.waypoints.len(), strict.waypoints.len());
        assert_eq!(scanned.name, strict.name);
        assert_eq!(scanned.points[0].time, strict.points[0].time);
    }

    #[test]
    fn test_raw_scan_tolerates_namespace_prefixes() {
        let doc = br#"<g:gpx xmlns:g="http://example.com/gpx">
          <g:trk><g:trkseg>
            <g:trkpt lat="51.5" lon="-0.1"><g:ele>3.0</g:ele></g:trkpt>
            <g:trkpt lat="51.6" lon="-0.2"/>
          </g:trkseg></g:trk>
        </g:gpx>"#;
        let track = raw_scan(doc);
        assert_eq!(track.points.len(), 2);
        assert_eq!(track.points[0].elevation, Some(3.0));
    }

    #[test]
    fn test_raw_scan_skips_unparsable_coordinates() {
        let doc = br#"<gpx><trk><trkseg>
            <trkpt lat="abc" lon="-0.1"/>
            <trkpt lat="51.6" lon="-0.2"/>
            <trkpt lon="-0.3"/>
        </trkseg></trk></gpx>"#;
        let track = raw_scan(doc);
        assert_eq!(track.points.len(), 1);
        assert_eq!(track.points[0].lat, 51.6);
    }

    #[test]
    fn test_raw_scan_keeps_prefix_of_truncated_document() {
        let doc = br#"<gpx><trk><trkseg>
            <trkpt lat="51.5" lon="-0.1"/>
            <trkpt lat="51.6" lon="-0.2"/>
            <trkpt lat="51.7" lon"#;
        let track = raw_scan(doc);
        assert!(track.points.len() >= 2);
    }

    #[test]
    fn test_raw_scan_never_fails_on_garbage() {
        let track = raw_scan(b"\x00\xffnot xml at all");
        assert!(track.points.is_empty());
        assert!(track.waypoints.is_empty());
    }
}
