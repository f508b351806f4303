//! DASH (Dynamic Adaptive Streaming over HTTP) MPD blob parser
//!
//! Validates an in-memory MPD and extracts:
//! - presentation type (static/dynamic) and duration
//! - Period boundaries
//! - video Representations, inheriting size from their AdaptationSet

use super::{ParsedManifest, Period};
use crate::{error::Error, Format, Result, TrackKind};
use std::time::Duration;
use tracing::{debug, instrument};

/// Parse MPD content
#[instrument(skip(content), fields(len = content.len()))]
pub fn parse_mpd(content: &str) -> Result<ParsedManifest> {
    let mpd_start = content
        .find("<MPD")
        .ok_or_else(|| Error::ManifestParse("missing <MPD> root element".to_string()))?;
    let mpd_attrs = tag_attrs(&content[mpd_start + 4..])
        .ok_or_else(|| Error::ManifestParse("unterminated <MPD> element".to_string()))?;

    let is_live = extract_attr(mpd_attrs, "type").as_deref() == Some("dynamic");
    let duration = extract_attr(mpd_attrs, "mediaPresentationDuration")
        .and_then(|d| parse_iso8601_duration(&d));

    let mut periods = Vec::new();
    let mut video_formats = Vec::new();
    let mut representation_count = 0usize;

    let period_chunks = split_elements(content, "Period");
    if period_chunks.is_empty() {
        // Single implicit period spanning the presentation
        periods.push(Period {
            id: None,
            start: Some(Duration::ZERO),
            duration,
        });
        representation_count += extract_representations(content, &mut video_formats);
    } else {
        for chunk in period_chunks {
            let attrs = tag_attrs(chunk).unwrap_or_default();
            periods.push(Period {
                id: extract_attr(attrs, "id"),
                start: extract_attr(attrs, "start").and_then(|s| parse_iso8601_duration(&s)),
                duration: extract_attr(attrs, "duration").and_then(|s| parse_iso8601_duration(&s)),
            });
            representation_count += extract_representations(chunk, &mut video_formats);
        }
    }

    if representation_count == 0 {
        return Err(Error::ManifestParse(
            "No representations found in MPD".to_string(),
        ));
    }

    // A lone period without its own duration spans the presentation
    if periods.len() == 1 && periods[0].duration.is_none() {
        periods[0].duration = duration;
    }

    debug!(
        periods = periods.len(),
        representations = representation_count,
        video = video_formats.len(),
        is_live,
        "MPD parsed"
    );

    Ok(ParsedManifest {
        kind: TrackKind::Dash,
        is_live,
        duration,
        periods,
        video_formats,
    })
}

/// Walk AdaptationSets/Representations in `scope`, collecting video formats.
/// Returns the number of Representations seen, video or not.
fn extract_representations(scope: &str, video_formats: &mut Vec<Format>) -> usize {
    let mut seen = 0;

    let sets = split_elements(scope, "AdaptationSet");
    // Representations directly under a Period are tolerated
    let scopes: Vec<(&str, &str)> = if sets.is_empty() {
        vec![("", scope)]
    } else {
        sets.into_iter()
            .map(|set| (tag_attrs(set).unwrap_or_default(), set))
            .collect()
    };

    for (set_attrs, set) in scopes {
        let set_is_video = is_video_attrs(set_attrs);

        for rep in split_elements(set, "Representation") {
            let Some(attrs) = tag_attrs(rep) else {
                continue;
            };
            seen += 1;

            let width = extract_attr(attrs, "width")
                .or_else(|| extract_attr(set_attrs, "width"))
                .and_then(|s| s.parse::<u32>().ok());
            let height = extract_attr(attrs, "height")
                .or_else(|| extract_attr(set_attrs, "height"))
                .and_then(|s| s.parse::<u32>().ok());

            let is_video =
                is_video_attrs(attrs) || set_is_video || (width.is_some() && height.is_some());
            if !is_video {
                continue;
            }

            let frame_rate = extract_attr(attrs, "frameRate")
                .or_else(|| extract_attr(set_attrs, "frameRate"))
                .and_then(|s| parse_frame_rate(&s));

            video_formats.push(Format {
                id: extract_attr(attrs, "id"),
                width: width.unwrap_or(0),
                height: height.unwrap_or(0),
                bitrate: extract_attr(attrs, "bandwidth")
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(0),
                codecs: extract_attr(attrs, "codecs").or_else(|| extract_attr(set_attrs, "codecs")),
                frame_rate,
            });
        }
    }

    seen
}

fn is_video_attrs(attrs: &str) -> bool {
    extract_attr(attrs, "mimeType").is_some_and(|m| m.starts_with("video/"))
        || extract_attr(attrs, "contentType").as_deref() == Some("video")
}

/// Bodies following each `<name` opening tag
fn split_elements<'a>(content: &'a str, name: &str) -> Vec<&'a str> {
    let open = format!("<{}", name);
    content
        .split(open.as_str())
        .skip(1)
        // Reject longer element names sharing the prefix (<PeriodFoo, <Representations)
        .filter(|chunk| {
            chunk
                .chars()
                .next()
                .is_some_and(|c| c.is_whitespace() || c == '>' || c == '/')
        })
        .collect()
}

/// Attribute text of the tag whose body starts at `chunk`
fn tag_attrs(chunk: &str) -> Option<&str> {
    chunk.find('>').map(|end| chunk[..end].trim_end_matches('/'))
}

/// Extract attribute value from XML attributes string
fn extract_attr(attrs: &str, name: &str) -> Option<String> {
    let pattern = format!("{}=\"", name);
    let mut offset = 0;

    while let Some(found) = attrs[offset..].find(&pattern) {
        let start = offset + found;
        let preceded_by_space = attrs[..start]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        let value_start = start + pattern.len();
        if preceded_by_space {
            let end = attrs[value_start..].find('"')?;
            return Some(attrs[value_start..value_start + end].to_string());
        }
        offset = value_start;
    }
    None
}

fn parse_frame_rate(s: &str) -> Option<f32> {
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f32 = num.parse().ok()?;
            let den: f32 = den.parse().ok()?;
            (den > 0.0).then(|| num / den)
        }
        None => s.parse().ok(),
    }
}

/// Parse ISO 8601 duration (P1DT1H2M3.4S format)
fn parse_iso8601_duration(s: &str) -> Option<Duration> {
    let s = s.trim().strip_prefix('P')?;

    let mut total_seconds = 0.0;
    let mut current = String::new();
    let mut in_time = false;

    for c in s.chars() {
        match c {
            'T' => in_time = true,
            'D' => {
                total_seconds += current.parse::<f64>().ok()? * 86_400.0;
                current.clear();
            }
            'H' => {
                total_seconds += current.parse::<f64>().ok()? * 3600.0;
                current.clear();
            }
            // Months are not meaningful for media durations
            'M' if in_time => {
                total_seconds += current.parse::<f64>().ok()? * 60.0;
                current.clear();
            }
            'S' => {
                total_seconds += current.parse::<f64>().ok()?;
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if total_seconds >= 0.0 && current.is_empty() {
        Some(Duration::from_secs_f64(total_seconds))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PERIOD_MPD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static" mediaPresentationDuration="PT1M30S" minBufferTime="PT2S">
  <Period id="p0" start="PT0S" duration="PT60S">
    <AdaptationSet mimeType="video/mp4" codecs="avc1.64001f">
      <Representation id="v360" bandwidth="800000" width="640" height="360"/>
      <Representation id="v720" bandwidth="2800000" width="1280" height="720" frameRate="30000/1001"/>
    </AdaptationSet>
    <AdaptationSet mimeType="audio/mp4">
      <Representation id="a0" bandwidth="128000" codecs="mp4a.40.2"/>
    </AdaptationSet>
  </Period>
  <Period id="p1" duration="PT30S">
    <AdaptationSet contentType="video" width="1920" height="1080">
      <Representation id="v1080" bandwidth="5000000"/>
    </AdaptationSet>
  </Period>
</MPD>"#;

    #[test]
    fn test_parse_iso8601_duration() {
        assert_eq!(parse_iso8601_duration("PT1H30M"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_iso8601_duration("PT45.5S"), Some(Duration::from_secs_f64(45.5)));
        assert_eq!(parse_iso8601_duration("P1DT1S"), Some(Duration::from_secs(86_401)));
        assert_eq!(parse_iso8601_duration("garbage"), None);
    }

    #[test]
    fn test_parse_two_periods() {
        let manifest = parse_mpd(TWO_PERIOD_MPD).unwrap();
        assert!(!manifest.is_live);
        assert_eq!(manifest.duration, Some(Duration::from_secs(90)));
        assert_eq!(manifest.periods.len(), 2);
        assert_eq!(manifest.periods[0].id.as_deref(), Some("p0"));
        assert_eq!(manifest.periods[1].duration, Some(Duration::from_secs(30)));

        let sizes: Vec<(u32, u32)> = manifest
            .video_formats
            .iter()
            .map(|f| (f.width, f.height))
            .collect();
        assert_eq!(sizes, vec![(640, 360), (1280, 720), (1920, 1080)]);
        assert_eq!(manifest.video_formats[0].codecs.as_deref(), Some("avc1.64001f"));
        let fps = manifest.video_formats[1].frame_rate.unwrap();
        assert!((fps - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_dynamic_mpd_is_live() {
        let mpd = r#"<MPD type="dynamic"><Period><AdaptationSet mimeType="audio/mp4"><Representation id="a" bandwidth="64000"/></AdaptationSet></Period></MPD>"#;
        let manifest = parse_mpd(mpd).unwrap();
        assert!(manifest.is_live);
        assert!(manifest.video_formats.is_empty());
        assert_eq!(manifest.periods.len(), 1);
    }

    #[test]
    fn test_rejects_mpd_without_representations() {
        let err = parse_mpd(r#"<MPD type="static"><Period></Period></MPD>"#).unwrap_err();
        assert!(matches!(err, Error::ManifestParse(_)));
    }

    #[test]
    fn test_rejects_non_mpd() {
        assert!(parse_mpd("<html><body>403</body></html>").is_err());
    }

    #[test]
    fn test_attr_requires_word_boundary() {
        let attrs = r#" maxwidth="3840" width="1280""#;
        assert_eq!(extract_attr(attrs, "width").as_deref(), Some("1280"));
    }
}
