//! Media source construction
//!
//! Builds the engine-facing source for a [`MediaDescriptor`]:
//! - single URIs become plain media items
//! - adaptive URIs become live HLS sources held back from the live edge
//! - composed tracks are parsed one by one, unparsable entries dropped, and
//!   the survivors merged into one timeline with periods aligned by index

use super::descriptor::{MediaDescriptor, TrackDescriptor};
use crate::{
    manifest::{parse_manifest, ParsedManifest},
    Error, Format, MimeType, Result, SessionConfig, TrackKind,
};
use bytes::Bytes;
use serde::{Serialize, Serializer};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Live playback settings attached to an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiveConfiguration {
    /// Distance to keep from the live edge
    pub target_offset_ms: u64,
}

/// A URI the engine resolves and loads itself
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaItem {
    pub uri: String,
    pub mime_type: Option<MimeType>,
    pub live_configuration: Option<LiveConfiguration>,
    /// Sent with every HTTP request for this item
    pub user_agent: Option<String>,
    /// Progressive loads only: bytes read between continue-loading checks
    pub continue_loading_check_interval_bytes: Option<u64>,
}

impl MediaItem {
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: None,
            live_configuration: None,
            user_agent: None,
            continue_loading_check_interval_bytes: None,
        }
    }

    /// No MIME type means the engine loads the file progressively
    pub fn is_progressive(&self) -> bool {
        self.mime_type.is_none()
    }
}

/// A track whose manifest was fetched ahead of time
#[derive(Debug, Clone, Serialize)]
pub struct PrefetchedSource {
    pub kind: TrackKind,
    pub content_uri: String,
    /// Sent with segment requests against `content_uri`
    pub user_agent: String,
    /// Raw manifest the engine reads instead of requesting it
    #[serde(rename = "manifest_bytes", serialize_with = "blob_len")]
    pub manifest: Bytes,
    pub parsed: ParsedManifest,
}

fn blob_len<S: Serializer>(blob: &Bytes, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(blob.len() as u64)
}

/// One merged period and the constituents contributing to it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedPeriod {
    pub index: usize,
    /// Longest constituent duration, if any declares one
    pub duration: Option<Duration>,
    /// Indices into the merged source list
    pub constituents: Vec<usize>,
    /// Shift applied to each constituent so all start with the first one,
    /// parallel to `constituents`
    pub time_offsets_ms: Vec<i64>,
}

/// Union timeline of a merged source
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedTimeline {
    pub periods: Vec<MergedPeriod>,
}

impl MergedTimeline {
    /// Align periods by index across `manifests`
    pub fn align(manifests: &[&ParsedManifest], adjust_offsets: bool) -> Self {
        let period_count = manifests.iter().map(|m| m.periods.len()).max().unwrap_or(0);

        let periods = (0..period_count)
            .map(|index| {
                let mut constituents = Vec::new();
                let mut duration: Option<Duration> = None;
                let mut starts = Vec::new();

                for (source_index, manifest) in manifests.iter().enumerate() {
                    let Some(period) = manifest.periods.get(index) else {
                        continue;
                    };
                    constituents.push(source_index);
                    starts.push(period.start);
                    if let Some(d) = period.duration {
                        duration = Some(duration.map_or(d, |current| current.max(d)));
                    }
                }

                let reference = starts.first().copied().flatten();
                let time_offsets_ms = starts
                    .iter()
                    .map(|start| match (adjust_offsets, reference, start) {
                        (true, Some(reference), Some(start)) => {
                            reference.as_millis() as i64 - start.as_millis() as i64
                        }
                        _ => 0,
                    })
                    .collect();

                MergedPeriod {
                    index,
                    duration,
                    constituents,
                    time_offsets_ms,
                }
            })
            .collect();

        Self { periods }
    }

    /// Sum of merged period durations, `None` if any period is open-ended
    pub fn duration(&self) -> Option<Duration> {
        self.periods.iter().map(|p| p.duration).sum()
    }
}

/// Engine-facing source built from a descriptor
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaSource {
    /// HLS playlist URI played behind the live edge
    LiveHls {
        item: MediaItem,
        allow_chunkless_preparation: bool,
        playlist_stuck_target_duration_coefficient: f64,
    },
    /// Single pre-fetched track
    Prefetched(PrefetchedSource),
    /// Several sources played in sync
    Merged {
        sources: Vec<MediaSource>,
        adjust_period_time_offsets: bool,
        timeline: MergedTimeline,
    },
}

impl MediaSource {
    /// Video formats the underlying manifests advertise
    pub fn declared_video_formats(&self) -> Vec<Format> {
        match self {
            MediaSource::LiveHls { .. } => Vec::new(),
            MediaSource::Prefetched(source) => source.parsed.video_formats.clone(),
            MediaSource::Merged { sources, .. } => sources
                .iter()
                .flat_map(|s| s.declared_video_formats())
                .collect(),
        }
    }

    pub fn is_merged(&self) -> bool {
        matches!(self, MediaSource::Merged { .. })
    }

    /// Number of leaf sources
    pub fn constituent_count(&self) -> usize {
        match self {
            MediaSource::Merged { sources, .. } => sources.len(),
            _ => 1,
        }
    }
}

/// What the engine is handed: an item it loads itself, or a built source
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "playable", rename_all = "snake_case")]
pub enum PlayableSource {
    Item(MediaItem),
    Source(MediaSource),
}

impl PlayableSource {
    pub fn declared_video_formats(&self) -> Vec<Format> {
        match self {
            PlayableSource::Item(_) => Vec::new(),
            PlayableSource::Source(source) => source.declared_video_formats(),
        }
    }
}

/// Builds playable sources from descriptors
#[derive(Debug, Clone, Default)]
pub struct MediaSourceBuilder {
    config: SessionConfig,
}

impl MediaSourceBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Build the source for a descriptor
    #[instrument(skip(self, descriptor), fields(kind = descriptor.kind_name()))]
    pub fn build(&self, descriptor: &MediaDescriptor) -> Result<PlayableSource> {
        match descriptor {
            MediaDescriptor::SingleUri { uri, mime_type } => {
                validate_uri(uri)?;
                let mut item = MediaItem {
                    mime_type: *mime_type,
                    user_agent: Some(self.config.user_agent.clone()),
                    ..MediaItem::from_uri(uri.clone())
                };
                if item.is_progressive() {
                    item.continue_loading_check_interval_bytes =
                        Some(self.config.progressive_load_interval_bytes);
                }
                Ok(PlayableSource::Item(item))
            }
            MediaDescriptor::AdaptiveUri { uri } => {
                validate_uri(uri)?;
                Ok(PlayableSource::Source(self.live_hls_source(uri)))
            }
            MediaDescriptor::ComposedTracks { tracks } => {
                self.composed_source(tracks).map(PlayableSource::Source)
            }
        }
    }

    fn live_hls_source(&self, uri: &str) -> MediaSource {
        debug!(
            uri = %uri,
            target_offset_ms = self.config.live_target_offset_ms,
            "Building live HLS source"
        );
        MediaSource::LiveHls {
            item: MediaItem {
                uri: uri.to_string(),
                mime_type: Some(MimeType::Hls),
                live_configuration: Some(LiveConfiguration {
                    target_offset_ms: self.config.live_target_offset_ms,
                }),
                user_agent: Some(self.config.user_agent.clone()),
                continue_loading_check_interval_bytes: None,
            },
            allow_chunkless_preparation: self.config.allow_chunkless_preparation,
            playlist_stuck_target_duration_coefficient: self
                .config
                .playlist_stuck_target_duration_coefficient,
        }
    }

    fn composed_source(&self, tracks: &[TrackDescriptor]) -> Result<MediaSource> {
        let mut sources: Vec<MediaSource> = tracks
            .iter()
            .enumerate()
            .filter_map(|(index, track)| match self.prefetched_source(track) {
                Ok(source) => Some(MediaSource::Prefetched(source)),
                Err(e) => {
                    warn!(
                        index,
                        kind = %track.kind,
                        content_uri = %track.content_uri,
                        error = %e,
                        "Dropping unparsable track"
                    );
                    None
                }
            })
            .collect();

        match sources.len() {
            0 => Err(Error::NoPlayableTracks {
                attempted: tracks.len(),
            }),
            1 => Ok(sources.remove(0)),
            count => {
                let adjust = self.config.merge_adjusts_period_time_offsets;
                let timeline = {
                    let manifests: Vec<&ParsedManifest> = sources
                        .iter()
                        .filter_map(|s| match s {
                            MediaSource::Prefetched(p) => Some(&p.parsed),
                            _ => None,
                        })
                        .collect();
                    MergedTimeline::align(&manifests, adjust)
                };
                info!(
                    sources = count,
                    dropped = tracks.len() - count,
                    periods = timeline.periods.len(),
                    "Merged composed tracks"
                );
                Ok(MediaSource::Merged {
                    sources,
                    adjust_period_time_offsets: adjust,
                    timeline,
                })
            }
        }
    }

    fn prefetched_source(&self, track: &TrackDescriptor) -> Result<PrefetchedSource> {
        validate_uri(&track.content_uri)?;
        let parsed = parse_manifest(track.kind, &track.manifest)?;
        Ok(PrefetchedSource {
            kind: track.kind,
            content_uri: track.content_uri.clone(),
            user_agent: self.config.user_agent.clone(),
            manifest: track.manifest.clone(),
            parsed,
        })
    }
}

/// Blank URIs and malformed absolute URLs are rejected; anything without a
/// scheme is treated as a local path.
fn validate_uri(uri: &str) -> Result<()> {
    if uri.trim().is_empty() {
        return Err(Error::InvalidDescriptor("empty media URI".to_string()));
    }
    if uri.contains("://") {
        Url::parse(uri)
            .map_err(|e| Error::InvalidDescriptor(format!("malformed URI '{}': {}", uri, e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO_MPD: &str = r#"<MPD type="static" mediaPresentationDuration="PT20S"><Period id="0" start="PT0S"><AdaptationSet mimeType="video/mp4"><Representation id="v" bandwidth="1000" width="1280" height="720"/></AdaptationSet></Period></MPD>"#;
    const AUDIO_MPD: &str = r#"<MPD type="static" mediaPresentationDuration="PT21S"><Period id="0" start="PT0.5S"><AdaptationSet mimeType="audio/mp4"><Representation id="a" bandwidth="128"/></AdaptationSet></Period></MPD>"#;

    fn builder() -> MediaSourceBuilder {
        MediaSourceBuilder::new(SessionConfig::default())
    }

    #[test]
    fn test_single_uri_builds_item() {
        let descriptor = MediaDescriptor::SingleUri {
            uri: "https://cdn.example.com/movie.mp4".into(),
            mime_type: None,
        };
        match builder().build(&descriptor).unwrap() {
            PlayableSource::Item(item) => {
                assert_eq!(item.uri, "https://cdn.example.com/movie.mp4");
                assert!(item.live_configuration.is_none());
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_local_path_accepted() {
        let descriptor = MediaDescriptor::SingleUri {
            uri: "/sdcard/movies/clip.mp4".into(),
            mime_type: None,
        };
        assert!(builder().build(&descriptor).is_ok());
    }

    #[test]
    fn test_blank_and_malformed_uri_rejected() {
        for uri in ["", "   ", "http://[::1"] {
            let descriptor = MediaDescriptor::SingleUri {
                uri: uri.into(),
                mime_type: None,
            };
            let err = builder().build(&descriptor).unwrap_err();
            assert!(matches!(err, Error::InvalidDescriptor(_)), "uri {:?}", uri);
        }
    }

    #[test]
    fn test_items_carry_load_settings() {
        let config = SessionConfig {
            user_agent: "vidra-test/1.0".into(),
            progressive_load_interval_bytes: 4096,
            ..Default::default()
        };
        let builder = MediaSourceBuilder::new(config);

        let progressive = MediaDescriptor::SingleUri {
            uri: "https://cdn.example.com/movie.mp4".into(),
            mime_type: None,
        };
        let PlayableSource::Item(item) = builder.build(&progressive).unwrap() else {
            panic!("expected item");
        };
        assert_eq!(item.user_agent.as_deref(), Some("vidra-test/1.0"));
        assert_eq!(item.continue_loading_check_interval_bytes, Some(4096));

        let dash = MediaDescriptor::SingleUri {
            uri: "https://cdn.example.com/movie.mpd".into(),
            mime_type: Some(MimeType::Dash),
        };
        let PlayableSource::Item(item) = builder.build(&dash).unwrap() else {
            panic!("expected item");
        };
        assert_eq!(item.user_agent.as_deref(), Some("vidra-test/1.0"));
        assert_eq!(item.continue_loading_check_interval_bytes, None);

        let live = MediaDescriptor::AdaptiveUri {
            uri: "https://live.example.com/index.m3u8".into(),
        };
        let PlayableSource::Source(MediaSource::LiveHls { item, .. }) = builder.build(&live).unwrap()
        else {
            panic!("expected live HLS source");
        };
        assert_eq!(item.user_agent.as_deref(), Some("vidra-test/1.0"));

        let composed = MediaDescriptor::ComposedTracks {
            tracks: vec![TrackDescriptor::new(TrackKind::Dash, VIDEO_MPD, "https://cdn/v.mp4")],
        };
        let PlayableSource::Source(MediaSource::Prefetched(prefetched)) =
            builder.build(&composed).unwrap()
        else {
            panic!("expected prefetched source");
        };
        assert_eq!(prefetched.user_agent, "vidra-test/1.0");
    }

    #[test]
    fn test_entries_without_manifest_are_not_playable() {
        let entries: Vec<crate::source::AuxiliaryEntry> = vec![
            [("type".to_string(), "audio".to_string())].into_iter().collect(),
            [("dashManifest".to_string(), VIDEO_MPD.to_string())]
                .into_iter()
                .collect(),
        ];
        let descriptor = crate::source::SourceInputs::uri("https://cdn.example.com/movie.m3u8")
            .with_entries(&entries)
            .resolve();
        assert_eq!(descriptor.kind_name(), "composed_tracks");

        let err = builder().build(&descriptor).unwrap_err();
        assert!(matches!(err, Error::NoPlayableTracks { attempted: 2 }));
    }

    #[test]
    fn test_adaptive_uri_live_settings() {
        let descriptor = MediaDescriptor::AdaptiveUri {
            uri: "https://live.example.com/index.m3u8".into(),
        };
        match builder().build(&descriptor).unwrap() {
            PlayableSource::Source(MediaSource::LiveHls {
                item,
                allow_chunkless_preparation,
                ..
            }) => {
                assert_eq!(
                    item.live_configuration,
                    Some(LiveConfiguration {
                        target_offset_ms: 10_000
                    })
                );
                assert!(allow_chunkless_preparation);
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_composed_merges_by_period_index() {
        let descriptor = MediaDescriptor::ComposedTracks {
            tracks: vec![
                TrackDescriptor::new(TrackKind::Dash, VIDEO_MPD, "https://cdn/v.mp4"),
                TrackDescriptor::new(TrackKind::Dash, AUDIO_MPD, "https://cdn/a.mp4"),
            ],
        };
        let PlayableSource::Source(MediaSource::Merged { sources, timeline, .. }) =
            builder().build(&descriptor).unwrap()
        else {
            panic!("expected merged source");
        };

        assert_eq!(sources.len(), 2);
        assert_eq!(timeline.periods.len(), 1);
        let period = &timeline.periods[0];
        assert_eq!(period.constituents, vec![0, 1]);
        assert_eq!(period.duration, Some(Duration::from_secs(21)));
        assert_eq!(period.time_offsets_ms, vec![0, -500]);
    }

    #[test]
    fn test_offsets_not_adjusted_when_disabled() {
        let config = SessionConfig {
            merge_adjusts_period_time_offsets: false,
            ..Default::default()
        };
        let descriptor = MediaDescriptor::ComposedTracks {
            tracks: vec![
                TrackDescriptor::new(TrackKind::Dash, VIDEO_MPD, "https://cdn/v.mp4"),
                TrackDescriptor::new(TrackKind::Dash, AUDIO_MPD, "https://cdn/a.mp4"),
            ],
        };
        let PlayableSource::Source(MediaSource::Merged { timeline, .. }) =
            MediaSourceBuilder::new(config).build(&descriptor).unwrap()
        else {
            panic!("expected merged source");
        };
        assert_eq!(timeline.periods[0].time_offsets_ms, vec![0, 0]);
    }

    #[test]
    fn test_timeline_union_of_uneven_periods() {
        let two = crate::manifest::parse_mpd(
            r#"<MPD><Period duration="PT10S"><Representation id="a" width="1" height="1"/></Period><Period duration="PT5S"><Representation id="b" width="1" height="1"/></Period></MPD>"#,
        )
        .unwrap();
        let one = crate::manifest::parse_mpd(
            r#"<MPD><Period duration="PT12S"><Representation id="c" width="1" height="1"/></Period></MPD>"#,
        )
        .unwrap();

        let timeline = MergedTimeline::align(&[&two, &one], true);
        assert_eq!(timeline.periods.len(), 2);
        assert_eq!(timeline.periods[0].duration, Some(Duration::from_secs(12)));
        assert_eq!(timeline.periods[1].constituents, vec![0]);
        assert_eq!(timeline.duration(), Some(Duration::from_secs(17)));
    }
}
