//! Source descriptor resolution
//!
//! Turns what the host hands over (a URI, a format hint, pre-fetched per-track
//! manifests) into a [`MediaDescriptor`]. No I/O and no parsing happens here;
//! bad input travels on and is rejected by the builder.

use crate::{FormatHint, MimeType, TrackKind};
use bytes::Bytes;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Extension that marks a URI as a live/adaptive HLS playlist
pub const ADAPTIVE_PLAYLIST_EXTENSION: &str = ".m3u8";

/// Raw key/value track entry as the host sends it
pub type AuxiliaryEntry = HashMap<String, String>;

/// Resolved description of what to play
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaDescriptor {
    /// Progressive file or MIME-typed item
    SingleUri {
        uri: String,
        mime_type: Option<MimeType>,
    },
    /// Live/adaptive HLS playlist URI
    AdaptiveUri { uri: String },
    /// Independently described tracks joined into one timeline
    ComposedTracks { tracks: Vec<TrackDescriptor> },
}

impl MediaDescriptor {
    pub fn kind_name(&self) -> &'static str {
        match self {
            MediaDescriptor::SingleUri { .. } => "single_uri",
            MediaDescriptor::AdaptiveUri { .. } => "adaptive_uri",
            MediaDescriptor::ComposedTracks { .. } => "composed_tracks",
        }
    }
}

/// One pre-fetched track of a composed source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackDescriptor {
    #[serde(rename = "manifest_bytes", serialize_with = "blob_len")]
    pub manifest: Bytes,
    pub content_uri: String,
    pub kind: TrackKind,
    /// Free-form media label from the host ("video", "audio", ...)
    pub media_type: Option<String>,
}

fn blob_len<S: Serializer>(blob: &Bytes, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(blob.len() as u64)
}

impl TrackDescriptor {
    pub fn new(kind: TrackKind, manifest: impl Into<Bytes>, content_uri: impl Into<String>) -> Self {
        Self {
            manifest: manifest.into(),
            content_uri: content_uri.into(),
            kind,
            media_type: None,
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Convert a host key/value entry (`dashManifest` or `hlsManifest`,
    /// `contentUrl`, optional `type`).
    ///
    /// Every entry yields a track. A missing manifest or content URL is left
    /// empty and the builder rejects it.
    pub fn from_entry(entry: &AuxiliaryEntry) -> Self {
        let (kind, manifest) = if let Some(mpd) = entry.get("dashManifest") {
            (TrackKind::Dash, Bytes::from(mpd.clone()))
        } else if let Some(playlist) = entry.get("hlsManifest") {
            (TrackKind::Hls, Bytes::from(playlist.clone()))
        } else {
            warn!("Auxiliary entry has no manifest");
            (TrackKind::Dash, Bytes::new())
        };

        let content_uri = entry.get("contentUrl").cloned().unwrap_or_else(|| {
            warn!(%kind, "Auxiliary entry has no contentUrl");
            String::new()
        });

        let mut track = TrackDescriptor::new(kind, manifest, content_uri);
        track.media_type = entry.get("type").cloned();
        track
    }
}

/// Everything the host passes to create a session or change its source
#[derive(Debug, Clone, Default)]
pub struct SourceInputs {
    pub uri: Option<String>,
    pub format_hint: Option<String>,
    pub tracks: Vec<TrackDescriptor>,
}

impl SourceInputs {
    pub fn uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Default::default()
        }
    }

    pub fn tracks(tracks: Vec<TrackDescriptor>) -> Self {
        Self {
            tracks,
            ..Default::default()
        }
    }

    pub fn with_format_hint(mut self, hint: impl Into<String>) -> Self {
        self.format_hint = Some(hint.into());
        self
    }

    /// Add one track per host key/value entry
    pub fn with_entries<'a>(mut self, entries: impl IntoIterator<Item = &'a AuxiliaryEntry>) -> Self {
        self.tracks
            .extend(entries.into_iter().map(TrackDescriptor::from_entry));
        self
    }

    pub fn resolve(&self) -> MediaDescriptor {
        resolve(self.uri.as_deref(), self.format_hint.as_deref(), &self.tracks)
    }
}

/// Decide which kind of source to build
pub fn resolve(
    primary_uri: Option<&str>,
    format_hint: Option<&str>,
    auxiliary: &[TrackDescriptor],
) -> MediaDescriptor {
    if !auxiliary.is_empty() {
        debug!(tracks = auxiliary.len(), "Resolved composed tracks");
        return MediaDescriptor::ComposedTracks {
            tracks: auxiliary.to_vec(),
        };
    }

    let uri = primary_uri.unwrap_or_default().to_string();
    if uri.ends_with(ADAPTIVE_PLAYLIST_EXTENSION) {
        debug!(uri = %uri, "Resolved adaptive URI");
        return MediaDescriptor::AdaptiveUri { uri };
    }

    let mime_type = format_hint
        .and_then(|hint| hint.parse::<FormatHint>().ok())
        .and_then(|hint| hint.mime_type());
    debug!(uri = %uri, mime = ?mime_type, "Resolved single URI");
    MediaDescriptor::SingleUri { uri, mime_type }
}
