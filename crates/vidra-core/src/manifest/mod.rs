//! Structural parsing of pre-fetched DASH and HLS manifest blobs
//!
//! Nothing here fetches segments. A blob either validates into a
//! [`ParsedManifest`] (periods plus advertised video formats) or fails with
//! [`Error::ManifestParse`](crate::Error::ManifestParse).

#[cfg(feature = "dash")]
mod dash;
#[cfg(feature = "hls")]
mod hls;

#[cfg(feature = "dash")]
pub use dash::parse_mpd;
#[cfg(feature = "hls")]
pub use hls::parse_playlist;

use crate::{Error, Format, Result, TrackKind};
use serde::Serialize;
use std::time::Duration;

/// One period of a parsed presentation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Period {
    pub id: Option<String>,
    /// Declared start relative to the presentation
    pub start: Option<Duration>,
    pub duration: Option<Duration>,
}

/// Parsed manifest data
#[derive(Debug, Clone, Serialize)]
pub struct ParsedManifest {
    /// Format the blob was parsed under
    pub kind: TrackKind,
    /// Dynamic MPD or playlist without end tag
    pub is_live: bool,
    /// Total duration (for VOD)
    pub duration: Option<Duration>,
    /// Periods in presentation order, never empty
    pub periods: Vec<Period>,
    /// Video formats the manifest advertises
    pub video_formats: Vec<Format>,
}

/// Parse a manifest blob under the given kind
pub fn parse_manifest(kind: TrackKind, blob: &[u8]) -> Result<ParsedManifest> {
    if blob.is_empty() {
        return Err(Error::ManifestParse(format!("empty {} manifest", kind)));
    }

    match kind {
        #[cfg(feature = "dash")]
        TrackKind::Dash => {
            let content = std::str::from_utf8(blob)
                .map_err(|e| Error::ManifestParse(format!("MPD is not UTF-8: {}", e)))?;
            dash::parse_mpd(content)
        }
        #[cfg(feature = "hls")]
        TrackKind::Hls => hls::parse_playlist(blob),
        #[allow(unreachable_patterns)]
        other => Err(Error::ManifestParse(format!(
            "{} support not compiled in",
            other
        ))),
    }
}

/// Guess the manifest kind from blob content
pub fn detect_kind(blob: &[u8]) -> Option<TrackKind> {
    let head = &blob[..blob.len().min(1024)];
    let text = String::from_utf8_lossy(head);

    if text.trim_start().starts_with("#EXTM3U") {
        return Some(TrackKind::Hls);
    }
    if text.contains("<MPD") || text.contains("urn:mpeg:dash") {
        return Some(TrackKind::Dash);
    }
    None
}
