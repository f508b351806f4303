//! HLS (HTTP Live Streaming) playlist blob parser
//!
//! Handles playlists that were fetched ahead of time and are served to the
//! engine from memory:
//! - Master playlists (variants with RESOLUTION)
//! - Media playlists (one period, live unless EXT-X-ENDLIST)

use super::{ParsedManifest, Period};
use crate::{error::Error, Format, Result, TrackKind};
use m3u8_rs::{MasterPlaylist, MediaPlaylist, Playlist};
use std::time::Duration;
use tracing::{debug, instrument};

/// Parse a playlist blob
#[instrument(skip(blob), fields(len = blob.len()))]
pub fn parse_playlist(blob: &[u8]) -> Result<ParsedManifest> {
    let text = String::from_utf8_lossy(blob);
    if !text.trim_start().starts_with("#EXTM3U") {
        return Err(Error::ManifestParse("playlist missing #EXTM3U header".to_string()));
    }

    match m3u8_rs::parse_playlist_res(blob) {
        Ok(Playlist::MasterPlaylist(master)) => Ok(parse_master(&master)),
        Ok(Playlist::MediaPlaylist(media)) => Ok(parse_media(&media)),
        Err(e) => Err(Error::ManifestParse(format!("Failed to parse HLS playlist: {:?}", e))),
    }
}

fn parse_master(master: &MasterPlaylist) -> ParsedManifest {
    let mut video_formats: Vec<Format> = master
        .variants
        .iter()
        .filter(|v| !v.is_i_frame)
        .filter_map(|variant| {
            let resolution = variant.resolution?;
            Some(Format {
                id: Some(variant.uri.clone()),
                width: u32::try_from(resolution.width).unwrap_or(0),
                height: u32::try_from(resolution.height).unwrap_or(0),
                bitrate: variant.bandwidth,
                codecs: variant.codecs.clone(),
                frame_rate: variant.frame_rate.map(|f| f as f32),
            })
        })
        .collect();

    // Sort by bandwidth
    video_formats.sort_by_key(|f| f.bitrate);

    debug!(
        variants = master.variants.len(),
        video = video_formats.len(),
        "Master playlist parsed"
    );

    ParsedManifest {
        kind: TrackKind::Hls,
        // Decided by the media playlists the engine loads later
        is_live: false,
        duration: None,
        periods: vec![Period {
            id: None,
            start: Some(Duration::ZERO),
            duration: None,
        }],
        video_formats,
    }
}

fn parse_media(media: &MediaPlaylist) -> ParsedManifest {
    let is_live = !media.end_list;
    let duration = if media.end_list {
        Some(Duration::from_secs_f64(
            media.segments.iter().map(|s| s.duration as f64).sum(),
        ))
    } else {
        None
    };

    debug!(segments = media.segments.len(), is_live, "Media playlist parsed");

    ParsedManifest {
        kind: TrackKind::Hls,
        is_live,
        duration,
        periods: vec![Period {
            id: None,
            start: Some(Duration::ZERO),
            duration,
        }],
        video_formats: Vec::new(),
    }
}
