//! Core types for Vidra

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns quality tier name
    pub fn quality_name(&self) -> &'static str {
        match self.height {
            0..=240 => "240p",
            241..=360 => "360p",
            361..=480 => "480p",
            481..=720 => "720p",
            721..=1080 => "1080p",
            1081..=1440 => "1440p",
            _ => "4K",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .split_once(|c| c == 'x' || c == 'X')
            .ok_or_else(|| Error::InvalidConfig(format!("resolution must be WxH, got '{}'", s)))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("bad width in '{}'", s)))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("bad height in '{}'", s)))?;
        Ok(Self { width, height })
    }
}

/// Format hint supplied alongside a plain URI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatHint {
    /// Smooth Streaming
    Ss,
    Dash,
    Hls,
    Other,
}

impl FormatHint {
    /// MIME type forced onto the media item, if any
    pub fn mime_type(&self) -> Option<MimeType> {
        match self {
            FormatHint::Ss => Some(MimeType::SmoothStreaming),
            FormatHint::Dash => Some(MimeType::Dash),
            FormatHint::Hls => Some(MimeType::Hls),
            FormatHint::Other => None,
        }
    }
}

impl FromStr for FormatHint {
    type Err = std::convert::Infallible;

    /// Unknown hints map to [`FormatHint::Other`].
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "ss" => FormatHint::Ss,
            "dash" => FormatHint::Dash,
            "hls" => FormatHint::Hls,
            _ => FormatHint::Other,
        })
    }
}

/// Container/streaming MIME types the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MimeType {
    SmoothStreaming,
    Dash,
    Hls,
}

impl MimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::SmoothStreaming => "application/vnd.ms-sstr+xml",
            MimeType::Dash => "application/dash+xml",
            MimeType::Hls => "application/x-mpegURL",
        }
    }
}

impl std::fmt::Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Manifest format of a pre-fetched track blob
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// DASH MPD
    #[default]
    Dash,
    /// HLS playlist served from memory
    Hls,
}

impl FromStr for TrackKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dash" | "mpd" => Ok(TrackKind::Dash),
            "hls" | "m3u8" => Ok(TrackKind::Hls),
            other => Err(Error::InvalidDescriptor(format!("unknown track kind '{}'", other))),
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Dash => write!(f, "dash"),
            TrackKind::Hls => write!(f, "hls"),
        }
    }
}

/// Engine repeat policy. Only two modes are ever forwarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepeatMode {
    #[default]
    Off,
    All,
}

impl RepeatMode {
    pub fn from_looping(looping: bool) -> Self {
        if looping {
            RepeatMode::All
        } else {
            RepeatMode::Off
        }
    }
}

/// Bounds on selectable video frame size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackConstraints {
    pub min_video_size: Option<Resolution>,
    pub max_video_size: Option<Resolution>,
}

impl TrackConstraints {
    /// Pin both bounds to one size
    pub fn pinned(width: u32, height: u32) -> Self {
        let size = Resolution::new(width, height);
        Self {
            min_video_size: Some(size),
            max_video_size: Some(size),
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.min_video_size.is_none() && self.max_video_size.is_none()
    }
}

/// Width/height of one enumerated video track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackInfo {
    pub width: u32,
    pub height: u32,
}

impl From<Resolution> for TrackInfo {
    fn from(r: Resolution) -> Self {
        Self {
            width: r.width,
            height: r.height,
        }
    }
}

/// One selectable format as the engine and manifests describe it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Format {
    /// Representation/variant id, when the manifest names one
    pub id: Option<String>,
    /// Frame width, 0 when unknown
    pub width: u32,
    /// Frame height, 0 when unknown
    pub height: u32,
    /// Peak bitrate in bits per second, 0 when unknown
    pub bitrate: u64,
    pub codecs: Option<String>,
    pub frame_rate: Option<f32>,
}

impl Format {
    pub fn video(width: u32, height: u32) -> Self {
        Self {
            id: None,
            width,
            height,
            bitrate: 0,
            codecs: None,
            frame_rate: None,
        }
    }

    pub fn with_bitrate(mut self, bitrate: u64) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Source being resolved and built, engine not yet bound
    Constructing,
    /// Engine bound to a live surface
    Active,
    /// Surface lost, engine released, snapshot pending
    Suspended,
    /// Terminal
    Disposed,
}

impl LifecycleState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, target),
            (Constructing, Active)
                | (Active, Suspended)
                | (Suspended, Active)
                | (Constructing, Disposed)
                | (Active, Disposed)
                | (Suspended, Disposed)
        )
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Constructing => write!(f, "constructing"),
            LifecycleState::Active => write!(f, "active"),
            LifecycleState::Suspended => write!(f, "suspended"),
            LifecycleState::Disposed => write!(f, "disposed"),
        }
    }
}

/// Per-session playback options, fixed at construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackOptions {
    /// Start with repeat-all
    pub looping: bool,
    /// Play alongside other audio instead of taking audio focus
    pub mix_with_others: bool,
}

/// State captured right before the engine is torn down on surface loss
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotState {
    pub position_ms: u64,
    pub is_playing: bool,
    pub volume: f32,
    pub playback_speed: f32,
    pub repeat_mode: RepeatMode,
    pub track_constraints: TrackConstraints,
}

/// Source construction tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Target distance from the live edge for adaptive URIs (milliseconds)
    pub live_target_offset_ms: u64,
    /// Skip initial segment probing when the playlist carries enough info
    pub allow_chunkless_preparation: bool,
    /// Target durations without playlist progress before a live playlist counts as stuck
    pub playlist_stuck_target_duration_coefficient: f64,
    /// Bytes loaded between continue-loading checks for progressive items
    pub progressive_load_interval_bytes: u64,
    /// User agent handed to the engine's HTTP layer
    pub user_agent: String,
    /// Shift merged period offsets so constituents start together
    pub merge_adjusts_period_time_offsets: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            live_target_offset_ms: 10_000,
            allow_chunkless_preparation: true,
            playlist_stuck_target_duration_coefficient: 15.0,
            progressive_load_interval_bytes: 1024 * 1024,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; rv:91.0) Gecko/20100101 Firefox/91.0"
                .to_string(),
            merge_adjusts_period_time_offsets: true,
        }
    }
}

impl SessionConfig {
    /// Parse from JSON text; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let coefficient = self.playlist_stuck_target_duration_coefficient;
        if !(coefficient.is_finite() && coefficient > 0.0) {
            return Err(Error::InvalidConfig(
                "playlist_stuck_target_duration_coefficient must be a positive number".into(),
            ));
        }
        if self.progressive_load_interval_bytes == 0 {
            return Err(Error::InvalidConfig(
                "progressive_load_interval_bytes must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
