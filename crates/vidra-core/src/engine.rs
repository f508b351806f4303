//! Decode engine collaborator interface
//!
//! The engine decodes, buffers, runs its own ABR and paints frames. This crate
//! only drives it through [`DecodeEngine`], creates instances through an
//! injected [`EngineFactory`], and listens through [`EngineListener`].

use crate::{
    source::{MediaItem, MediaSource},
    surface::SurfaceHandle,
    Format, RepeatMode, Resolution, Result, SessionConfig,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Audio content classification passed with audio attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioContentType {
    Movie,
    Music,
    Speech,
}

/// Audio attributes applied once per engine instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioAttributes {
    pub content_type: AudioContentType,
}

impl Default for AudioAttributes {
    fn default() -> Self {
        Self {
            content_type: AudioContentType::Movie,
        }
    }
}

/// Speed only. Pitch and silence skipping stay at engine defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackParameters {
    pub speed: f32,
}

impl PlaybackParameters {
    pub fn new(speed: f32) -> Self {
        Self { speed }
    }
}

impl Default for PlaybackParameters {
    fn default() -> Self {
        Self { speed: 1.0 }
    }
}

/// Renderer classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackType {
    Video,
    Audio,
    Text,
    Metadata,
    Unknown,
}

/// Formats the engine can switch between adaptively
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackGroup {
    pub formats: Vec<Format>,
}

/// Track groups exposed to one renderer slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererTracks {
    pub renderer_type: TrackType,
    pub groups: Vec<TrackGroup>,
}

/// Renderer-to-track-group mapping produced once preparation completes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappedTrackInfo {
    pub renderers: Vec<RendererTracks>,
}

/// Hard bounds the engine's adaptive selection must respect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSelectionParameters {
    pub max_video_size: Option<Resolution>,
    pub min_video_size: Option<Resolution>,
}

/// Track selector owned by an engine instance
pub trait TrackSelector: Send + Sync {
    /// `None` until the engine has prepared and mapped tracks
    fn current_mapped_track_info(&self) -> Option<MappedTrackInfo>;

    fn parameters(&self) -> TrackSelectionParameters;

    /// Replace parameters; the engine reselects on its own
    fn set_parameters(&self, parameters: TrackSelectionParameters);
}

/// Engine playback states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// Events raised by an engine instance on its own thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    StateChanged {
        state: EngineState,
        /// Known once the engine reaches `Ready`
        duration_ms: Option<u64>,
        video_size: Option<Resolution>,
    },
    IsPlayingChanged(bool),
    Error {
        code: String,
        message: String,
    },
}

/// Receives engine events. Called from the engine's thread; must not block.
pub trait EngineListener: Send + Sync {
    fn on_event(&self, event: EngineEvent);
}

/// One decode engine instance
pub trait DecodeEngine: Send {
    fn prepare(&mut self);

    /// `None` detaches the current surface
    fn set_video_surface(&mut self, surface: Option<SurfaceHandle>);

    /// Replace the playlist with a built source
    fn set_media_source(&mut self, source: &MediaSource, reset_position: bool);

    /// Replace the playlist with a plain item, resetting position
    fn set_media_item(&mut self, item: &MediaItem);

    /// `handle_audio_focus == false` lets other audio keep playing
    fn set_audio_attributes(&mut self, attributes: AudioAttributes, handle_audio_focus: bool);

    fn set_play_when_ready(&mut self, play_when_ready: bool);
    fn play_when_ready(&self) -> bool;

    fn set_repeat_mode(&mut self, mode: RepeatMode);
    fn repeat_mode(&self) -> RepeatMode;

    fn set_volume(&mut self, volume: f32);
    fn volume(&self) -> f32;

    fn set_playback_parameters(&mut self, parameters: PlaybackParameters);
    fn playback_parameters(&self) -> PlaybackParameters;

    fn seek_to(&mut self, position_ms: u64);
    fn current_position(&self) -> u64;
    fn buffered_position(&self) -> u64;

    fn add_listener(&mut self, listener: Arc<dyn EngineListener>);

    /// Selector bound at creation, if the engine exposes one
    fn track_selector(&self) -> Option<Arc<dyn TrackSelector>>;

    /// Free decoder resources. No calls follow.
    fn release(&mut self);
}

/// Deferred engine construction
pub trait EngineFactory: Send + Sync {
    fn create_instance(&self, config: &SessionConfig) -> Result<Box<dyn DecodeEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn(&SessionConfig) -> Result<Box<dyn DecodeEngine>> + Send + Sync,
{
    fn create_instance(&self, config: &SessionConfig) -> Result<Box<dyn DecodeEngine>> {
        self(config)
    }
}
