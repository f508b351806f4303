//! Host-facing playback controls
//!
//! Thin normalization layer over [`PlaybackSession`]: volume is clamped,
//! speed validated, looping mapped onto the two repeat modes.

use crate::{
    engine::EngineFactory,
    events::EventSink,
    session::PlaybackSession,
    source::{MediaDescriptor, PlayableSource, SourceInputs},
    surface::RenderSurface,
    Error, LifecycleState, PlaybackOptions, RepeatMode, Result, SessionConfig, SessionId,
    SnapshotState, TrackInfo,
};
use std::sync::Arc;
use tracing::debug;

/// Video player bound to one host surface
#[derive(Clone)]
pub struct VideoPlayer {
    session: PlaybackSession,
}

impl VideoPlayer {
    /// Create a player and start preparing its source
    pub fn create(
        surface: Arc<dyn RenderSurface>,
        inputs: &SourceInputs,
        options: PlaybackOptions,
        factory: Arc<dyn EngineFactory>,
        sink: Arc<dyn EventSink>,
        config: SessionConfig,
    ) -> Result<Self> {
        let session = PlaybackSession::create(surface, inputs, options, factory, sink, config)?;
        Ok(Self { session })
    }

    pub fn id(&self) -> SessionId {
        self.session.id()
    }

    pub fn state(&self) -> LifecycleState {
        self.session.state()
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn descriptor(&self) -> MediaDescriptor {
        self.session.descriptor()
    }

    pub fn source(&self) -> PlayableSource {
        self.session.source()
    }

    pub fn snapshot(&self) -> Option<SnapshotState> {
        self.session.snapshot()
    }

    pub fn play(&self) -> Result<()> {
        self.session.play()
    }

    pub fn pause(&self) -> Result<()> {
        self.session.pause()
    }

    /// Absolute position in milliseconds
    pub fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.session.seek_to(position_ms)
    }

    /// Clamped to `[0.0, 1.0]`; NaN counts as silence
    pub fn set_volume(&self, volume: f64) -> Result<()> {
        let clamped = clamp_volume(volume);
        if !(0.0..=1.0).contains(&volume) {
            debug!(requested = volume, applied = clamped, "Volume clamped");
        }
        self.session.set_volume(clamped)
    }

    /// Speed multiplier, must be positive
    pub fn set_playback_speed(&self, speed: f64) -> Result<()> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "playback speed must be positive, got {}",
                speed
            )));
        }
        self.session.set_playback_speed(speed as f32)
    }

    pub fn set_looping(&self, looping: bool) -> Result<()> {
        self.session.set_repeat_mode(RepeatMode::from_looping(looping))
    }

    pub fn change_data_source(&self, inputs: &SourceInputs) -> Result<()> {
        self.session.change_data_source(inputs)
    }

    pub fn select_resolution(&self, width: u32, height: u32) -> Result<()> {
        self.session.select_resolution(width, height)
    }

    pub fn available_resolutions(&self) -> Result<Vec<TrackInfo>> {
        self.session.available_resolutions()
    }

    pub fn position(&self) -> Result<u64> {
        self.session.position()
    }

    pub fn send_buffering_update(&self) -> Result<()> {
        self.session.send_buffering_update()
    }

    pub fn on_surface_destroyed(&self) -> Result<()> {
        self.session.on_surface_destroyed()
    }

    pub fn on_surface_available(&self) -> Result<()> {
        self.session.on_surface_available()
    }

    pub fn dispose(&self) {
        self.session.dispose()
    }
}

fn clamp_volume(volume: f64) -> f32 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0) as f32
}
