//! Playback Session - lifecycle orchestrator for one playback
//!
//! Coordinates:
//! - Source resolution and construction
//! - Engine creation through the injected factory
//! - Surface loss (snapshot + release) and recreation (rebuild + replay)
//! - Source swaps on a live engine
//! - Event forwarding with stale-instance filtering

use crate::{
    engine::{AudioAttributes, DecodeEngine, EngineFactory, PlaybackParameters, TrackSelector},
    events::{EventForwarder, EventSink, PlayerEvent},
    source::{MediaDescriptor, MediaSourceBuilder, PlayableSource, SourceInputs},
    surface::{RenderSurface, SurfaceHandle, SurfaceLifecycleListener},
    tracks,
    types::*,
    Error, Result,
};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, warn};

/// Mutable session fields, all guarded by one lock
struct SessionState {
    lifecycle: LifecycleState,
    engine: Option<Box<dyn DecodeEngine>>,
    selector: Option<Arc<dyn TrackSelector>>,
    /// Recipe the current source was built from, reused on restore
    descriptor: MediaDescriptor,
    source: PlayableSource,
    snapshot: Option<SnapshotState>,
    constraints: TrackConstraints,
}

struct SessionInner {
    id: SessionId,
    config: SessionConfig,
    options: PlaybackOptions,
    builder: MediaSourceBuilder,
    factory: Arc<dyn EngineFactory>,
    surface: Arc<dyn RenderSurface>,
    forwarder: Arc<EventForwarder>,
    state: Mutex<SessionState>,
}

/// Playback session managing one engine over the life of one surface binding
#[derive(Clone)]
pub struct PlaybackSession {
    inner: Arc<SessionInner>,
}

impl PlaybackSession {
    /// Resolve and build the source, create an engine, bind it to the surface
    /// and start preparing.
    ///
    /// On failure one error event reaches the sink, the error is returned and
    /// no engine is left behind.
    #[instrument(skip_all)]
    pub fn create(
        surface: Arc<dyn RenderSurface>,
        inputs: &SourceInputs,
        options: PlaybackOptions,
        factory: Arc<dyn EngineFactory>,
        sink: Arc<dyn EventSink>,
        config: SessionConfig,
    ) -> Result<Self> {
        let id = SessionId::new();
        let forwarder = EventForwarder::new(sink);
        let builder = MediaSourceBuilder::new(config.clone());

        let descriptor = inputs.resolve();
        info!(session_id = %id, kind = descriptor.kind_name(), "Creating session");

        let constructed =
            Self::construct_engine(&builder, &descriptor, &*surface, &*factory, &config);
        let (source, mut engine, handle) = match constructed {
            Ok(parts) => parts,
            Err(e) => {
                warn!(session_id = %id, error = %e, "Session construction failed");
                forwarder.emit_now(error_event(&e));
                return Err(e);
            }
        };

        engine.add_listener(forwarder.next_generation());
        install_source(engine.as_mut(), &source, true);
        engine.set_audio_attributes(AudioAttributes::default(), !options.mix_with_others);
        engine.set_repeat_mode(RepeatMode::from_looping(options.looping));
        engine.set_video_surface(Some(handle));
        engine.prepare();

        let selector = engine.track_selector();
        let inner = Arc::new(SessionInner {
            id,
            config,
            options,
            builder,
            factory,
            surface,
            forwarder,
            state: Mutex::new(SessionState {
                lifecycle: LifecycleState::Constructing,
                engine: Some(engine),
                selector,
                descriptor,
                source,
                snapshot: None,
                constraints: TrackConstraints::default(),
            }),
        });

        inner.transition(&mut inner.state.lock(), LifecycleState::Active)?;
        inner.forwarder.open();

        let hook: Arc<dyn SurfaceLifecycleListener> = Arc::new(SurfaceHook {
            session: Arc::downgrade(&inner),
        });
        inner.surface.set_lifecycle_listener(Some(hook));

        info!(session_id = %id, surface = %handle, "Session active");
        Ok(Self { inner })
    }

    /// Build the source, then acquire a surface, then create the engine.
    /// Nothing is created if an earlier step fails.
    fn construct_engine(
        builder: &MediaSourceBuilder,
        descriptor: &MediaDescriptor,
        surface: &dyn RenderSurface,
        factory: &dyn EngineFactory,
        config: &SessionConfig,
    ) -> Result<(PlayableSource, Box<dyn DecodeEngine>, SurfaceHandle)> {
        let source = builder.build(descriptor)?;
        let handle = surface.acquire_surface().ok_or(Error::SurfaceUnavailable)?;
        let engine = factory.create_instance(config)?;
        Ok((source, engine, handle))
    }

    /// Get session ID
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Get current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.inner.state.lock().lifecycle
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn options(&self) -> PlaybackOptions {
        self.inner.options
    }

    /// Recipe of the current source
    pub fn descriptor(&self) -> MediaDescriptor {
        self.inner.state.lock().descriptor.clone()
    }

    /// Currently installed source
    pub fn source(&self) -> PlayableSource {
        self.inner.state.lock().source.clone()
    }

    /// Pending snapshot, present only while suspended
    pub fn snapshot(&self) -> Option<SnapshotState> {
        self.inner.state.lock().snapshot
    }

    /// Surface destroyed: capture a snapshot and release the engine
    pub fn on_surface_destroyed(&self) -> Result<()> {
        self.inner.surface_destroyed()
    }

    /// Surface recreated: rebuild the engine and replay the snapshot
    pub fn on_surface_available(&self) -> Result<()> {
        self.inner.surface_available()
    }

    pub fn play(&self) -> Result<()> {
        self.inner.control(
            "play",
            |engine| engine.set_play_when_ready(true),
            |snapshot| snapshot.is_playing = true,
        )
    }

    pub fn pause(&self) -> Result<()> {
        self.inner.control(
            "pause",
            |engine| engine.set_play_when_ready(false),
            |snapshot| snapshot.is_playing = false,
        )
    }

    pub fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.inner.control(
            "seek_to",
            |engine| engine.seek_to(position_ms),
            |snapshot| snapshot.position_ms = position_ms,
        )
    }

    /// Forwarded as given; callers normalize
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.inner.control(
            "set_volume",
            |engine| engine.set_volume(volume),
            |snapshot| snapshot.volume = volume,
        )
    }

    /// Forwarded as given; callers validate
    pub fn set_playback_speed(&self, speed: f32) -> Result<()> {
        self.inner.control(
            "set_playback_speed",
            |engine| engine.set_playback_parameters(PlaybackParameters::new(speed)),
            |snapshot| snapshot.playback_speed = speed,
        )
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.inner.control(
            "set_repeat_mode",
            |engine| engine.set_repeat_mode(mode),
            |snapshot| snapshot.repeat_mode = mode,
        )
    }

    /// Pin video selection to one frame size
    pub fn select_resolution(&self, width: u32, height: u32) -> Result<()> {
        let mut state = self.inner.state.lock();
        self.inner.ensure_live(&state)?;

        let constraints = TrackConstraints::pinned(width, height);
        state.constraints = constraints;
        match state.lifecycle {
            LifecycleState::Suspended => {
                if let Some(snapshot) = state.snapshot.as_mut() {
                    snapshot.track_constraints = constraints;
                }
                debug!(width, height, "Queued resolution constraint while suspended");
            }
            _ => tracks::constrain_resolution(state.selector.as_deref(), width, height),
        }
        Ok(())
    }

    /// Video tracks the current engine has mapped; empty while suspended
    pub fn available_resolutions(&self) -> Result<Vec<TrackInfo>> {
        let state = self.inner.state.lock();
        self.inner.ensure_live(&state)?;
        Ok(tracks::list_video_track_resolutions(state.selector.as_deref()))
    }

    /// Current position; the snapshot position while suspended
    pub fn position(&self) -> Result<u64> {
        let state = self.inner.state.lock();
        self.inner.ensure_live(&state)?;
        Ok(match (&state.engine, &state.snapshot) {
            (Some(engine), _) => engine.current_position(),
            (None, Some(snapshot)) => snapshot.position_ms,
            (None, None) => 0,
        })
    }

    /// Buffered position reported by the engine, 0 while suspended
    pub fn buffered_position(&self) -> Result<u64> {
        let state = self.inner.state.lock();
        self.inner.ensure_live(&state)?;
        Ok(state
            .engine
            .as_ref()
            .map(|e| e.buffered_position())
            .unwrap_or(0))
    }

    /// Emit the engine's buffered position to the sink
    pub fn send_buffering_update(&self) -> Result<()> {
        let buffered_ms = {
            let state = self.inner.state.lock();
            self.inner.ensure_live(&state)?;
            match &state.engine {
                Some(engine) => engine.buffered_position(),
                None => {
                    debug!("No engine while suspended, skipping buffering update");
                    return Ok(());
                }
            }
        };
        self.inner
            .forwarder
            .emit(PlayerEvent::BufferingUpdate { buffered_ms });
        Ok(())
    }

    /// Swap the source on the live engine.
    ///
    /// Composed sources keep the playback position; URI sources start over.
    /// If the new source cannot be built the current one keeps playing.
    #[instrument(skip_all, fields(session_id = %self.inner.id))]
    pub fn change_data_source(&self, inputs: &SourceInputs) -> Result<()> {
        let mut state = self.inner.state.lock();
        match state.lifecycle {
            LifecycleState::Active => {}
            LifecycleState::Disposed => return Err(Error::SessionDisposed),
            LifecycleState::Suspended => {
                warn!("Rejecting source change while surface is gone");
                return Err(Error::SurfaceUnavailable);
            }
            LifecycleState::Constructing => {
                return Err(Error::InvalidStateTransition {
                    from: state.lifecycle.to_string(),
                    to: LifecycleState::Active.to_string(),
                })
            }
        }

        let descriptor = inputs.resolve();
        let source = match self.inner.builder.build(&descriptor) {
            Ok(source) => source,
            Err(e) => {
                warn!(error = %e, "Source change failed, keeping current source");
                return Err(e);
            }
        };

        let preserve_position = matches!(descriptor, MediaDescriptor::ComposedTracks { .. });
        if let Some(engine) = state.engine.as_mut() {
            install_source(engine.as_mut(), &source, !preserve_position);
        }
        info!(
            kind = descriptor.kind_name(),
            preserve_position,
            "Data source changed"
        );
        state.descriptor = descriptor;
        state.source = source;
        Ok(())
    }

    /// Release engine, surface binding and event forwarding. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl SessionInner {
    fn transition(&self, state: &mut SessionState, to: LifecycleState) -> Result<()> {
        let from = state.lifecycle;
        if !from.can_transition_to(to) {
            return Err(Error::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        state.lifecycle = to;
        info!(session_id = %self.id, from = %from, to = %to, "State transition");
        Ok(())
    }

    fn ensure_live(&self, state: &SessionState) -> Result<()> {
        if state.lifecycle == LifecycleState::Disposed {
            return Err(Error::SessionDisposed);
        }
        Ok(())
    }

    /// Apply a control to the engine, or queue it into the snapshot while suspended
    fn control(
        &self,
        op: &'static str,
        on_engine: impl FnOnce(&mut dyn DecodeEngine),
        on_snapshot: impl FnOnce(&mut SnapshotState),
    ) -> Result<()> {
        let mut state = self.state.lock();
        self.ensure_live(&state)?;

        if let Some(engine) = state.engine.as_mut() {
            debug!(op, "Dispatching control");
            on_engine(engine.as_mut());
        } else if let Some(snapshot) = state.snapshot.as_mut() {
            debug!(op, "Queued control into snapshot");
            on_snapshot(snapshot);
        } else {
            warn!(op, state = %state.lifecycle, "No engine or snapshot, dropping control");
        }
        Ok(())
    }

    fn surface_destroyed(&self) -> Result<()> {
        let mut state = self.state.lock();
        match state.lifecycle {
            LifecycleState::Active => {}
            LifecycleState::Suspended => {
                debug!("Surface already gone");
                return Ok(());
            }
            LifecycleState::Disposed => return Err(Error::SessionDisposed),
            LifecycleState::Constructing => {
                return self.transition(&mut state, LifecycleState::Suspended)
            }
        }

        if let Some(mut engine) = state.engine.take() {
            let snapshot = SnapshotState {
                position_ms: engine.current_position(),
                is_playing: engine.play_when_ready(),
                volume: engine.volume(),
                playback_speed: engine.playback_parameters().speed,
                repeat_mode: engine.repeat_mode(),
                track_constraints: state
                    .selector
                    .as_deref()
                    .map(|selector| tracks::current_constraints(selector))
                    .unwrap_or(state.constraints),
            };
            debug!(
                position_ms = snapshot.position_ms,
                is_playing = snapshot.is_playing,
                "Captured snapshot"
            );
            state.snapshot = Some(snapshot);
            // Released without pausing
            engine.release();
        }
        state.selector = None;
        self.transition(&mut state, LifecycleState::Suspended)
    }

    fn surface_available(&self) -> Result<()> {
        let mut state = self.state.lock();
        match state.lifecycle {
            LifecycleState::Suspended => {}
            LifecycleState::Active => {
                // Replacement drawable without a prior loss: rebind only
                let handle = self.surface.acquire_surface().ok_or(Error::SurfaceUnavailable)?;
                if let Some(engine) = state.engine.as_mut() {
                    engine.set_video_surface(Some(handle));
                }
                debug!(surface = %handle, "Rebound surface");
                return Ok(());
            }
            LifecycleState::Disposed => return Err(Error::SessionDisposed),
            LifecycleState::Constructing => {
                return Err(Error::InvalidStateTransition {
                    from: state.lifecycle.to_string(),
                    to: LifecycleState::Active.to_string(),
                })
            }
        }

        let restored = self
            .surface
            .acquire_surface()
            .ok_or(Error::SurfaceUnavailable)
            .and_then(|handle| {
                let source = self.builder.build(&state.descriptor)?;
                let engine = self.factory.create_instance(&self.config)?;
                Ok((handle, source, engine))
            });
        let (handle, source, mut engine) = match restored {
            Ok(parts) => parts,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Restore failed, staying suspended");
                self.forwarder.emit(error_event(&e));
                return Err(e);
            }
        };

        engine.add_listener(self.forwarder.next_generation());
        install_source(engine.as_mut(), &source, true);
        engine.set_audio_attributes(AudioAttributes::default(), !self.options.mix_with_others);
        engine.set_video_surface(Some(handle));
        let selector = engine.track_selector();

        match state.snapshot.take() {
            Some(snapshot) => {
                engine.seek_to(snapshot.position_ms);
                engine.set_volume(snapshot.volume);
                engine.set_playback_parameters(PlaybackParameters::new(snapshot.playback_speed));
                engine.set_repeat_mode(snapshot.repeat_mode);
                if !snapshot.track_constraints.is_unconstrained() {
                    if let Some(selector) = selector.as_deref() {
                        tracks::apply_constraints(selector, snapshot.track_constraints);
                    }
                }
                engine.set_play_when_ready(snapshot.is_playing);
                state.constraints = snapshot.track_constraints;
                debug!(position_ms = snapshot.position_ms, "Replayed snapshot");
            }
            None => {
                engine.set_repeat_mode(RepeatMode::from_looping(self.options.looping));
                debug!("No snapshot to replay");
            }
        }
        engine.prepare();

        state.engine = Some(engine);
        state.selector = selector;
        state.source = source;
        self.transition(&mut state, LifecycleState::Active)?;
        info!(session_id = %self.id, surface = %handle, "Session restored");
        Ok(())
    }

    fn dispose(&self) {
        let mut state = self.state.lock();
        if state.lifecycle == LifecycleState::Disposed {
            debug!(session_id = %self.id, "Already disposed");
            return;
        }

        if let Some(mut engine) = state.engine.take() {
            engine.release();
        }
        state.selector = None;
        state.snapshot = None;
        self.surface.set_lifecycle_listener(None);
        self.surface.release();
        self.forwarder.detach();
        state.lifecycle = LifecycleState::Disposed;
        info!(session_id = %self.id, "Session disposed");
    }
}

/// Forwards surface callbacks to a session that may already be gone
struct SurfaceHook {
    session: Weak<SessionInner>,
}

impl SurfaceLifecycleListener for SurfaceHook {
    fn on_surface_destroyed(&self) {
        if let Some(session) = self.session.upgrade() {
            if let Err(e) = session.surface_destroyed() {
                warn!(error = %e, "Surface loss not handled");
            }
        }
    }

    fn on_surface_available(&self) {
        if let Some(session) = self.session.upgrade() {
            if let Err(e) = session.surface_available() {
                warn!(error = %e, "Surface restore not handled");
            }
        }
    }
}

fn install_source(engine: &mut dyn DecodeEngine, source: &PlayableSource, reset_position: bool) {
    match source {
        PlayableSource::Item(item) => engine.set_media_item(item),
        PlayableSource::Source(source) => engine.set_media_source(source, reset_position),
    }
}

fn error_event(e: &Error) -> PlayerEvent {
    PlayerEvent::Error {
        code: e.error_code().to_string(),
        message: e.to_string(),
    }
}
