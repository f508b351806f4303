//! In-process simulated decode engine
//!
//! Plays nothing. Tracks position, buffered range and play state, maps the
//! video formats the installed source declares, and raises the same events
//! a real engine would so sessions can be exercised from the command line.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use vidra_core::engine::{
    AudioAttributes, MappedTrackInfo, PlaybackParameters, RendererTracks, TrackGroup,
    TrackSelectionParameters, TrackType,
};
use vidra_core::source::MediaItem;
use vidra_core::{
    DecodeEngine, EngineEvent, EngineFactory, EngineListener, EngineState, Format, MediaSource,
    RepeatMode, Resolution, SessionConfig, SurfaceHandle, TrackSelector,
};

/// Simulated read-ahead
const READ_AHEAD_MS: u64 = 15_000;

#[derive(Default)]
struct SimSelector {
    mapped: Mutex<Option<MappedTrackInfo>>,
    parameters: Mutex<TrackSelectionParameters>,
}

impl TrackSelector for SimSelector {
    fn current_mapped_track_info(&self) -> Option<MappedTrackInfo> {
        self.mapped.lock().clone()
    }

    fn parameters(&self) -> TrackSelectionParameters {
        *self.parameters.lock()
    }

    fn set_parameters(&self, parameters: TrackSelectionParameters) {
        debug!(
            max = ?parameters.max_video_size,
            min = ?parameters.min_video_size,
            "Simulated selector constrained"
        );
        *self.parameters.lock() = parameters;
    }
}

struct SimState {
    id: usize,
    prepared: bool,
    released: bool,
    play_when_ready: bool,
    position_ms: u64,
    duration_ms: Option<u64>,
    volume: f32,
    speed: f32,
    repeat_mode: RepeatMode,
    surface: Option<SurfaceHandle>,
    formats: Vec<Format>,
    listeners: Vec<Arc<dyn EngineListener>>,
}

impl SimState {
    fn new(id: usize) -> Self {
        Self {
            id,
            prepared: false,
            released: false,
            play_when_ready: false,
            position_ms: 0,
            duration_ms: None,
            volume: 1.0,
            speed: 1.0,
            repeat_mode: RepeatMode::Off,
            surface: None,
            formats: Vec::new(),
            listeners: Vec::new(),
        }
    }

    fn buffered_ms(&self) -> u64 {
        let ahead = self.position_ms + READ_AHEAD_MS;
        self.duration_ms.map_or(ahead, |d| ahead.min(d))
    }

    /// Largest declared frame, reported as the video size once ready
    fn video_size(&self) -> Option<Resolution> {
        self.formats
            .iter()
            .map(Format::resolution)
            .max_by_key(|r| u64::from(r.width) * u64::from(r.height))
    }

    fn ready_event(&self) -> EngineEvent {
        EngineEvent::StateChanged {
            state: EngineState::Ready,
            duration_ms: self.duration_ms,
            video_size: self.video_size(),
        }
    }
}

/// Shared view of one simulated instance
#[derive(Clone)]
struct SimHandle {
    state: Arc<Mutex<SimState>>,
    selector: Arc<SimSelector>,
}

impl SimHandle {
    /// Run `f` under the state lock, then deliver the events it produced
    fn update(&self, f: impl FnOnce(&mut SimState) -> Vec<EngineEvent>) {
        let (events, listeners) = {
            let mut state = self.state.lock();
            if state.released {
                return;
            }
            let events = f(&mut state);
            (events, state.listeners.clone())
        };
        for event in events {
            for listener in &listeners {
                listener.on_event(event.clone());
            }
        }
    }
}

fn buffering() -> EngineEvent {
    EngineEvent::StateChanged {
        state: EngineState::Buffering,
        duration_ms: None,
        video_size: None,
    }
}

struct SimulatedEngine {
    handle: SimHandle,
}

impl DecodeEngine for SimulatedEngine {
    fn prepare(&mut self) {
        self.handle.update(|state| {
            state.prepared = true;
            let groups = vec![TrackGroup {
                formats: state.formats.clone(),
            }];
            *self.handle.selector.mapped.lock() = Some(MappedTrackInfo {
                renderers: vec![RendererTracks {
                    renderer_type: TrackType::Video,
                    groups,
                }],
            });
            debug!(engine = state.id, formats = state.formats.len(), "Simulated prepare");
            vec![buffering(), state.ready_event()]
        });
    }

    fn set_video_surface(&mut self, surface: Option<SurfaceHandle>) {
        self.handle.state.lock().surface = surface;
    }

    fn set_media_source(&mut self, source: &MediaSource, reset_position: bool) {
        let duration_ms = match source {
            MediaSource::LiveHls { .. } => None,
            MediaSource::Prefetched(prefetched) => prefetched.parsed.duration,
            MediaSource::Merged { timeline, .. } => timeline.duration(),
        }
        .map(|d| d.as_millis() as u64);
        let formats = source.declared_video_formats();

        self.handle.update(|state| {
            state.duration_ms = duration_ms;
            state.formats = formats;
            if reset_position {
                state.position_ms = 0;
            }
            if state.prepared {
                vec![buffering(), state.ready_event()]
            } else {
                Vec::new()
            }
        });
    }

    fn set_media_item(&mut self, item: &MediaItem) {
        debug!(
            uri = %item.uri,
            user_agent = item.user_agent.as_deref().unwrap_or("-"),
            check_interval_bytes = ?item.continue_loading_check_interval_bytes,
            "Simulated item installed"
        );
        self.handle.update(|state| {
            state.duration_ms = None;
            state.formats.clear();
            state.position_ms = 0;
            Vec::new()
        });
    }

    fn set_audio_attributes(&mut self, attributes: AudioAttributes, handle_audio_focus: bool) {
        debug!(?attributes, handle_audio_focus, "Simulated audio attributes");
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        self.handle.update(|state| {
            let changed = state.play_when_ready != play_when_ready;
            state.play_when_ready = play_when_ready;
            if changed && state.prepared {
                vec![EngineEvent::IsPlayingChanged(play_when_ready)]
            } else {
                Vec::new()
            }
        });
    }

    fn play_when_ready(&self) -> bool {
        self.handle.state.lock().play_when_ready
    }

    fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.handle.state.lock().repeat_mode = mode;
    }

    fn repeat_mode(&self) -> RepeatMode {
        self.handle.state.lock().repeat_mode
    }

    fn set_volume(&mut self, volume: f32) {
        self.handle.state.lock().volume = volume;
    }

    fn volume(&self) -> f32 {
        self.handle.state.lock().volume
    }

    fn set_playback_parameters(&mut self, parameters: PlaybackParameters) {
        self.handle.state.lock().speed = parameters.speed;
    }

    fn playback_parameters(&self) -> PlaybackParameters {
        PlaybackParameters::new(self.handle.state.lock().speed)
    }

    fn seek_to(&mut self, position_ms: u64) {
        self.handle.update(|state| {
            state.position_ms = state.duration_ms.map_or(position_ms, |d| position_ms.min(d));
            if state.prepared {
                vec![buffering(), state.ready_event()]
            } else {
                Vec::new()
            }
        });
    }

    fn current_position(&self) -> u64 {
        self.handle.state.lock().position_ms
    }

    fn buffered_position(&self) -> u64 {
        self.handle.state.lock().buffered_ms()
    }

    fn add_listener(&mut self, listener: Arc<dyn EngineListener>) {
        self.handle.state.lock().listeners.push(listener);
    }

    fn track_selector(&self) -> Option<Arc<dyn TrackSelector>> {
        let selector: Arc<dyn TrackSelector> = self.handle.selector.clone();
        Some(selector)
    }

    fn release(&mut self) {
        let mut state = self.handle.state.lock();
        debug!(engine = state.id, "Simulated engine released");
        state.released = true;
        state.listeners.clear();
    }
}

/// Creates simulated engines and keeps a handle on the newest one
#[derive(Clone, Default)]
pub struct SimulatedBackend {
    created: Arc<Mutex<Vec<SimHandle>>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> Arc<dyn EngineFactory> {
        let created = Arc::clone(&self.created);
        Arc::new(
            move |_config: &SessionConfig| -> vidra_core::Result<Box<dyn DecodeEngine>> {
                let mut created = created.lock();
                let handle = SimHandle {
                    state: Arc::new(Mutex::new(SimState::new(created.len()))),
                    selector: Arc::new(SimSelector::default()),
                };
                debug!(engine = created.len(), "Simulated engine created");
                created.push(handle.clone());
                Ok(Box::new(SimulatedEngine { handle }))
            },
        )
    }

    /// Engines created so far
    pub fn instances(&self) -> usize {
        self.created.lock().len()
    }

    fn current(&self) -> Option<SimHandle> {
        self.created.lock().last().cloned()
    }

    /// Advance the newest engine's clock
    pub fn tick(&self, elapsed_ms: u64) {
        let Some(handle) = self.current() else {
            return;
        };
        handle.update(|state| {
            if !state.prepared || !state.play_when_ready {
                return Vec::new();
            }
            let advanced = (elapsed_ms as f64 * f64::from(state.speed)) as u64;
            state.position_ms += advanced;

            match state.duration_ms {
                Some(duration) if state.position_ms >= duration => {
                    if state.repeat_mode == RepeatMode::All {
                        state.position_ms %= duration.max(1);
                        Vec::new()
                    } else {
                        state.position_ms = duration;
                        state.play_when_ready = false;
                        vec![
                            EngineEvent::StateChanged {
                                state: EngineState::Ended,
                                duration_ms: None,
                                video_size: None,
                            },
                            EngineEvent::IsPlayingChanged(false),
                        ]
                    }
                }
                _ => Vec::new(),
            }
        });
    }

    /// Raise an engine error on the newest engine
    pub fn fault(&self, code: &str, message: &str) {
        if let Some(handle) = self.current() {
            handle.update(|_| {
                vec![EngineEvent::Error {
                    code: code.to_string(),
                    message: message.to_string(),
                }]
            });
        }
    }
}
