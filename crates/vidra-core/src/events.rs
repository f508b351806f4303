//! Host event contract and engine event normalization
//!
//! Engine events arrive on the engine's thread. [`EventForwarder`] renames
//! them into [`PlayerEvent`]s, drops events from released engine instances,
//! holds events back until the session is active, and hands the rest to the
//! host's [`EventSink`].

use crate::engine::{EngineEvent, EngineListener, EngineState};
use crate::Resolution;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Normalized events delivered to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// First time the engine reports ready
    Initialized {
        duration_ms: Option<u64>,
        size: Option<Resolution>,
    },
    BufferingStart,
    BufferingEnd,
    BufferingUpdate {
        buffered_ms: u64,
    },
    IsPlayingChanged {
        is_playing: bool,
    },
    Completed,
    Error {
        code: String,
        message: String,
    },
}

impl PlayerEvent {
    /// Invoke the matching sink method
    pub fn dispatch(self, sink: &dyn EventSink) {
        match self {
            PlayerEvent::Initialized { duration_ms, size } => sink.on_initialized(duration_ms, size),
            PlayerEvent::BufferingStart => sink.on_buffering_start(),
            PlayerEvent::BufferingEnd => sink.on_buffering_end(),
            PlayerEvent::BufferingUpdate { buffered_ms } => sink.on_buffering_update(buffered_ms),
            PlayerEvent::IsPlayingChanged { is_playing } => sink.on_is_playing_changed(is_playing),
            PlayerEvent::Completed => sink.on_completed(),
            PlayerEvent::Error { code, message } => sink.on_error(&code, &message),
        }
    }
}

/// Host callbacks.
///
/// Invoked from whatever thread the engine uses. Implementations must not
/// block and must not call session control methods synchronously; post to the
/// control context instead (see [`ChannelEventSink`]).
pub trait EventSink: Send + Sync {
    fn on_initialized(&self, duration_ms: Option<u64>, size: Option<Resolution>);
    fn on_buffering_start(&self);
    fn on_buffering_end(&self);
    fn on_buffering_update(&self, buffered_ms: u64);
    fn on_is_playing_changed(&self, is_playing: bool);
    fn on_completed(&self);
    fn on_error(&self, code: &str, message: &str);
}

/// Sink that queues events onto an unbounded channel for the control task
#[derive(Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: PlayerEvent) {
        // Receiver gone means the host stopped listening
        let _ = self.tx.send(event);
    }
}

impl EventSink for ChannelEventSink {
    fn on_initialized(&self, duration_ms: Option<u64>, size: Option<Resolution>) {
        self.send(PlayerEvent::Initialized { duration_ms, size });
    }

    fn on_buffering_start(&self) {
        self.send(PlayerEvent::BufferingStart);
    }

    fn on_buffering_end(&self) {
        self.send(PlayerEvent::BufferingEnd);
    }

    fn on_buffering_update(&self, buffered_ms: u64) {
        self.send(PlayerEvent::BufferingUpdate { buffered_ms });
    }

    fn on_is_playing_changed(&self, is_playing: bool) {
        self.send(PlayerEvent::IsPlayingChanged { is_playing });
    }

    fn on_completed(&self) {
        self.send(PlayerEvent::Completed);
    }

    fn on_error(&self, code: &str, message: &str) {
        self.send(PlayerEvent::Error {
            code: code.to_string(),
            message: message.to_string(),
        });
    }
}

enum Gate {
    /// Session not active yet; events wait here in arrival order
    Holding(VecDeque<PlayerEvent>),
    Open,
    Detached,
}

struct ForwarderState {
    generation: u64,
    gate: Gate,
    is_buffering: bool,
    initialized: bool,
}

/// Normalizes engine events for one session.
///
/// Delivery happens under the forwarder's own lock, never the session's, so
/// sink calls stay ordered and cannot deadlock against control calls.
pub(crate) struct EventForwarder {
    sink: Arc<dyn EventSink>,
    state: Mutex<ForwarderState>,
}

impl EventForwarder {
    pub(crate) fn new(sink: Arc<dyn EventSink>) -> Arc<Self> {
        Arc::new(Self {
            sink,
            state: Mutex::new(ForwarderState {
                generation: 0,
                gate: Gate::Holding(VecDeque::new()),
                is_buffering: false,
                initialized: false,
            }),
        })
    }

    /// Start a new engine generation and return a listener bound to it.
    ///
    /// Events still arriving from the previous instance are dropped from here on.
    pub(crate) fn next_generation(self: &Arc<Self>) -> Arc<dyn EngineListener> {
        let mut state = self.state.lock();
        state.generation += 1;
        if state.is_buffering {
            // The released engine can no longer end its buffering episode
            state.is_buffering = false;
            Self::deliver(&self.sink, &mut state.gate, PlayerEvent::BufferingEnd);
        }
        Arc::new(GenerationListener {
            forwarder: Arc::clone(self),
            generation: state.generation,
        })
    }

    /// Release held events in order and deliver directly from now on
    pub(crate) fn open(&self) {
        let mut state = self.state.lock();
        if let Gate::Holding(held) = std::mem::replace(&mut state.gate, Gate::Open) {
            if !held.is_empty() {
                debug!(count = held.len(), "Flushing events held during construction");
            }
            for event in held {
                event.dispatch(self.sink.as_ref());
            }
        }
    }

    /// Stop delivering anything
    pub(crate) fn detach(&self) {
        let mut state = self.state.lock();
        state.gate = Gate::Detached;
    }

    /// Session-originated event (buffering update, construction error)
    pub(crate) fn emit(&self, event: PlayerEvent) {
        let mut state = self.state.lock();
        Self::deliver(&self.sink, &mut state.gate, event);
    }

    /// Deliver regardless of the gate, used when construction fails and the
    /// session will never open
    pub(crate) fn emit_now(&self, event: PlayerEvent) {
        let state = self.state.lock();
        if !matches!(state.gate, Gate::Detached) {
            event.dispatch(self.sink.as_ref());
        }
    }

    fn handle_engine_event(&self, generation: u64, event: EngineEvent) {
        let mut state = self.state.lock();
        if generation != state.generation {
            debug!(
                event_generation = generation,
                current = state.generation,
                "Dropping event from released engine"
            );
            return;
        }

        for normalized in Self::normalize(&mut state, event) {
            Self::deliver(&self.sink, &mut state.gate, normalized);
        }
    }

    fn normalize(state: &mut ForwarderState, event: EngineEvent) -> Vec<PlayerEvent> {
        let mut out = Vec::with_capacity(2);
        match event {
            EngineEvent::StateChanged {
                state: engine_state,
                duration_ms,
                video_size,
            } => {
                if engine_state == EngineState::Buffering {
                    if !state.is_buffering {
                        state.is_buffering = true;
                        out.push(PlayerEvent::BufferingStart);
                    }
                    return out;
                }

                if state.is_buffering {
                    state.is_buffering = false;
                    out.push(PlayerEvent::BufferingEnd);
                }

                match engine_state {
                    EngineState::Ready if !state.initialized => {
                        state.initialized = true;
                        out.push(PlayerEvent::Initialized {
                            duration_ms,
                            size: video_size,
                        });
                    }
                    EngineState::Ended => out.push(PlayerEvent::Completed),
                    _ => {}
                }
            }
            EngineEvent::IsPlayingChanged(is_playing) => {
                out.push(PlayerEvent::IsPlayingChanged { is_playing });
            }
            EngineEvent::Error { code, message } => {
                out.push(PlayerEvent::Error { code, message });
            }
        }
        out
    }

    fn deliver(sink: &Arc<dyn EventSink>, gate: &mut Gate, event: PlayerEvent) {
        match gate {
            Gate::Holding(held) => held.push_back(event),
            Gate::Open => event.dispatch(sink.as_ref()),
            Gate::Detached => {}
        }
    }
}

struct GenerationListener {
    forwarder: Arc<EventForwarder>,
    generation: u64,
}

impl EngineListener for GenerationListener {
    fn on_event(&self, event: EngineEvent) {
        self.forwarder.handle_engine_event(self.generation, event);
    }
}
