//! Vidra Core - playback session lifecycle and media-source composition
//!
//! This crate sits between a host UI and an external decode engine:
//! - Resolves host inputs (URI, format hint, pre-fetched track manifests)
//! - Builds engine sources, merging independently described tracks
//! - Survives render surface loss by snapshotting and rebuilding the engine
//! - Normalizes engine events for the host
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Vidra Core                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  Descriptor  │─▶│    Source    │◀─│   Manifest   │           │
//! │  │   Resolver   │  │   Builder    │  │    Parser    │           │
//! │  └──────────────┘  └──────┬───────┘  └──────────────┘           │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │ VideoPlayer  │─▶│  Playback   │◀─│    Render    │            │
//! │  │   (facade)   │  │   Session   │  │   Surface    │            │
//! │  └──────────────┘  └──────┬──────┘  └──────────────┘            │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │    Track     │─▶│   Decode    │─▶│    Event     │──▶ host    │
//! │  │   Catalog    │  │   Engine    │  │  Forwarder   │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod error;
pub mod events;
pub mod manifest;
pub mod player;
pub mod session;
pub mod source;
pub mod surface;
pub mod tracks;
pub mod types;

pub use engine::{DecodeEngine, EngineEvent, EngineFactory, EngineListener, EngineState, TrackSelector};
pub use error::{Error, Result};
pub use events::{ChannelEventSink, EventSink, PlayerEvent};
pub use manifest::{parse_manifest, ParsedManifest};
pub use player::VideoPlayer;
pub use session::PlaybackSession;
pub use source::{
    MediaDescriptor, MediaSource, MediaSourceBuilder, PlayableSource, SourceInputs,
    TrackDescriptor,
};
pub use surface::{ManualSurface, RenderSurface, SurfaceHandle};
pub use tracks::{constrain_resolution, list_video_track_resolutions};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
pub fn init() {
    tracing::info!(version = VERSION, "Vidra Core initialized");
}
