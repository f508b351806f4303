//! Source resolution and construction

mod builder;
mod descriptor;

pub use builder::{
    LiveConfiguration, MediaItem, MediaSource, MediaSourceBuilder, MergedPeriod, MergedTimeline,
    PlayableSource, PrefetchedSource,
};
pub use descriptor::{
    resolve, AuxiliaryEntry, MediaDescriptor, SourceInputs, TrackDescriptor,
    ADAPTIVE_PLAYLIST_EXTENSION,
};
