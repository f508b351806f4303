//! Video track catalog and resolution pinning

use crate::engine::{TrackSelector, TrackType};
use crate::{Resolution, TrackConstraints, TrackInfo};
use tracing::debug;

/// Enumerate every video format the engine has mapped.
///
/// Empty until the engine has prepared, and when no selector is bound.
pub fn list_video_track_resolutions(selector: Option<&dyn TrackSelector>) -> Vec<TrackInfo> {
    let Some(mapped) = selector.and_then(|s| s.current_mapped_track_info()) else {
        return Vec::new();
    };

    mapped
        .renderers
        .iter()
        .filter(|renderer| renderer.renderer_type == TrackType::Video)
        .flat_map(|renderer| renderer.groups.iter())
        .flat_map(|group| group.formats.iter())
        .map(|format| TrackInfo {
            width: format.width,
            height: format.height,
        })
        .collect()
}

/// Pin the selector's bounds to exactly `width`x`height`
pub fn constrain_resolution(selector: Option<&dyn TrackSelector>, width: u32, height: u32) {
    let Some(selector) = selector else {
        debug!("No track selector bound, ignoring resolution constraint");
        return;
    };
    apply_constraints(selector, TrackConstraints::pinned(width, height));
}

/// Write constraints on top of the selector's current parameters
pub(crate) fn apply_constraints(selector: &dyn TrackSelector, constraints: TrackConstraints) {
    let mut parameters = selector.parameters();
    parameters.max_video_size = constraints.max_video_size;
    parameters.min_video_size = constraints.min_video_size;
    debug!(
        max = ?parameters.max_video_size.map(|r| r.to_string()),
        min = ?parameters.min_video_size.map(|r| r.to_string()),
        "Applying track constraints"
    );
    selector.set_parameters(parameters);
}

/// Constraints currently set on a selector
pub(crate) fn current_constraints(selector: &dyn TrackSelector) -> TrackConstraints {
    let parameters = selector.parameters();
    TrackConstraints {
        min_video_size: parameters.min_video_size,
        max_video_size: parameters.max_video_size,
    }
}

impl From<TrackInfo> for Resolution {
    fn from(info: TrackInfo) -> Self {
        Resolution::new(info.width, info.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MappedTrackInfo, RendererTracks, TrackGroup, TrackSelectionParameters};
    use crate::Format;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct StubSelector {
        mapped: Option<MappedTrackInfo>,
        parameters: Mutex<TrackSelectionParameters>,
    }

    impl TrackSelector for StubSelector {
        fn current_mapped_track_info(&self) -> Option<MappedTrackInfo> {
            self.mapped.clone()
        }

        fn parameters(&self) -> TrackSelectionParameters {
            *self.parameters.lock()
        }

        fn set_parameters(&self, parameters: TrackSelectionParameters) {
            *self.parameters.lock() = parameters;
        }
    }

    fn mapped() -> MappedTrackInfo {
        MappedTrackInfo {
            renderers: vec![
                RendererTracks {
                    renderer_type: TrackType::Video,
                    groups: vec![
                        TrackGroup {
                            formats: vec![Format::video(640, 360), Format::video(1280, 720)],
                        },
                        TrackGroup {
                            formats: vec![Format::video(1920, 1080)],
                        },
                    ],
                },
                RendererTracks {
                    renderer_type: TrackType::Audio,
                    groups: vec![TrackGroup {
                        formats: vec![Format::video(0, 0)],
                    }],
                },
            ],
        }
    }

    #[test]
    fn test_lists_video_renderer_formats_only() {
        let selector = StubSelector {
            mapped: Some(mapped()),
            ..Default::default()
        };
        let tracks = list_video_track_resolutions(Some(&selector));
        assert_eq!(
            tracks,
            vec![
                TrackInfo { width: 640, height: 360 },
                TrackInfo { width: 1280, height: 720 },
                TrackInfo { width: 1920, height: 1080 },
            ]
        );
    }

    #[test]
    fn test_empty_before_mapping() {
        let selector = StubSelector::default();
        assert!(list_video_track_resolutions(Some(&selector)).is_empty());
        assert!(list_video_track_resolutions(None).is_empty());
    }

    #[test]
    fn test_constrain_pins_both_bounds() {
        let selector = StubSelector::default();
        constrain_resolution(Some(&selector), 1280, 720);
        constrain_resolution(Some(&selector), 1280, 720);

        let parameters = selector.parameters();
        assert_eq!(parameters.max_video_size, Some(Resolution::new(1280, 720)));
        assert_eq!(parameters.min_video_size, Some(Resolution::new(1280, 720)));
        assert_eq!(current_constraints(&selector), TrackConstraints::pinned(1280, 720));
    }

    #[test]
    fn test_constrain_without_selector_is_noop() {
        constrain_resolution(None, 640, 360);
    }
}
