//! Composed source example
//!
//! Resolves two pre-fetched DASH tracks plus one broken entry, builds the
//! merged source and prints its timeline.
//!
//! Run with: cargo run -p vidra-core --example composed_tracks

use vidra_core::source::{MediaSource, MediaSourceBuilder, PlayableSource, SourceInputs};
use vidra_core::{SessionConfig, TrackDescriptor, TrackKind};

const VIDEO_MPD: &str = r#"<MPD type="static" mediaPresentationDuration="PT2M">
  <Period id="main" start="PT0S">
    <AdaptationSet mimeType="video/mp4" frameRate="25">
      <Representation id="360" bandwidth="800000" width="640" height="360"/>
      <Representation id="720" bandwidth="2500000" width="1280" height="720"/>
    </AdaptationSet>
  </Period>
</MPD>"#;

const AUDIO_MPD: &str = r#"<MPD type="static" mediaPresentationDuration="PT2M1S">
  <Period id="main" start="PT0.2S">
    <AdaptationSet mimeType="audio/mp4">
      <Representation id="aac" bandwidth="128000" codecs="mp4a.40.2"/>
    </AdaptationSet>
  </Period>
</MPD>"#;

fn main() {
    println!("Vidra Core - Composed Source Example");
    println!("====================================\n");

    let inputs = SourceInputs::tracks(vec![
        TrackDescriptor::new(TrackKind::Dash, VIDEO_MPD, "https://cdn.example.com/video.mp4")
            .with_media_type("video"),
        TrackDescriptor::new(TrackKind::Dash, AUDIO_MPD, "https://cdn.example.com/audio.mp4")
            .with_media_type("audio"),
        TrackDescriptor::new(TrackKind::Dash, "<html>404</html>", "https://cdn.example.com/x.mp4"),
    ]);

    let descriptor = inputs.resolve();
    println!("Descriptor: {}", descriptor.kind_name());

    let builder = MediaSourceBuilder::new(SessionConfig::default());
    let source = match builder.build(&descriptor) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Build failed: {} ({})", e, e.error_code());
            return;
        }
    };

    match &source {
        PlayableSource::Source(MediaSource::Merged { sources, timeline, .. }) => {
            println!("Merged {} of 3 tracks", sources.len());
            for period in &timeline.periods {
                println!(
                    "  Period {}: duration={:?} constituents={:?} offsets_ms={:?}",
                    period.index, period.duration, period.constituents, period.time_offsets_ms
                );
            }
        }
        other => println!("Unmerged source: {:?}", other),
    }

    println!("\nDeclared video formats:");
    for format in source.declared_video_formats() {
        println!(
            "  {} ({}) @ {} bps",
            format.resolution(),
            format.resolution().quality_name(),
            format.bitrate
        );
    }
}
