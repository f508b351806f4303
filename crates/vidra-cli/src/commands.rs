//! CLI command implementations

use crate::output::OutputFormat;
use crate::script::{parse_script, ScriptOp};
use crate::sim::SimulatedBackend;
use crate::SourceArgs;
use anyhow::{anyhow, bail, Context};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};
use vidra_core::manifest::detect_kind;
use vidra_core::source::{MediaSource, MediaSourceBuilder, PlayableSource, SourceInputs};
use vidra_core::{
    ChannelEventSink, Format, LifecycleState, ManualSurface, PlaybackOptions, PlayerEvent,
    RenderSurface, SessionConfig, TrackDescriptor, TrackKind, VideoPlayer,
};

/// Load session config from a JSON file, or use defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<SessionConfig> {
    match path {
        Some(path) => {
            let config = SessionConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            info!(path = %path.display(), "Loaded session config");
            Ok(config)
        }
        None => Ok(SessionConfig::default()),
    }
}

/// Turn command line source arguments into session inputs
pub fn source_inputs(args: &SourceArgs) -> anyhow::Result<SourceInputs> {
    let tracks = args
        .tracks
        .iter()
        .map(String::as_str)
        .map(parse_track)
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(SourceInputs {
        uri: args.url.clone(),
        format_hint: args.format_hint.clone(),
        tracks,
    })
}

/// `[kind:]manifest_path:content_url`
fn parse_track(spec: &str) -> anyhow::Result<TrackDescriptor> {
    let (kind, path, content_url) = split_track_spec(spec)?;
    let manifest =
        std::fs::read(path).with_context(|| format!("reading manifest {}", path))?;
    let kind = match kind {
        Some(kind) => kind,
        None => detect_kind(&manifest).ok_or_else(|| {
            anyhow!("cannot tell whether {} is DASH or HLS, prefix it with dash: or hls:", path)
        })?,
    };
    Ok(TrackDescriptor::new(kind, manifest, content_url))
}

/// The kind prefix is optional; without it the kind is read from the manifest
fn split_track_spec(spec: &str) -> anyhow::Result<(Option<TrackKind>, &str, &str)> {
    let (kind, rest) = match spec.split_once(':') {
        Some((prefix, rest)) => match prefix.parse::<TrackKind>() {
            Ok(kind) => (Some(kind), rest),
            Err(_) => (None, spec),
        },
        None => (None, spec),
    };
    match rest.split_once(':') {
        Some((path, content_url)) if !path.is_empty() && !content_url.is_empty() => {
            Ok((kind, path, content_url))
        }
        _ => bail!("track must be [kind:]manifest_path:content_url, got '{}'", spec),
    }
}

/// Print the resolved descriptor
pub fn resolve(args: &SourceArgs, format: OutputFormat) -> anyhow::Result<()> {
    let descriptor = source_inputs(args)?.resolve();

    format.print(&descriptor, || {
        println!("Resolved descriptor: {}", descriptor.kind_name());
        match &descriptor {
            vidra_core::MediaDescriptor::SingleUri { uri, mime_type } => {
                println!("  URI: {}", uri);
                match mime_type {
                    Some(mime) => println!("  MIME: {}", mime),
                    None => println!("  MIME: (inferred by engine)"),
                }
            }
            vidra_core::MediaDescriptor::AdaptiveUri { uri } => println!("  Playlist: {}", uri),
            vidra_core::MediaDescriptor::ComposedTracks { tracks } => {
                for (i, track) in tracks.iter().enumerate() {
                    println!(
                        "  {}. {} {} ({} bytes){}",
                        i + 1,
                        track.kind,
                        track.content_uri,
                        track.manifest.len(),
                        track
                            .media_type
                            .as_deref()
                            .map(|t| format!(" [{}]", t))
                            .unwrap_or_default()
                    );
                }
            }
        }
    })
}

#[derive(Serialize)]
struct BuildReport<'a> {
    source: &'a PlayableSource,
    declared_video_formats: Vec<Format>,
}

/// Build the source and print its structure
pub fn build(args: &SourceArgs, config: SessionConfig, format: OutputFormat) -> anyhow::Result<()> {
    let descriptor = source_inputs(args)?.resolve();
    let source = MediaSourceBuilder::new(config).build(&descriptor)?;
    let report = BuildReport {
        source: &source,
        declared_video_formats: source.declared_video_formats(),
    };

    format.print(&report, || {
        println!("Built source from {}:", descriptor.kind_name());
        match &source {
            PlayableSource::Item(item) => {
                println!("  Media item: {}", item.uri);
                if let Some(mime) = item.mime_type {
                    println!("  MIME: {}", mime);
                }
            }
            PlayableSource::Source(source) => print_source(source, 1),
        }

        if !report.declared_video_formats.is_empty() {
            println!("\nDeclared video formats:");
            for f in &report.declared_video_formats {
                println!(
                    "  {} {:>6} {:>9}bps {}",
                    f.resolution(),
                    f.resolution().quality_name(),
                    f.bitrate,
                    f.codecs.as_deref().unwrap_or("-")
                );
            }
        }
    })
}

fn print_source(source: &MediaSource, depth: usize) {
    let indent = "  ".repeat(depth);
    match source {
        MediaSource::LiveHls {
            item,
            allow_chunkless_preparation,
            playlist_stuck_target_duration_coefficient,
        } => {
            println!("{}Live HLS: {}", indent, item.uri);
            if let Some(live) = item.live_configuration {
                println!("{}  Live edge offset: {}ms", indent, live.target_offset_ms);
            }
            println!("{}  Chunkless preparation: {}", indent, allow_chunkless_preparation);
            println!(
                "{}  Stuck playlist coefficient: {}",
                indent, playlist_stuck_target_duration_coefficient
            );
        }
        MediaSource::Prefetched(prefetched) => {
            println!(
                "{}Prefetched {}: {} (live: {}, duration: {:?}, periods: {})",
                indent,
                prefetched.kind,
                prefetched.content_uri,
                prefetched.parsed.is_live,
                prefetched.parsed.duration,
                prefetched.parsed.periods.len()
            );
        }
        MediaSource::Merged {
            sources,
            adjust_period_time_offsets,
            timeline,
        } => {
            println!(
                "{}Merged {} sources (adjust offsets: {})",
                indent,
                sources.len(),
                adjust_period_time_offsets
            );
            for source in sources {
                print_source(source, depth + 1);
            }
            println!("{}Timeline:", indent);
            for period in &timeline.periods {
                println!(
                    "{}  Period {}: duration {:?}, constituents {:?}, offsets {:?}ms",
                    indent,
                    period.index,
                    period.duration,
                    period.constituents,
                    period.time_offsets_ms
                );
            }
        }
    }
}

#[derive(Serialize)]
struct EventLine {
    time: String,
    #[serde(flatten)]
    event: PlayerEvent,
}

#[derive(Serialize)]
struct OpLine {
    time: String,
    op: String,
    state: LifecycleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn now() -> String {
    chrono::Utc::now().format("%H:%M:%S%.3f").to_string()
}

fn drain_events(rx: &mut UnboundedReceiver<PlayerEvent>, format: OutputFormat) -> anyhow::Result<()> {
    while let Ok(event) = rx.try_recv() {
        let line = EventLine { time: now(), event };
        format.line(&line, || format!("[{}]   <- {:?}", line.time, line.event))?;
    }
    Ok(())
}

/// Run a scripted session against the simulated engine
pub async fn simulate(
    args: &SourceArgs,
    script: &str,
    options: PlaybackOptions,
    config: SessionConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let ops = parse_script(script)?;
    let inputs = source_inputs(args)?;

    let backend = SimulatedBackend::new();
    let surface = Arc::new(ManualSurface::new());
    let (sink, mut rx) = ChannelEventSink::new();

    let binding: Arc<dyn RenderSurface> = surface.clone();
    let created = VideoPlayer::create(
        binding,
        &inputs,
        options,
        backend.factory(),
        Arc::new(sink),
        config,
    );
    let player = match created {
        Ok(player) => player,
        Err(e) => {
            drain_events(&mut rx, format)?;
            return Err(e).context("session did not start");
        }
    };

    if format == OutputFormat::Text {
        println!(
            "[{}] Session {} {} ({})",
            now(),
            player.id(),
            player.state(),
            player.descriptor().kind_name()
        );
    }
    drain_events(&mut rx, format)?;

    for op in &ops {
        let outcome = apply(&player, &surface, &backend, op);
        let line = OpLine {
            time: now(),
            op: op.to_string(),
            state: player.state(),
            result: outcome.as_ref().ok().cloned().flatten(),
            error: outcome.as_ref().err().map(|e| e.to_string()),
        };
        format.line(&line, || {
            let detail = match (&line.result, &line.error) {
                (_, Some(error)) => format!(" failed: {}", error),
                (Some(result), None) => format!(" = {}", result),
                (None, None) => String::new(),
            };
            format!("[{}] -> {}{} ({})", line.time, line.op, detail, line.state)
        })?;
        drain_events(&mut rx, format)?;
    }

    if player.state() != LifecycleState::Disposed {
        player.dispose();
    }
    if format == OutputFormat::Text {
        println!(
            "[{}] Done: {} ops, {} engine instance(s)",
            now(),
            ops.len(),
            backend.instances()
        );
    }
    Ok(())
}

fn apply(
    player: &VideoPlayer,
    surface: &ManualSurface,
    backend: &SimulatedBackend,
    op: &ScriptOp,
) -> anyhow::Result<Option<serde_json::Value>> {
    match op {
        ScriptOp::Play => player.play()?,
        ScriptOp::Pause => player.pause()?,
        ScriptOp::Seek(ms) => player.seek_to(*ms)?,
        ScriptOp::Volume(v) => player.set_volume(*v)?,
        ScriptOp::Speed(s) => player.set_playback_speed(*s)?,
        ScriptOp::Loop(on) => player.set_looping(*on)?,
        ScriptOp::Resolution(r) => player.select_resolution(r.width, r.height)?,
        ScriptOp::Detach => surface.destroy(),
        ScriptOp::Attach => {
            let handle = surface.recreate();
            if player.state() == LifecycleState::Suspended {
                warn!(surface = %handle, "Session did not resume on new surface");
            }
        }
        ScriptOp::Resolutions => {
            return Ok(Some(serde_json::to_value(player.available_resolutions()?)?))
        }
        ScriptOp::Position => return Ok(Some(player.position()?.into())),
        ScriptOp::Buffered => {
            let buffered = player.session().buffered_position()?;
            player.send_buffering_update()?;
            return Ok(Some(buffered.into()));
        }
        ScriptOp::Tick(ms) => backend.tick(*ms),
        ScriptOp::Fault(code) => backend.fault(code, "injected engine fault"),
        ScriptOp::Swap(uri) => player.change_data_source(&SourceInputs::uri(uri.clone()))?,
        ScriptOp::Dispose => player.dispose(),
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_spec_with_kind() {
        let (kind, path, url) = split_track_spec("hls:audio.m3u8:https://cdn/a.mp4").unwrap();
        assert_eq!(kind, Some(TrackKind::Hls));
        assert_eq!(path, "audio.m3u8");
        assert_eq!(url, "https://cdn/a.mp4");
    }

    #[test]
    fn test_track_spec_without_kind() {
        let (kind, path, url) = split_track_spec("video.mpd:https://cdn/v.mp4").unwrap();
        assert_eq!(kind, None);
        assert_eq!(path, "video.mpd");
        assert_eq!(url, "https://cdn/v.mp4");
    }

    #[test]
    fn test_track_kind_read_from_manifest() {
        let path = std::env::temp_dir().join(format!("vidra-cli-{}.mpd", std::process::id()));
        std::fs::write(&path, r#"<MPD type="static"></MPD>"#).unwrap();

        let spec = format!("{}:https://cdn/v.mp4", path.display());
        let track = parse_track(&spec).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(track.kind, TrackKind::Dash);
        assert_eq!(track.content_uri, "https://cdn/v.mp4");
    }

    #[test]
    fn test_track_spec_rejects_missing_parts() {
        assert!(split_track_spec("dash:only-path").is_err());
        assert!(split_track_spec("nothing").is_err());
    }
}
