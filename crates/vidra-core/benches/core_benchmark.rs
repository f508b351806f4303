//! Benchmark tests for vidra-core operations
//!
//! Run with: cargo bench -p vidra-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use vidra_core::manifest::{parse_manifest, parse_mpd};
use vidra_core::source::{resolve, MediaSourceBuilder, TrackDescriptor};
use vidra_core::{SessionConfig, TrackKind};

// ============================================================================
// Helpers
// ============================================================================

fn create_test_mpd(periods: usize, representations: usize) -> String {
    let mut mpd = String::from(
        r#"<?xml version="1.0"?><MPD type="static" mediaPresentationDuration="PT10M">"#,
    );
    for p in 0..periods {
        mpd.push_str(&format!(
            r#"<Period id="{}" start="PT{}S" duration="PT60S"><AdaptationSet mimeType="video/mp4" frameRate="30">"#,
            p,
            p * 60
        ));
        for r in 0..representations {
            let height = 240 + r * 120;
            mpd.push_str(&format!(
                r#"<Representation id="v{}" bandwidth="{}" width="{}" height="{}" codecs="avc1.64001f"/>"#,
                r,
                400_000 * (r + 1),
                height * 16 / 9,
                height
            ));
        }
        mpd.push_str("</AdaptationSet></Period>");
    }
    mpd.push_str("</MPD>");
    mpd
}

fn create_test_tracks(count: usize) -> Vec<TrackDescriptor> {
    (0..count)
        .map(|i| {
            TrackDescriptor::new(
                TrackKind::Dash,
                create_test_mpd(2, 4),
                format!("https://cdn.example.com/track{}.mp4", i),
            )
        })
        .collect()
}

const MASTER_PLAYLIST: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
360p.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720
720p.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
1080p.m3u8
";

// ============================================================================
// Manifest Benchmarks
// ============================================================================

fn bench_manifest_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("manifest");

    for representations in [2usize, 6, 12] {
        let mpd = create_test_mpd(3, representations);
        group.bench_with_input(
            BenchmarkId::new("parse_mpd", representations),
            &mpd,
            |b, mpd| b.iter(|| parse_mpd(black_box(mpd))),
        );
    }

    group.bench_function("parse_master_playlist", |b| {
        b.iter(|| parse_manifest(TrackKind::Hls, black_box(MASTER_PLAYLIST.as_bytes())))
    });

    group.finish();
}

// ============================================================================
// Source Benchmarks
// ============================================================================

fn bench_source_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("source");
    let builder = MediaSourceBuilder::new(SessionConfig::default());

    group.bench_function("resolve_uri", |b| {
        b.iter(|| resolve(black_box(Some("https://live.example.com/index.m3u8")), None, &[]))
    });

    for count in [1usize, 2, 4] {
        let tracks = create_test_tracks(count);
        group.bench_with_input(
            BenchmarkId::new("resolve_and_build_composed", count),
            &tracks,
            |b, tracks| {
                b.iter(|| {
                    let descriptor = resolve(None, None, black_box(tracks));
                    builder.build(&descriptor)
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_manifest_parsing, bench_source_building);
criterion_main!(benches);
