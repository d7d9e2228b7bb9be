//! End-to-end playback of generated sources through the registry.

use framewin_core::{FrameRate, FrameSize, TimeSection};
use framewin_media::{
    CacheBudget, GeneratorConfig, ImportOutcome, InlineScheduler, ReaderConfig, ThreadScheduler,
    VideoReader, ZoneDecision,
};
use std::path::{Path, PathBuf};

fn write_source(dir: &Path, config: GeneratorConfig) -> PathBuf {
    let path = dir.join("bars.fwgen");
    config.save(&path).unwrap();
    path
}

fn open_source(path: &Path, config: &ReaderConfig) -> VideoReader {
    let registry = framewin_media::init();
    let backend = registry.create_for_path(path).unwrap();
    VideoReader::open(backend, path, config).unwrap()
}

#[test]
fn registry_knows_generated_sources() {
    let registry = framewin_media::init();
    assert!(registry.is_registered("fwgen"));
    assert!(registry.create_for_path(Path::new("clip.FWGEN")).is_some());
    assert!(registry.create_for_path(Path::new("clip.mp4")).is_none());
}

#[test]
fn open_missing_source_fails() {
    let registry = framewin_media::init();
    let path = Path::new("/nonexistent/bars.fwgen");
    let backend = registry.create_for_path(path).unwrap();
    assert!(VideoReader::open(backend, path, &ReaderConfig::default()).is_err());
}

#[test]
fn background_import_plays_whole_zone() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(dir.path(), GeneratorConfig::default());
    let mut reader = open_source(&path, &ReaderConfig::default());

    let zone = reader.info().full_section();
    let decision = reader
        .update_working_zone(zone, false, CacheBudget::default(), &ThreadScheduler)
        .unwrap();
    assert_eq!(decision, ZoneDecision::FullReload);
    assert_eq!(
        reader.wait_for_import().unwrap(),
        Some(ImportOutcome::Completed)
    );
    assert!(reader.is_caching());
    assert_eq!(reader.cache().len(), 250);

    assert!(reader.move_first().unwrap());
    let mut played = 1;
    while reader.move_next(true).unwrap() {
        played += 1;
    }
    assert_eq!(played, 250);
    assert_eq!(reader.current().map(|s| s.sequence_index), Some(249));
}

#[test]
fn byte_budget_for_exact_frame_count_keeps_caching() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(
        dir.path(),
        GeneratorConfig {
            width: 100,
            height: 100,
            frame_count: 20,
            ..GeneratorConfig::default()
        },
    );
    let mut reader = open_source(&path, &ReaderConfig::default());

    let budget = CacheBudget::new(100.0, 20 * reader.info().frame_bytes());
    let zone = reader.info().full_section();
    reader
        .update_working_zone(zone, false, budget, &InlineScheduler)
        .unwrap();
    assert!(reader.is_caching());
    assert_eq!(reader.cache().len(), 20);
    assert_eq!(reader.cache().evictions(), 0);
    assert_eq!(reader.cache().memory_size(), budget.max_bytes);
}

#[test]
fn configured_aspect_ratio_applies_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(
        dir.path(),
        GeneratorConfig {
            width: 720,
            height: 576,
            frame_count: 10,
            ..GeneratorConfig::default()
        },
    );
    let config_path = dir.path().join("reader.json");
    std::fs::write(
        &config_path,
        r#"{ "options": { "aspect_ratio": "Force169" } }"#,
    )
    .unwrap();
    let config = ReaderConfig::load(&config_path).unwrap();

    let mut reader = open_source(&path, &config);
    assert_eq!(reader.info().aspect_ratio_size, FrameSize::new(720, 405));
    reader.move_to(0).unwrap();
    let image = reader.current_image().unwrap();
    assert_eq!(image.size(), FrameSize::new(720, 405));
}

#[test]
fn zone_shrink_then_grow_through_generator() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(dir.path(), GeneratorConfig::default());
    let mut reader = open_source(&path, &ReaderConfig::default());
    let frame = reader.info().average_timestamps_per_frame;
    let zone = |a: i64, b: i64| TimeSection::between(a * frame, b * frame);
    let budget = CacheBudget::default();

    reader
        .update_working_zone(zone(0, 100), false, budget, &InlineScheduler)
        .unwrap();
    reader
        .update_working_zone(zone(20, 80), false, budget, &InlineScheduler)
        .unwrap();
    let decision = reader
        .update_working_zone(zone(10, 80), false, budget, &InlineScheduler)
        .unwrap();
    assert_eq!(decision, ZoneDecision::Prepend(zone(10, 20)));
    assert_eq!(reader.cache().len(), 70);
    assert_eq!(reader.cache().first().map(|s| s.sequence_index), Some(10));
    assert_eq!(reader.cache().last().map(|s| s.sequence_index), Some(79));
}

#[test]
fn realtime_source_drops_early_requests() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(
        dir.path(),
        GeneratorConfig {
            frame_rate: FrameRate::new(1, 10),
            frame_count: 5,
            realtime: true,
            ..GeneratorConfig::default()
        },
    );
    let mut reader = open_source(&path, &ReaderConfig::default());
    reader
        .update_working_zone(reader.info().full_section(), false, CacheBudget::NONE, &InlineScheduler)
        .unwrap();

    // Seeking makes the following frame due immediately.
    assert!(reader.move_to(0).unwrap());
    assert!(reader.move_next(false).unwrap());
    assert!(!reader.move_next(false).unwrap());
    assert_eq!(reader.dropped_frames(), 1);
    assert_eq!(reader.current().map(|s| s.sequence_index), Some(1));
}

#[test]
fn summary_of_generated_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(
        dir.path(),
        GeneratorConfig {
            width: 640,
            height: 360,
            ..GeneratorConfig::default()
        },
    );
    let reader = open_source(&path, &ReaderConfig::default());

    let summary = reader.extract_summary(&path, 3, 80).unwrap();
    assert!(summary.is_valid());
    assert_eq!(summary.duration_ms, 10_000);
    assert_eq!(summary.thumbnails.len(), 3);
    assert_eq!(summary.thumbnails[0].size(), FrameSize::new(80, 45));

    let metadata = reader.read_metadata().unwrap();
    assert!(metadata.contains("\"width\":640"));
}
