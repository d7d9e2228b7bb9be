//! FrameWin - working-zone player
//!
//! Opens a source through the reader registry, caches a working zone in the
//! background and plays it through at the stream's frame rate.
//!
//! Usage: `framewin [source] [reader-config.json]`

use anyhow::{Context, Result};
use framewin_core::TimeSection;
use framewin_media::{
    DecodeBackend, FrameGenerator, GeneratorConfig, ReaderConfig, ReaderRegistry,
    ThreadScheduler, VideoReader,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("FrameWin starting...");

    let registry = framewin_media::init();

    let source = std::env::args().nth(1).map(PathBuf::from);
    let config = match std::env::args().nth(2).map(PathBuf::from) {
        Some(path) => ReaderConfig::load(&path)
            .with_context(|| format!("Failed to load reader config {}", path.display()))?,
        None => ReaderConfig::default(),
    };

    let (backend, source) = pick_backend(&registry, source)?;
    let mut reader = VideoReader::open(backend, &source, &config)
        .with_context(|| format!("Failed to open {}", source.display()))?;

    if let Some(metadata) = reader.read_metadata() {
        info!("Metadata: {}", metadata);
    }

    play(&mut reader, &config)?;
    reader.close();
    Ok(())
}

/// Backend for `source`, or a built-in test pattern when none is given.
fn pick_backend(
    registry: &ReaderRegistry,
    source: Option<PathBuf>,
) -> Result<(Box<dyn DecodeBackend>, PathBuf)> {
    match source {
        Some(path) => {
            let backend = registry.create_for_path(&path).with_context(|| {
                format!(
                    "No reader for {} (known: {})",
                    path.display(),
                    registry.extensions().join(", ")
                )
            })?;
            Ok((backend, path))
        }
        None => {
            info!("No source given, playing the built-in test pattern");
            let backend: Box<dyn DecodeBackend> =
                Box::new(FrameGenerator::new(GeneratorConfig::default()));
            Ok((backend, Path::new("bars.fwgen").to_path_buf()))
        }
    }
}

/// Give up on a source that stops delivering frames.
const MAX_CONSECUTIVE_MISSES: u32 = 100;

/// Cache the middle half of the stream and play it once.
fn play(reader: &mut VideoReader, config: &ReaderConfig) -> Result<()> {
    let full = reader.info().full_section();
    let zone = match full.bounds() {
        Some((start, end)) => {
            let quarter = (end - start) / 4;
            TimeSection::between(start + quarter, end - quarter)
        }
        None => full,
    };

    let decision = reader.update_working_zone(zone, false, config.budget, &ThreadScheduler)?;
    info!("Working zone {}: {}", zone, decision);

    let frame_duration = Duration::from_secs_f64(reader.info().frame_rate.frame_seconds());
    let started = Instant::now();
    let mut shown = 0u64;

    let interval = reader.info().average_timestamps_per_frame;
    let zone_end = zone.end().unwrap_or(0);
    let mut misses = 0u32;

    reader.move_first()?;
    loop {
        if reader.move_next(false)? {
            shown += 1;
            misses = 0;
        } else {
            let at_end = reader
                .current()
                .map_or(true, |slot| slot.timestamp + interval >= zone_end);
            misses += 1;
            if !reader.is_importing() && (at_end || misses > MAX_CONSECUTIVE_MISSES) {
                break;
            }
        }

        if let Some(progress) = reader.import_progress() {
            if shown % 25 == 0 {
                info!("Importing {}: {:.0}%", zone, progress.fraction() * 100.0);
            }
        }
        std::thread::sleep(frame_duration);
    }

    if let Some(outcome) = reader.last_import_outcome() {
        info!("Import finished: {:?}", outcome);
    }
    if reader.dropped_frames() > 0 {
        warn!("{} frames dropped", reader.dropped_frames());
    }
    info!(
        "Played {} frames of {} in {:.2}s (caching: {}, {} frames resident)",
        shown,
        zone,
        started.elapsed().as_secs_f64(),
        reader.is_caching(),
        reader.cache().len()
    );
    Ok(())
}
