//! Procedural decode backend.
//!
//! `FrameGenerator` produces a moving-bar test pattern described by a small
//! JSON file (`.fwgen`). It supports every backend operation, so it doubles
//! as the reference backend for the reader and as a stand-in capture device
//! when `realtime` is set.

use crate::backend::{DecodeBackend, NextFrame, ReaderFlags, VideoInfo, VideoSummary};
use crate::config::{CacheBudget, VideoOptions};
use crate::import::ImportSink;
use framewin_core::{
    FrameBuffer, FrameRate, FrameSize, FrameSlot, FrameWinError, OpenError, Result, TimeBase,
    TimeSection, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// File extension of generator sources.
pub const GENERATOR_EXTENSION: &str = "fwgen";

/// Description of a generated stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    pub frame_count: u64,
    /// Deliver frames no faster than the frame rate, like a live device.
    pub realtime: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 180,
            frame_rate: FrameRate::FPS_25,
            frame_count: 250,
            realtime: false,
        }
    }
}

impl GeneratorConfig {
    /// Read a generator source file.
    pub fn load(path: &Path) -> std::result::Result<Self, OpenError> {
        if !path.exists() {
            return Err(OpenError::NotFound(path.display().to_string()));
        }
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| OpenError::InvalidSource(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            FrameWinError::Serialization(format!("Failed to serialize generator config: {e}"))
        })?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn validate(&self) -> std::result::Result<(), OpenError> {
        if self.width == 0 || self.height == 0 {
            return Err(OpenError::InvalidSource(format!(
                "Frame size {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.frame_rate.numerator == 0 || self.frame_rate.denominator == 0 {
            return Err(OpenError::InvalidSource(format!(
                "Invalid frame rate {}",
                self.frame_rate
            )));
        }
        if self.frame_count == 0 {
            return Err(OpenError::InvalidSource("Stream has no frames".into()));
        }
        let duration = i64::try_from(self.frame_count)
            .ok()
            .and_then(|count| count.checked_mul(self.frame_interval()));
        if duration.is_none() {
            return Err(OpenError::InvalidSource(format!(
                "{} frames at {} overflow the stream duration",
                self.frame_count, self.frame_rate
            )));
        }
        Ok(())
    }

    fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    fn frame_interval(&self) -> Timestamp {
        TimeBase::MPEG.ticks_per_frame(self.frame_rate)
    }

    fn duration_ms(&self) -> i64 {
        (self.frame_count as f64 * self.frame_rate.frame_seconds() * 1000.0).round() as i64
    }
}

/// State of an opened generator.
#[derive(Debug, Clone)]
struct Stream {
    config: GeneratorConfig,
    info: VideoInfo,
    /// Index of the frame `decode_next` produces.
    next_index: u64,
    /// Wall-clock time at which frame 0 is due, for realtime sources.
    clock: Instant,
}

impl Stream {
    fn interval(&self) -> Timestamp {
        self.info.average_timestamps_per_frame
    }

    fn frame(&self, index: u64) -> FrameSlot {
        let size = self.info.aspect_ratio_size;
        let step = (size.width / 64).max(1) as u64;
        let image = FrameBuffer::moving_bar(size.width, size.height, index * step);
        FrameSlot::new(
            self.info.first_timestamp + index as i64 * self.interval(),
            index,
            image,
        )
    }

    /// Index of the frame displayed at `timestamp`, clamped to the stream.
    fn index_at(&self, timestamp: Timestamp) -> u64 {
        let offset = (timestamp - self.info.first_timestamp).max(0);
        ((offset / self.interval()) as u64).min(self.config.frame_count - 1)
    }

    /// Index of the first frame starting at or after `timestamp`.
    fn first_index_from(&self, timestamp: Timestamp) -> u64 {
        let offset = (timestamp - self.info.first_timestamp).max(0);
        let interval = self.interval();
        ((offset + interval - 1) / interval) as u64
    }

    fn due(&self, index: u64) -> Instant {
        self.clock + Duration::from_secs_f64(index as f64 * self.config.frame_rate.frame_seconds())
    }

    /// Restart the realtime clock so that `index` is due now.
    fn rewind_clock(&mut self, index: u64) {
        let elapsed = Duration::from_secs_f64(index as f64 * self.config.frame_rate.frame_seconds());
        let now = Instant::now();
        self.clock = now.checked_sub(elapsed).unwrap_or(now);
    }
}

/// Moving-bar test pattern backend.
#[derive(Debug, Default)]
pub struct FrameGenerator {
    /// Used instead of reading the source file when set.
    preset: Option<GeneratorConfig>,
    options: VideoOptions,
    stream: Option<Stream>,
}

impl FrameGenerator {
    /// A generator that ignores the source's content and streams `config`.
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            preset: Some(config),
            ..Self::default()
        }
    }

    /// Factory for the reader registry; reads its configuration from the
    /// source file.
    pub fn create() -> Box<dyn DecodeBackend> {
        Box::new(Self::default())
    }

    fn stream(&self) -> Result<&Stream> {
        self.stream
            .as_ref()
            .ok_or_else(|| FrameWinError::Decoder("Generator is not open".into()))
    }

    fn stream_mut(&mut self) -> Result<&mut Stream> {
        self.stream
            .as_mut()
            .ok_or_else(|| FrameWinError::Decoder("Generator is not open".into()))
    }

    fn describe(config: &GeneratorConfig, source: &Path, options: VideoOptions) -> VideoInfo {
        let interval = config.frame_interval();
        VideoInfo {
            file_path: source.to_path_buf(),
            original_size: config.size(),
            aspect_ratio_size: options.aspect_ratio.decoding_size(config.size(), 1.0),
            pixel_aspect_ratio: 1.0,
            frame_rate: config.frame_rate,
            time_base: TimeBase::MPEG,
            average_timestamps_per_frame: interval,
            first_timestamp: 0,
            duration_timestamps: config.frame_count as i64 * interval,
        }
    }
}

impl DecodeBackend for FrameGenerator {
    fn open(&mut self, source: &Path) -> std::result::Result<VideoInfo, OpenError> {
        let config = match self.preset {
            Some(config) => {
                config.validate()?;
                config
            }
            None => GeneratorConfig::load(source)?,
        };
        let info = Self::describe(&config, source, self.options);
        info!(
            "Generating {} at {} for {} frames (realtime: {})",
            info.original_size, config.frame_rate, config.frame_count, config.realtime
        );
        self.stream = Some(Stream {
            config,
            info: info.clone(),
            next_index: 0,
            clock: Instant::now(),
        });
        Ok(info)
    }

    fn close(&mut self) {
        self.stream = None;
    }

    fn flags(&self) -> ReaderFlags {
        ReaderFlags {
            always_caching: false,
            can_change_aspect_ratio: true,
            can_change_deinterlace: true,
        }
    }

    fn decode_next(&mut self, synchronous: bool) -> Result<NextFrame> {
        let stream = self.stream_mut()?;
        let index = stream.next_index;
        if index >= stream.config.frame_count {
            return Ok(NextFrame::EndOfStream);
        }

        if stream.config.realtime {
            let now = Instant::now();
            let due = stream.due(index);
            if now < due {
                if !synchronous {
                    return Ok(NextFrame::NotReady);
                }
                std::thread::sleep(due - now);
            }
        }

        stream.next_index = index + 1;
        Ok(NextFrame::Frame(stream.frame(index)))
    }

    fn decode_at(&mut self, timestamp: Timestamp) -> Result<FrameSlot> {
        let stream = self.stream_mut()?;
        let index = stream.index_at(timestamp);
        stream.next_index = index + 1;
        stream.rewind_clock(index + 1);
        trace!("Seeked to frame {} for timestamp {}", index, timestamp);
        Ok(stream.frame(index))
    }

    fn can_cache_section(&self, section: TimeSection, budget: &CacheBudget) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|s| s.info.section_fits(section, budget))
    }

    fn decode_many(&mut self, section: TimeSection, sink: &mut ImportSink) -> Result<()> {
        let stream = self.stream_mut()?;
        let Some((start, end)) = section.bounds() else {
            return Ok(());
        };
        let first = stream.first_index_from(start);
        let last = stream.first_index_from(end).min(stream.config.frame_count);

        for index in first..last {
            if sink.is_cancelled() || !sink.push(stream.frame(index)) {
                debug!("Generator import of {} stopped at frame {}", section, index);
                break;
            }
            stream.next_index = index + 1;
        }
        Ok(())
    }

    fn extract_summary(
        &mut self,
        source: &Path,
        thumbnail_count: usize,
        width: u32,
    ) -> Result<VideoSummary> {
        let config = match (&self.stream, self.preset) {
            (Some(stream), _) if stream.info.file_path == source => stream.config,
            (_, Some(preset)) => preset,
            _ => match GeneratorConfig::load(source) {
                Ok(config) => config,
                Err(e) => {
                    warn!("No summary for {}: {}", source.display(), e);
                    return Ok(VideoSummary::invalid(source));
                }
            },
        };

        let size = config.size();
        let thumb_size = size.fit_width(width);
        let count = thumbnail_count.min(config.frame_count as usize);
        let step = (size.width / 64).max(1) as u64;
        let thumbnails = (0..count as u64)
            .map(|i| {
                let index = i * config.frame_count / count as u64;
                FrameBuffer::moving_bar(size.width, size.height, index * step).resized(thumb_size)
            })
            .collect();

        Ok(VideoSummary {
            filename: source.to_path_buf(),
            is_image: config.frame_count == 1,
            image_size: size,
            duration_ms: config.duration_ms(),
            thumbnails,
        })
    }

    fn apply_options(&mut self, options: VideoOptions) -> Result<VideoInfo> {
        self.options = options;
        let stream = self.stream_mut()?;
        let info = Self::describe(&stream.config, &stream.info.file_path, options);
        stream.info = info.clone();
        Ok(info)
    }

    fn read_metadata(&mut self) -> Option<String> {
        let stream = self.stream.as_ref()?;
        serde_json::to_string(&stream.config).ok()
    }
}
