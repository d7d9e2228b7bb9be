//! The decode backend capability.
//!
//! A reader owns exactly one backend and talks to it only through
//! [`DecodeBackend`]. File demuxers, capture devices and procedural sources
//! all implement the same contract, so the reader never knows which kind it
//! is driving.

use crate::config::{CacheBudget, VideoOptions};
use crate::import::ImportSink;
use framewin_core::{
    FrameBuffer, FrameRate, FrameSize, FrameSlot, OpenError, PixelFormat, Result, TimeBase,
    TimeSection, Timestamp,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Stream description returned by [`DecodeBackend::open`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub file_path: PathBuf,
    /// Size as stored in the stream.
    pub original_size: FrameSize,
    /// Size frames are decoded at, after aspect ratio correction.
    pub aspect_ratio_size: FrameSize,
    pub pixel_aspect_ratio: f64,
    pub frame_rate: FrameRate,
    pub time_base: TimeBase,
    pub average_timestamps_per_frame: Timestamp,
    pub first_timestamp: Timestamp,
    pub duration_timestamps: Timestamp,
}

impl VideoInfo {
    /// The whole stream as a section.
    pub fn full_section(&self) -> TimeSection {
        TimeSection::between(
            self.first_timestamp,
            self.first_timestamp + self.duration_timestamps,
        )
    }

    /// True for single images and one-frame streams.
    pub fn is_single_frame(&self) -> bool {
        self.duration_timestamps <= 1
            || self.duration_timestamps <= self.average_timestamps_per_frame
    }

    /// Bytes one decoded frame occupies in the cache at the current
    /// decoding size, row padding included.
    pub fn frame_bytes(&self) -> usize {
        PixelFormat::Bgra8
            .padded_frame_size(self.aspect_ratio_size.width, self.aspect_ratio_size.height)
    }

    /// Whether `section` fits in `budget`, assuming every frame is decoded at
    /// the aspect-ratio size. Empty and zero-length sections never fit.
    pub fn section_fits(&self, section: TimeSection, budget: &CacheBudget) -> bool {
        let seconds = self.time_base.to_seconds(section.duration());
        let frames = section.duration() as f64 / self.average_timestamps_per_frame.max(1) as f64;
        let bytes = frames * self.frame_bytes() as f64;
        seconds > 0.0 && seconds <= budget.max_seconds && bytes <= budget.max_bytes as f64
    }
}

/// Capabilities a backend advertises to its reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReaderFlags {
    /// The backend materializes its whole zone itself; working-zone updates
    /// are ignored.
    pub always_caching: bool,
    pub can_change_aspect_ratio: bool,
    pub can_change_deinterlace: bool,
}

/// Result of asking a backend for the next frame.
#[derive(Debug, Clone)]
pub enum NextFrame {
    Frame(FrameSlot),
    /// An asynchronous request could not be served right now.
    NotReady,
    EndOfStream,
}

/// Thumbnail strip and basic facts about a source, for file browsers.
#[derive(Debug, Clone)]
pub struct VideoSummary {
    pub filename: PathBuf,
    pub is_image: bool,
    pub image_size: FrameSize,
    pub duration_ms: i64,
    pub thumbnails: Vec<FrameBuffer>,
}

impl VideoSummary {
    /// Placeholder for a source whose summary could not be extracted.
    pub fn invalid(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            is_image: false,
            image_size: FrameSize::default(),
            duration_ms: 0,
            thumbnails: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.image_size.is_empty()
    }
}

/// The decoding capability a [`crate::VideoReader`] depends on.
///
/// Backends keep their own decode position; from the reader's point of view
/// every call is a request/response.
pub trait DecodeBackend: Send {
    /// Open `source` and describe it.
    fn open(&mut self, source: &Path) -> std::result::Result<VideoInfo, OpenError>;

    /// Release the source. Further decode calls may fail.
    fn close(&mut self);

    fn flags(&self) -> ReaderFlags;

    /// Decode the frame after the last one produced. When `synchronous` is
    /// false the backend must not block; it answers `NotReady` instead.
    fn decode_next(&mut self, synchronous: bool) -> Result<NextFrame>;

    /// Decode the frame displayed at `timestamp` (the last frame starting at
    /// or before it).
    fn decode_at(&mut self, timestamp: Timestamp) -> Result<FrameSlot>;

    /// Whether `section` can be fully cached under `budget`.
    fn can_cache_section(&self, section: TimeSection, budget: &CacheBudget) -> bool;

    /// Decode every frame of `section` in timestamp order into `sink`.
    ///
    /// Must poll `sink.is_cancelled()` between frames and return `Ok(())`
    /// early when it is set or when `sink.push` refuses a frame.
    fn decode_many(&mut self, section: TimeSection, sink: &mut ImportSink) -> Result<()>;

    /// Thumbnails and facts about `source`, independent of the open stream.
    fn extract_summary(
        &mut self,
        source: &Path,
        thumbnail_count: usize,
        width: u32,
    ) -> Result<VideoSummary>;

    /// Apply new decoding options. Returns the updated stream description.
    fn apply_options(&mut self, options: VideoOptions) -> Result<VideoInfo>;

    /// Embedded metadata stream, if the source has one.
    fn read_metadata(&mut self) -> Option<String> {
        None
    }
}

/// Factory producing a fresh, unopened backend.
pub type BackendFactory = fn() -> Box<dyn DecodeBackend>;

/// A backend shared between a reader and its in-flight import job.
pub type SharedBackend = Arc<Mutex<Box<dyn DecodeBackend>>>;

/// Wrap a backend for sharing with import jobs.
pub fn share(backend: impl DecodeBackend + 'static) -> SharedBackend {
    share_boxed(Box::new(backend))
}

pub fn share_boxed(backend: Box<dyn DecodeBackend>) -> SharedBackend {
    Arc::new(Mutex::new(backend))
}
