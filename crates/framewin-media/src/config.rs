//! Reader configuration: cache budget and decoding options.
//!
//! Everything here is plain serde data so the surrounding session layer can
//! persist it as JSON next to its other preferences.

use framewin_core::{memory_budget, FrameSize, FrameWinError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Ceiling on what a working-zone cache may retain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheBudget {
    /// Maximum retained duration in seconds.
    pub max_seconds: f64,
    /// Maximum retained decoded-frame memory in bytes.
    pub max_bytes: usize,
}

impl CacheBudget {
    pub fn new(max_seconds: f64, max_bytes: usize) -> Self {
        Self {
            max_seconds,
            max_bytes,
        }
    }

    /// A budget that never allows caching.
    pub const NONE: Self = Self {
        max_seconds: 0.0,
        max_bytes: 0,
    };
}

impl Default for CacheBudget {
    fn default() -> Self {
        Self {
            max_seconds: memory_budget::MAX_CACHED_SECONDS,
            max_bytes: memory_budget::FRAME_CACHE_SIZE,
        }
    }
}

/// Forced image aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageAspectRatio {
    /// Use the stream's pixel aspect ratio.
    #[default]
    Auto,
    Force43,
    Force169,
    /// Treat pixels as square, keep the stored height.
    ForcedSquarePixels,
}

impl ImageAspectRatio {
    /// Decoding size for a stream of `original` size. The width is kept, the
    /// height follows the ratio, and the width is padded to a multiple of 4.
    pub fn decoding_size(self, original: FrameSize, pixel_aspect_ratio: f64) -> FrameSize {
        let width = original.width;
        let height = match self {
            Self::Force43 => (width as f64 * 3.0 / 4.0) as u32,
            Self::Force169 => (width as f64 * 9.0 / 16.0) as u32,
            Self::ForcedSquarePixels => original.height,
            Self::Auto if pixel_aspect_ratio > 0.0 => {
                (original.height as f64 / pixel_aspect_ratio) as u32
            }
            Self::Auto => original.height,
        };
        FrameSize::new(width.next_multiple_of(4), height)
    }
}

/// Decoding options. Opaque to the cache; any change invalidates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VideoOptions {
    pub aspect_ratio: ImageAspectRatio,
    pub deinterlace: bool,
}

/// Everything a reader needs from the outside besides its source.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    pub budget: CacheBudget,
    pub options: VideoOptions,
}

impl ReaderConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| {
            FrameWinError::Serialization(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            FrameWinError::Serialization(format!("Failed to serialize reader config: {e}"))
        })?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
