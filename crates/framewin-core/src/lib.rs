//! FrameWin Core - Foundation types for the windowed frame cache
//!
//! This crate provides the value types shared by the cache, the reader and
//! the decode backends:
//! - Timestamps, time bases and frame rates
//! - Time sections (working zones)
//! - Frame buffers and frame slots
//! - The error taxonomy

pub mod error;
pub mod frame;
pub mod section;
pub mod time;

pub use error::{FrameWinError, OpenError, Result};
pub use frame::{FrameBuffer, FramePlane, FrameSize, FrameSlot, PixelFormat, SharedFrameBuffer};
pub use section::TimeSection;
pub use time::{FrameRate, TimeBase, Timestamp};

/// Default memory/time ceilings for a working-zone cache.
pub mod memory_budget {
    /// Maximum decoded-frame memory retained by one reader's cache.
    pub const FRAME_CACHE_SIZE: usize = 512 * 1024 * 1024; // 512 MB

    /// Maximum duration of a working zone that may be fully cached.
    pub const MAX_CACHED_SECONDS: f64 = 30.0;
}
