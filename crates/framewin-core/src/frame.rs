//! Decoded frame storage.
//!
//! A `FrameSlot` is the unit the frame cache holds: one decoded image plus
//! its position in the stream.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Pixel format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit premultiplied BGRA, the format frames are decoded to.
    #[default]
    Bgra8,
    /// 8-bit RGBA
    Rgba8,
    /// 8-bit grayscale
    Gray8,
    /// YUV 4:2:0 planar
    Yuv420P,
}

impl PixelFormat {
    /// Bytes per pixel for packed formats, or 0 for planar.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgra8 | Self::Rgba8 => 4,
            Self::Gray8 => 1,
            Self::Yuv420P => 0,
        }
    }

    /// Tightly packed size of a frame of this format, ignoring row padding.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            Self::Bgra8 | Self::Rgba8 => pixels * 4,
            Self::Gray8 => pixels,
            Self::Yuv420P => pixels + 2 * ((width as usize / 2) * (height as usize / 2)),
        }
    }

    /// Size a `FrameBuffer` of this format allocates, row padding included.
    pub fn padded_frame_size(self, width: u32, height: u32) -> usize {
        let plane = |w: u32, h: u32, bpp: usize| padded_stride(w, bpp) * h as usize;
        match self {
            Self::Bgra8 | Self::Rgba8 => plane(width, height, 4),
            Self::Gray8 => plane(width, height, 1),
            Self::Yuv420P => plane(width, height, 1) + 2 * plane(width / 2, height / 2, 1),
        }
    }
}

/// Row length in bytes, rounded up to 64.
#[inline]
fn padded_stride(width: u32, bytes_per_pixel: usize) -> usize {
    (width as usize * bytes_per_pixel + 63) & !63
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Scale to `width`, keeping the aspect ratio.
    pub fn fit_width(self, width: u32) -> Self {
        if self.width == 0 {
            return Self::new(width, 0);
        }
        let height = (self.height as u64 * width as u64 / self.width as u64) as u32;
        Self::new(width, height.max(1))
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A plane of pixel data with stride information.
#[derive(Debug, Clone)]
pub struct FramePlane {
    pub data: Vec<u8>,
    /// Bytes per row (may include padding)
    pub stride: usize,
    pub width: u32,
    pub height: u32,
    bytes_per_pixel: usize,
}

impl FramePlane {
    /// Create a zeroed plane. Rows are padded to 64 bytes.
    pub fn new(width: u32, height: u32, bytes_per_pixel: usize) -> Self {
        let stride = padded_stride(width, bytes_per_pixel);
        Self {
            data: vec![0u8; stride * height as usize],
            stride,
            width,
            height,
            bytes_per_pixel,
        }
    }

    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * self.bytes_per_pixel]
    }

    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.bytes_per_pixel;
        &mut self.data[start..end]
    }
}

/// A decoded image in CPU memory.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Pixel data planes (1 or 3 depending on format)
    pub planes: SmallVec<[FramePlane; 3]>,
}

impl FrameBuffer {
    /// Create a zeroed frame buffer.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let planes = match format {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => {
                smallvec::smallvec![FramePlane::new(width, height, 4)]
            }
            PixelFormat::Gray8 => smallvec::smallvec![FramePlane::new(width, height, 1)],
            PixelFormat::Yuv420P => smallvec::smallvec![
                FramePlane::new(width, height, 1),
                FramePlane::new(width / 2, height / 2, 1),
                FramePlane::new(width / 2, height / 2, 1),
            ],
        };

        Self {
            format,
            width,
            height,
            planes,
        }
    }

    #[inline]
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    /// Total memory usage of this frame in bytes, padding included.
    pub fn memory_size(&self) -> usize {
        self.planes.iter().map(|p| p.data.len()).sum()
    }

    #[inline]
    pub fn primary_plane(&self) -> &FramePlane {
        &self.planes[0]
    }

    #[inline]
    pub fn primary_plane_mut(&mut self) -> &mut FramePlane {
        &mut self.planes[0]
    }

    /// BGRA frame with a dark background and a vertical white bar whose
    /// horizontal position is `position` modulo the width.
    pub fn moving_bar(width: u32, height: u32, position: u64) -> Self {
        let mut frame = Self::new(width, height, PixelFormat::Bgra8);
        if width == 0 {
            return frame;
        }
        let bar_width = (width / 16).max(1);
        let bar_start = (position % width as u64) as u32;
        let plane = frame.primary_plane_mut();

        for y in 0..height {
            let row = plane.row_mut(y);
            for x in 0..width {
                let i = (x * 4) as usize;
                let in_bar = x.wrapping_sub(bar_start) < bar_width;
                let pixel = if in_bar {
                    [255, 255, 255, 255]
                } else {
                    [32, 24, 16, 255]
                };
                row[i..i + 4].copy_from_slice(&pixel);
            }
        }

        frame
    }

    /// Nearest-neighbour resize of a packed frame. Planar frames come back
    /// as zeroed buffers of the target size.
    pub fn resized(&self, size: FrameSize) -> Self {
        let mut out = Self::new(size.width, size.height, self.format);
        let bpp = self.format.bytes_per_pixel();
        if bpp == 0 || self.width == 0 || self.height == 0 {
            return out;
        }
        let src = self.primary_plane();
        let dst = out.primary_plane_mut();
        for y in 0..size.height {
            let sy = (y as u64 * self.height as u64 / size.height as u64) as u32;
            let src_row = src.row(sy);
            let dst_row = dst.row_mut(y);
            for x in 0..size.width as usize {
                let sx = x * self.width as usize / size.width as usize;
                dst_row[x * bpp..(x + 1) * bpp].copy_from_slice(&src_row[sx * bpp..(sx + 1) * bpp]);
            }
        }
        out
    }
}

/// Arc-wrapped frame buffer for shared ownership.
pub type SharedFrameBuffer = Arc<FrameBuffer>;

/// One decoded frame held by the frame cache.
#[derive(Debug, Clone)]
pub struct FrameSlot {
    pub timestamp: Timestamp,
    /// Position of the frame in decode order, as reported by the backend.
    pub sequence_index: u64,
    pub image: SharedFrameBuffer,
}

impl FrameSlot {
    pub fn new(timestamp: Timestamp, sequence_index: u64, image: FrameBuffer) -> Self {
        Self {
            timestamp,
            sequence_index,
            image: Arc::new(image),
        }
    }

    #[inline]
    pub fn memory_size(&self) -> usize {
        self.image.memory_size()
    }
}
