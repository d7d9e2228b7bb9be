//! Timestamp arithmetic.
//!
//! Frames are addressed by integer timestamps expressed in the stream's time
//! base. Conversions to seconds go through rational numbers so that frame
//! intervals like 1001/30000 s stay exact.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A presentation timestamp, in time base units.
pub type Timestamp = i64;

/// Duration of one timestamp unit, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeBase {
    value: Rational64,
}

impl TimeBase {
    /// Create a time base where one unit lasts `numerator / denominator` seconds.
    #[inline]
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            value: Rational64::new(numerator, denominator),
        }
    }

    /// The 90 kHz clock used by MPEG transport streams.
    pub const MPEG: Self = Self {
        value: Rational64::new_raw(1, 90_000),
    };

    /// Millisecond clock.
    pub const MILLIS: Self = Self {
        value: Rational64::new_raw(1, 1000),
    };

    /// Timestamp units per second.
    #[inline]
    pub fn ticks_per_second(self) -> f64 {
        *self.value.denom() as f64 / *self.value.numer() as f64
    }

    /// Convert a timestamp delta to seconds.
    #[inline]
    pub fn to_seconds(self, ticks: Timestamp) -> f64 {
        let seconds = self.value * ticks;
        *seconds.numer() as f64 / *seconds.denom() as f64
    }

    /// Convert seconds to the nearest timestamp delta.
    pub fn from_seconds(self, seconds: f64) -> Timestamp {
        (seconds * self.ticks_per_second()).round() as Timestamp
    }

    /// Number of timestamp units covered by one frame at `rate`, rounded to
    /// the nearest unit and never less than one.
    pub fn ticks_per_frame(self, rate: FrameRate) -> Timestamp {
        let frame = Rational64::new(rate.denominator as i64, rate.numerator as i64);
        let ticks = (frame / self.value).round().to_integer();
        ticks.max(1)
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::MILLIS
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.value.numer(), self.value.denom())
    }
}

/// Frame rate as a rational number (e.g., 30000/1001 for 29.97 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRate {
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Duration of a single frame in seconds.
    #[inline]
    pub fn frame_seconds(self) -> f64 {
        self.denominator as f64 / self.numerator as f64
    }

    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_50: Self = Self::new(50, 1);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_25
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}
