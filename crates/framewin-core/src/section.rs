//! Half-open timestamp intervals used as working zones.

use crate::error::{FrameWinError, Result};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An immutable `[start, end)` interval of timestamps, or the explicit
/// "no section" value.
///
/// `Empty` is a distinct state: a zero-length interval such as `[5, 5)` is a
/// valid bounded section and is never equal to `Empty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeSection {
    #[default]
    Empty,
    Bounded { start: Timestamp, end: Timestamp },
}

impl TimeSection {
    /// Create a bounded section. Fails if `start > end`.
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self> {
        if start > end {
            return Err(FrameWinError::InvalidParameter(format!(
                "section start {start} is after end {end}"
            )));
        }
        Ok(Self::Bounded { start, end })
    }

    /// Create a bounded section from two timestamps in either order.
    #[inline]
    pub fn between(a: Timestamp, b: Timestamp) -> Self {
        Self::Bounded {
            start: a.min(b),
            end: a.max(b),
        }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Inclusive start, or `None` for the empty section.
    #[inline]
    pub fn start(self) -> Option<Timestamp> {
        match self {
            Self::Empty => None,
            Self::Bounded { start, .. } => Some(start),
        }
    }

    /// Exclusive end, or `None` for the empty section.
    #[inline]
    pub fn end(self) -> Option<Timestamp> {
        match self {
            Self::Empty => None,
            Self::Bounded { end, .. } => Some(end),
        }
    }

    /// Both bounds at once.
    #[inline]
    pub fn bounds(self) -> Option<(Timestamp, Timestamp)> {
        match self {
            Self::Empty => None,
            Self::Bounded { start, end } => Some((start, end)),
        }
    }

    /// Length in timestamp units. Zero for the empty section.
    #[inline]
    pub fn duration(self) -> Timestamp {
        self.bounds().map_or(0, |(start, end)| end - start)
    }

    /// True iff `other` lies entirely inside `self`.
    ///
    /// The empty section neither contains nor is contained by anything.
    pub fn contains(self, other: Self) -> bool {
        match (self.bounds(), other.bounds()) {
            (Some((a_start, a_end)), Some((b_start, b_end))) => {
                a_start <= b_start && b_end <= a_end
            }
            _ => false,
        }
    }

    /// True iff `timestamp` lies in `[start, end)`.
    #[inline]
    pub fn contains_timestamp(self, timestamp: Timestamp) -> bool {
        self.bounds()
            .is_some_and(|(start, end)| start <= timestamp && timestamp < end)
    }

    /// True iff the two sections share at least one timestamp.
    pub fn overlaps(self, other: Self) -> bool {
        match (self.bounds(), other.bounds()) {
            (Some((a_start, a_end)), Some((b_start, b_end))) => a_start < b_end && b_start < a_end,
            _ => false,
        }
    }

    /// Clamp a timestamp into `[start, end - 1]`. Returns the timestamp
    /// unchanged for empty or zero-length sections.
    pub fn clamp(self, timestamp: Timestamp) -> Timestamp {
        match self.bounds() {
            Some((start, end)) if end > start => timestamp.clamp(start, end - 1),
            _ => timestamp,
        }
    }
}

impl fmt::Display for TimeSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "[empty]"),
            Self::Bounded { start, end } => write!(f, "[{start}, {end})"),
        }
    }
}
