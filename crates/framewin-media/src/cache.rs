//! Bounded, time-ordered store of decoded frames for one working zone.
//!
//! Slots are kept sorted by timestamp. New frames may only enter at the
//! tail (append) or inside the current prepend block at the head, which is
//! how partial imports grow the window in either direction.

use crate::config::CacheBudget;
use framewin_core::{FrameSlot, FrameWinError, Result, TimeBase, TimeSection, Timestamp};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Ordered collection of [`FrameSlot`]s with a current-frame pointer.
#[derive(Debug)]
pub struct FrameCache {
    slots: VecDeque<FrameSlot>,
    current: Option<usize>,
    budget: CacheBudget,
    time_base: TimeBase,
    frame_interval: Timestamp,
    /// Insertion index for the next prepended slot.
    prepend_cursor: usize,
    memory: usize,
    evictions: u64,
}

impl FrameCache {
    pub fn new(budget: CacheBudget, time_base: TimeBase, frame_interval: Timestamp) -> Self {
        Self {
            slots: VecDeque::new(),
            current: None,
            budget,
            time_base,
            frame_interval: frame_interval.max(1),
            prepend_cursor: 0,
            memory: 0,
            evictions: 0,
        }
    }

    /// Set the stream timing used to measure retained duration.
    pub fn configure(&mut self, time_base: TimeBase, frame_interval: Timestamp) {
        self.time_base = time_base;
        self.frame_interval = frame_interval.max(1);
    }

    /// Replace the budget, evicting immediately if the cache no longer fits.
    pub fn set_budget(&mut self, budget: CacheBudget) {
        self.budget = budget;
        self.enforce_budget(false);
    }

    pub fn budget(&self) -> CacheBudget {
        self.budget
    }

    /// The frame last navigated to.
    #[inline]
    pub fn current(&self) -> Option<&FrameSlot> {
        self.current.and_then(|i| self.slots.get(i))
    }

    #[inline]
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameSlot> {
        self.slots.iter()
    }

    pub fn first(&self) -> Option<&FrameSlot> {
        self.slots.front()
    }

    pub fn last(&self) -> Option<&FrameSlot> {
        self.slots.back()
    }

    /// Decoded bytes currently retained.
    #[inline]
    pub fn memory_size(&self) -> usize {
        self.memory
    }

    /// Total slots evicted for budget reasons since creation.
    #[inline]
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Time covered by the retained slots, in seconds. The last slot counts
    /// for one frame interval.
    pub fn retained_seconds(&self) -> f64 {
        match (self.slots.front(), self.slots.back()) {
            (Some(first), Some(last)) => self
                .time_base
                .to_seconds(last.timestamp - first.timestamp + self.frame_interval),
            _ => 0.0,
        }
    }

    /// The section spanned by the retained slots.
    pub fn section(&self) -> TimeSection {
        match (self.slots.front(), self.slots.back()) {
            (Some(first), Some(last)) => {
                TimeSection::between(first.timestamp, last.timestamp + self.frame_interval)
            }
            _ => TimeSection::Empty,
        }
    }

    /// Whether a frame displayed at `timestamp` is resident.
    pub fn contains_timestamp(&self, timestamp: Timestamp) -> bool {
        self.index_for(timestamp).is_some()
    }

    /// Start a new prepend block: the next prepended slot goes to the head.
    pub fn begin_prepend_block(&mut self) {
        self.prepend_cursor = 0;
    }

    /// Insert a decoded slot at the tail, or inside the prepend block at the
    /// head when `prepend` is set.
    ///
    /// Fails with `OutOfOrder` if the slot does not sort strictly between
    /// its would-be neighbours. The cache is unchanged on failure.
    pub fn add(&mut self, slot: FrameSlot, prepend: bool) -> Result<()> {
        if prepend {
            let at = self.prepend_cursor.min(self.slots.len());
            if at > 0 && slot.timestamp <= self.slots[at - 1].timestamp {
                return Err(FrameWinError::OutOfOrder {
                    timestamp: slot.timestamp,
                    bound: self.slots[at - 1].timestamp,
                    prepend,
                });
            }
            if let Some(next) = self.slots.get(at) {
                if slot.timestamp >= next.timestamp {
                    return Err(FrameWinError::OutOfOrder {
                        timestamp: slot.timestamp,
                        bound: next.timestamp,
                        prepend,
                    });
                }
            }
            self.memory += slot.memory_size();
            self.slots.insert(at, slot);
            if let Some(current) = self.current.as_mut() {
                if *current >= at {
                    *current += 1;
                }
            }
            self.prepend_cursor = at + 1;
        } else {
            if let Some(last) = self.slots.back() {
                if slot.timestamp <= last.timestamp {
                    return Err(FrameWinError::OutOfOrder {
                        timestamp: slot.timestamp,
                        bound: last.timestamp,
                        prepend,
                    });
                }
            }
            self.memory += slot.memory_size();
            self.slots.push_back(slot);
        }

        self.enforce_budget(prepend);
        Ok(())
    }

    /// Drop every slot whose timestamp falls outside `retain`. Returns the
    /// number of slots removed.
    ///
    /// If the current slot is dropped, the pointer moves to the nearest
    /// remaining slot.
    pub fn purge_outsiders(&mut self, retain: TimeSection) -> usize {
        let before = self.slots.len();
        let current_ts = self.current().map(|s| s.timestamp);

        self.slots.retain(|s| retain.contains_timestamp(s.timestamp));
        self.memory = self.slots.iter().map(FrameSlot::memory_size).sum();
        self.prepend_cursor = 0;
        self.current = current_ts.and_then(|ts| self.nearest_index(ts));

        let removed = before - self.slots.len();
        if removed > 0 {
            debug!("Purged {} slots outside {}", removed, retain);
        }
        removed
    }

    /// Release every slot.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.current = None;
        self.prepend_cursor = 0;
        self.memory = 0;
    }

    /// Point `current` at the frame displayed at `timestamp`. Returns false,
    /// leaving `current` untouched, when that frame is not resident.
    pub fn move_to(&mut self, timestamp: Timestamp) -> bool {
        match self.index_for(timestamp) {
            Some(i) => {
                self.current = Some(i);
                true
            }
            None => false,
        }
    }

    /// Step `current` by `offset` slots. Returns false if that leaves the
    /// cache or nothing is current.
    pub fn move_by(&mut self, offset: i64) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        let target = current as i64 + offset;
        if target < 0 || target >= self.slots.len() as i64 {
            return false;
        }
        self.current = Some(target as usize);
        true
    }

    /// Index of the last slot starting at or before `timestamp`, provided
    /// `timestamp` is inside the retained section.
    fn index_for(&self, timestamp: Timestamp) -> Option<usize> {
        if !self.section().contains_timestamp(timestamp) {
            return None;
        }
        let after = self.slots.partition_point(|s| s.timestamp <= timestamp);
        after.checked_sub(1)
    }

    fn nearest_index(&self, timestamp: Timestamp) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        let i = match self.slots.binary_search_by_key(&timestamp, |s| s.timestamp) {
            Ok(i) => i,
            Err(i) => i.min(self.slots.len() - 1),
        };
        Some(i)
    }

    fn over_budget(&self) -> bool {
        self.memory > self.budget.max_bytes || self.retained_seconds() > self.budget.max_seconds
    }

    /// Evict until within budget. Appends evict the oldest slot first,
    /// prepends the newest; the current slot is never evicted.
    fn enforce_budget(&mut self, prepending: bool) {
        while self.slots.len() > 1 && self.over_budget() {
            let last = self.slots.len() - 1;
            let from_front = if prepending {
                self.current == Some(last)
            } else {
                self.current != Some(0)
            };

            let evicted = if from_front {
                self.current = self.current.map(|c| c - 1);
                self.prepend_cursor = self.prepend_cursor.saturating_sub(1);
                self.slots.pop_front()
            } else {
                if self.prepend_cursor > last {
                    self.prepend_cursor = last;
                }
                self.slots.pop_back()
            };

            if let Some(slot) = evicted {
                self.memory -= slot.memory_size();
                self.evictions += 1;
                trace!("Evicted slot {} over budget", slot.timestamp);
            }
        }
    }
}
