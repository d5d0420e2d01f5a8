//! Resident decoded frames, bounded by a window around the playback cursor.
//!
//! Eviction is not LRU: after every cursor move, entries outside
//! `[cursor - max_cache, cursor + max_cache]` are released. Scrubbing can jump
//! arbitrarily, so access history says little about what is needed next.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::rc::Rc;

use super::bitmap::FrameBitmap;
use crate::frame_source::FrameIndex;

/// Compute the retention window for a cursor, clamped to `[0, frame_count)`.
///
/// Returns `None` when there are no frames.
pub fn retention_window(
    cursor: FrameIndex,
    max_cache: usize,
    frame_count: usize,
) -> Option<RangeInclusive<FrameIndex>> {
    let last = frame_count.checked_sub(1)?;
    let lower = cursor.saturating_sub(max_cache).min(last);
    let upper = cursor.saturating_add(max_cache).min(last);
    Some(lower..=upper)
}

/// A resident frame.
struct CacheEntry<B> {
    bitmap: Rc<B>,
    /// Access counter value at the last touch
    last_touched: u64,
}

/// Cache of decoded frames keyed by frame index.
pub struct BitmapCache<B: FrameBitmap> {
    entries: HashMap<FrameIndex, CacheEntry<B>>,
    /// Half-width of the retention window
    max_cache: usize,
    /// Monotonic access counter
    clock: u64,
}

impl<B: FrameBitmap> BitmapCache<B> {
    /// Create an empty cache with the given window half-width.
    pub fn new(max_cache: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_cache,
            clock: 0,
        }
    }

    /// Window half-width.
    pub fn max_cache(&self) -> usize {
        self.max_cache
    }

    /// Upper bound on resident entries once the window has been applied.
    pub fn capacity(&self) -> usize {
        self.max_cache.saturating_mul(2).saturating_add(1)
    }

    /// Check if a frame is resident.
    pub fn contains(&self, index: FrameIndex) -> bool {
        self.entries.contains_key(&index)
    }

    /// Get a resident frame and touch its access counter.
    pub fn get(&mut self, index: FrameIndex) -> Option<Rc<B>> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(&index).map(|entry| {
            entry.last_touched = clock;
            Rc::clone(&entry.bitmap)
        })
    }

    /// Get a resident frame without touching it.
    pub fn peek(&self, index: FrameIndex) -> Option<&Rc<B>> {
        self.entries.get(&index).map(|entry| &entry.bitmap)
    }

    /// Access counter value of the last touch, if resident.
    pub fn last_touched(&self, index: FrameIndex) -> Option<u64> {
        self.entries.get(&index).map(|entry| entry.last_touched)
    }

    /// Insert a decoded frame. A previous entry for the same index is released.
    pub fn insert(&mut self, index: FrameIndex, bitmap: Rc<B>) {
        self.clock += 1;
        let entry = CacheEntry {
            bitmap,
            last_touched: self.clock,
        };
        if let Some(old) = self.entries.insert(index, entry) {
            old.bitmap.release();
        }
    }

    /// Number of resident frames.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resident indices in ascending order.
    pub fn indices(&self) -> Vec<FrameIndex> {
        let mut indices: Vec<FrameIndex> = self.entries.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Release every entry outside the retention window of `cursor`.
    ///
    /// Returns the number of evicted entries.
    pub fn evict_outside(&mut self, cursor: FrameIndex, frame_count: usize) -> usize {
        let Some(window) = retention_window(cursor, self.max_cache, frame_count) else {
            return self.clear();
        };

        let before = self.entries.len();
        self.entries.retain(|index, entry| {
            let keep = window.contains(index);
            if !keep {
                entry.bitmap.release();
            }
            keep
        });
        let evicted = before - self.entries.len();
        if evicted > 0 {
            log::debug!(
                "Evicted {} frames outside {:?} (remaining: {})",
                evicted,
                window,
                self.entries.len()
            );
        }
        evicted
    }

    /// Release every entry (e.g. when the frame source changes).
    ///
    /// Returns the number of released entries.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            entry.bitmap.release();
        }
        if count > 0 {
            log::info!("Cleared frame cache ({} entries)", count);
        }
        count
    }
}
