//! Prefetch window planning.
//!
//! The window spans `radius / 2` frames behind the cursor and `radius` frames
//! ahead of it. Missing frames are issued in batches of at most `concurrency`
//! requests, nearest to the cursor first; a batch must settle before the next
//! one goes out.

use std::ops::RangeInclusive;

use crate::frame_source::FrameIndex;

/// Frames that should be resident around `cursor`, clamped to the source.
///
/// Returns `None` when there are no frames.
pub fn prefetch_window(
    cursor: FrameIndex,
    radius: usize,
    frame_count: usize,
) -> Option<RangeInclusive<FrameIndex>> {
    let last = frame_count.checked_sub(1)?;
    let cursor = cursor.min(last);
    let start = cursor.saturating_sub(radius / 2);
    let end = cursor.saturating_add(radius).min(last);
    Some(start..=end)
}

/// Ordered list of frames a prefetch run should request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchPlan {
    /// Missing frames, nearest to the cursor first
    indices: Vec<FrameIndex>,
    /// Maximum requests per batch
    concurrency: usize,
}

impl PrefetchPlan {
    /// Plan the missing frames of the window around `cursor`.
    ///
    /// The cursor frame itself is excluded (it is requested separately, ahead
    /// of any batch), as is every index for which `is_available` returns true
    /// (already resident or already in flight). Ties in distance go to the
    /// frame ahead of the cursor.
    pub fn new(
        cursor: FrameIndex,
        radius: usize,
        concurrency: usize,
        frame_count: usize,
        is_available: impl Fn(FrameIndex) -> bool,
    ) -> Self {
        let mut indices: Vec<FrameIndex> = prefetch_window(cursor, radius, frame_count)
            .map(|window| {
                window
                    .filter(|&i| i != cursor && !is_available(i))
                    .collect()
            })
            .unwrap_or_default();

        indices.sort_by_key(|&i| (i.abs_diff(cursor), i < cursor));

        Self {
            indices,
            concurrency: concurrency.max(1),
        }
    }

    /// All planned indices in issue order.
    pub fn indices(&self) -> &[FrameIndex] {
        &self.indices
    }

    /// The plan split into batches.
    pub fn batches(&self) -> impl Iterator<Item = &[FrameIndex]> + '_ {
        self.indices.chunks(self.concurrency)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
