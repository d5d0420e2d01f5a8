//! Outstanding decode operations, at most one per frame index.
//!
//! Concurrent requests for the same frame share a single [`FrameLoad`]; the
//! decode behind it runs once no matter how many callers await it.

use std::collections::HashMap;
use std::rc::Rc;

use futures::future::{LocalBoxFuture, Shared};

use super::generation::Generation;
use crate::frame_source::FrameIndex;

/// A pending decode that any number of callers can await.
///
/// Resolves to `None` when the decode failed or its result was stale.
pub type FrameLoad<B> = Shared<LocalBoxFuture<'static, Option<Rc<B>>>>;

struct InflightRequest<B> {
    generation: Generation,
    load: FrameLoad<B>,
}

/// Tracks in-flight decodes keyed by frame index.
pub struct InflightDeduplicator<B> {
    pending: HashMap<FrameIndex, InflightRequest<B>>,
}

impl<B> InflightDeduplicator<B> {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }

    /// The outstanding load for `(generation, index)`, if any.
    pub fn get(&self, generation: Generation, index: FrameIndex) -> Option<FrameLoad<B>> {
        self.pending
            .get(&index)
            .filter(|request| request.generation == generation)
            .map(|request| request.load.clone())
    }

    /// Check if a decode for `index` is outstanding.
    pub fn contains(&self, index: FrameIndex) -> bool {
        self.pending.contains_key(&index)
    }

    /// Register a new load.
    ///
    /// Returns `false` and keeps the existing entry if one is already
    /// outstanding for this index.
    pub fn register(
        &mut self,
        generation: Generation,
        index: FrameIndex,
        load: FrameLoad<B>,
    ) -> bool {
        if self.pending.contains_key(&index) {
            log::warn!("Frame {} already has an in-flight decode", index);
            return false;
        }
        self.pending.insert(index, InflightRequest { generation, load });
        true
    }

    /// Remove the entry for `(generation, index)` once its decode settled.
    ///
    /// Entries registered under a different generation are left alone.
    pub fn complete(&mut self, generation: Generation, index: FrameIndex) -> bool {
        let matches = self
            .pending
            .get(&index)
            .is_some_and(|request| request.generation == generation);
        if matches {
            self.pending.remove(&index);
        }
        matches
    }

    /// Number of outstanding decodes.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Forget every outstanding decode.
    ///
    /// Already-running decodes keep running; their completions are rejected by
    /// the generation check.
    pub fn clear(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }
}

impl<B> Default for InflightDeduplicator<B> {
    fn default() -> Self {
        Self::new()
    }
}
