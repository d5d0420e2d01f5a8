//! Frame buffering session.
//!
//! A `FrameBufferSession` owns everything tied to one viewing of a frame
//! source: the bitmap cache, the in-flight map, the generation counter and the
//! playback timer. Decodes run on a local (single-threaded) executor supplied
//! by the caller; the cache and the in-flight map are only touched from that
//! thread, always after checking the generation token.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture, Shared};
use futures::task::{LocalSpawn, LocalSpawnExt};
use web_time::Instant;

use super::bitmap::FrameBitmap;
use super::bitmap_cache::{BitmapCache, retention_window};
use super::decoder::{DecodeResult, FrameDecoder};
use super::generation::Generation;
use super::inflight::InflightDeduplicator;
use super::playback::PlaybackController;
use super::prefetch::PrefetchPlan;
use crate::constants::{
    DEFAULT_FPS, DEFAULT_MAX_CACHE, DEFAULT_PREFETCH_CONCURRENCY, DEFAULT_PREFETCH_RADIUS,
};
use crate::frame_source::{FrameIndex, FrameSource};

/// Buffering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// Frames to load ahead of the cursor (half as many behind)
    pub prefetch_radius: usize,
    /// Half-width of the retention window
    pub max_cache: usize,
    /// Maximum decodes per prefetch batch
    pub prefetch_concurrency: usize,
    /// Initial playback rate
    pub fps: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            prefetch_radius: DEFAULT_PREFETCH_RADIUS,
            max_cache: DEFAULT_MAX_CACHE,
            prefetch_concurrency: DEFAULT_PREFETCH_CONCURRENCY,
            fps: DEFAULT_FPS,
        }
    }
}

/// Snapshot of the buffer's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    pub generation: Generation,
    pub cursor: FrameIndex,
    pub frame_count: usize,
    pub resident: usize,
    pub inflight: usize,
    pub capacity: usize,
}

/// The scheduler's outstanding batch; settles once every member settled.
type PrefetchBatch = Shared<LocalBoxFuture<'static, ()>>;

/// State shared between the session, its completion futures and its prefetch runs.
struct BufferState<B: FrameBitmap> {
    source: Rc<FrameSource>,
    generation: Generation,
    cursor: FrameIndex,
    cache: BitmapCache<B>,
    inflight: InflightDeduplicator<B>,
    /// Id of the only prefetch run allowed to issue further batches
    prefetch_run: u64,
    /// Last batch issued by any prefetch run. A new batch is only issued once
    /// it settled, so superseded runs never add to the scheduler's load.
    prefetch_batch: Option<PrefetchBatch>,
    /// Frames that became resident since the last drain
    arrived: Vec<FrameIndex>,
}

impl<B: FrameBitmap> BufferState<B> {
    /// Apply a finished decode. Stale or out-of-window results are released
    /// without touching the cache.
    fn settle(
        &mut self,
        generation: Generation,
        index: FrameIndex,
        result: DecodeResult<B>,
    ) -> Option<Rc<B>> {
        if generation != self.generation {
            log::debug!(
                "Discarding frame {} from {} (current: {})",
                index,
                generation,
                self.generation
            );
            if let Ok(bitmap) = result {
                bitmap.release();
            }
            return None;
        }

        self.inflight.complete(generation, index);

        match result {
            Ok(bitmap) => {
                let in_window =
                    retention_window(self.cursor, self.cache.max_cache(), self.source.len())
                        .is_some_and(|window| window.contains(&index));
                if !in_window {
                    log::debug!(
                        "Frame {} arrived outside the window of cursor {}, dropping",
                        index,
                        self.cursor
                    );
                    bitmap.release();
                    return None;
                }

                let bitmap = Rc::new(bitmap);
                self.cache.insert(index, Rc::clone(&bitmap));
                self.arrived.push(index);
                Some(bitmap)
            }
            Err(e) => {
                log::warn!(
                    "Failed to load frame {} ({}): {}",
                    index,
                    self.source.locator(index).unwrap_or("?"),
                    e
                );
                None
            }
        }
    }
}

/// Cloneable access to the shared state, the decoder and the executor.
struct FrameLoader<D: FrameDecoder> {
    state: Rc<RefCell<BufferState<D::Bitmap>>>,
    decoder: Rc<D>,
    spawner: Rc<dyn LocalSpawn>,
}

impl<D: FrameDecoder> Clone for FrameLoader<D> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            decoder: Rc::clone(&self.decoder),
            spawner: Rc::clone(&self.spawner),
        }
    }
}

impl<D: FrameDecoder + 'static> FrameLoader<D> {
    /// Resident bitmap, shared pending decode, or a newly started decode.
    fn request(
        &self,
        generation: Generation,
        index: FrameIndex,
    ) -> LocalBoxFuture<'static, Option<Rc<D::Bitmap>>> {
        let locator = {
            let mut state = self.state.borrow_mut();
            if state.generation != generation {
                return future::ready(None).boxed_local();
            }
            if let Some(bitmap) = state.cache.get(index) {
                return future::ready(Some(bitmap)).boxed_local();
            }
            if let Some(load) = state.inflight.get(generation, index) {
                return load.boxed_local();
            }
            match state.source.locator(index) {
                Some(locator) => locator.to_string(),
                None => return future::ready(None).boxed_local(),
            }
        };

        log::trace!("Requesting frame {} ({})", index, locator);
        let decode = self.decoder.decode(index, &locator);
        let state: Weak<RefCell<BufferState<D::Bitmap>>> = Rc::downgrade(&self.state);
        let load = async move {
            let result = decode.await;
            match state.upgrade() {
                Some(state) => state.borrow_mut().settle(generation, index, result),
                None => {
                    if let Ok(bitmap) = result {
                        bitmap.release();
                    }
                    None
                }
            }
        }
        .boxed_local()
        .shared();

        self.state
            .borrow_mut()
            .inflight
            .register(generation, index, load.clone());

        // The decode must make progress even if every caller drops its future.
        if let Err(e) = self.spawner.spawn_local(load.clone().map(|_| ())) {
            log::error!("Failed to schedule decode of frame {}: {}", index, e);
            self.state.borrow_mut().inflight.complete(generation, index);
            return future::ready(None).boxed_local();
        }

        load.boxed_local()
    }

    /// Issue the plan batch by batch, stopping as soon as the generation goes
    /// stale or a newer run supersedes this one.
    ///
    /// Before each batch the run waits for the scheduler's outstanding batch,
    /// including one left behind by a superseded run, so at most
    /// `concurrency` prefetch decodes are in flight at any time.
    async fn run_prefetch(self, generation: Generation, run: u64, plan: PrefetchPlan) {
        for (batch_number, batch) in plan.batches().enumerate() {
            loop {
                let outstanding = self.state.borrow().prefetch_batch.clone();
                match outstanding {
                    Some(pending) if pending.peek().is_none() => pending.await,
                    _ => break,
                }
            }

            {
                let state = self.state.borrow();
                if state.generation != generation {
                    log::debug!("Prefetch run {} stopped: {} is stale", run, generation);
                    return;
                }
                if state.prefetch_run != run {
                    log::trace!("Prefetch run {} superseded by run {}", run, state.prefetch_run);
                    return;
                }
            }

            log::trace!(
                "Prefetch run {} batch {}: frames {:?}",
                run,
                batch_number,
                batch
            );
            let loads: Vec<_> = batch
                .iter()
                .map(|&index| self.request(generation, index))
                .collect();
            let pending: PrefetchBatch = future::join_all(loads)
                .map(|_| ())
                .boxed_local()
                .shared();
            self.state.borrow_mut().prefetch_batch = Some(pending.clone());
            pending.await;
        }
    }
}

/// Owns the frame cache, the in-flight map, the generation counter and the
/// playback timer for one frame source at a time.
pub struct FrameBufferSession<D: FrameDecoder> {
    loader: FrameLoader<D>,
    config: BufferConfig,
    playback: PlaybackController,
    open: bool,
}

impl<D: FrameDecoder + 'static> FrameBufferSession<D> {
    /// Create a closed session. Decodes and prefetch runs are spawned on `spawner`.
    pub fn new(decoder: D, spawner: impl LocalSpawn + 'static, config: BufferConfig) -> Self {
        let state = BufferState {
            source: Rc::new(FrameSource::empty()),
            generation: Generation::default(),
            cursor: 0,
            cache: BitmapCache::new(config.max_cache),
            inflight: InflightDeduplicator::new(),
            prefetch_run: 0,
            prefetch_batch: None,
            arrived: Vec::new(),
        };

        Self {
            loader: FrameLoader {
                state: Rc::new(RefCell::new(state)),
                decoder: Rc::new(decoder),
                spawner: Rc::new(spawner),
            },
            config,
            playback: PlaybackController::new(config.fps),
            open: false,
        }
    }

    /// Bind to a new frame source. Everything cached or in flight for the
    /// previous source is invalidated immediately.
    pub fn open(&mut self, source: FrameSource) -> Generation {
        let frame_count = source.len();
        let name = source.name().to_string();
        let generation = self.invalidate(source);
        self.playback.reset(frame_count);
        self.open = true;

        log::info!(
            "Opened frame source '{}' with {} frames ({})",
            name,
            frame_count,
            generation
        );

        self.schedule();
        generation
    }

    /// Tear down: disarm the timer, drop every cached frame and orphan every
    /// pending decode.
    pub fn close(&mut self) {
        self.playback.pause();
        let generation = self.invalidate(FrameSource::empty());
        self.playback.reset(0);
        if self.open {
            log::info!("Closed frame source ({} retired)", generation);
        }
        self.open = false;
    }

    fn invalidate(&mut self, source: FrameSource) -> Generation {
        let mut state = self.loader.state.borrow_mut();
        state.generation = state.generation.next();
        state.cache.clear();
        let orphaned = state.inflight.clear();
        if orphaned > 0 {
            log::debug!("Orphaned {} in-flight decodes", orphaned);
        }
        state.arrived.clear();
        state.prefetch_run += 1;
        state.prefetch_batch = None;
        state.cursor = 0;
        state.source = Rc::new(source);
        state.generation
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    pub fn generation(&self) -> Generation {
        self.loader.state.borrow().generation
    }

    pub fn frame_count(&self) -> usize {
        self.playback.frame_count()
    }

    /// The active frame source.
    pub fn source(&self) -> Rc<FrameSource> {
        Rc::clone(&self.loader.state.borrow().source)
    }

    pub fn current_frame(&self) -> FrameIndex {
        self.playback.cursor()
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    /// True once the current frame's bitmap is resident.
    pub fn is_ready(&self) -> bool {
        self.open && self.loader.state.borrow().cache.contains(self.current_frame())
    }

    /// Resident bitmap of the current frame. Counts as an access.
    pub fn current_bitmap(&self) -> Option<Rc<D::Bitmap>> {
        let index = self.current_frame();
        self.loader.state.borrow_mut().cache.get(index)
    }

    /// Resident bitmap of any frame, without starting a decode or touching
    /// its access counter.
    pub fn bitmap(&self, index: FrameIndex) -> Option<Rc<D::Bitmap>> {
        self.loader.state.borrow().cache.peek(index).cloned()
    }

    /// Request a frame under the current generation.
    ///
    /// Resolves immediately for resident frames, joins an outstanding decode
    /// if there is one, and starts a decode otherwise. Resolves to `None` on
    /// failure; the next request retries.
    pub fn request(&self, index: FrameIndex) -> LocalBoxFuture<'static, Option<Rc<D::Bitmap>>> {
        self.loader.request(self.generation(), index)
    }

    /// Request a frame on behalf of work started under `generation`.
    pub fn request_for(
        &self,
        generation: Generation,
        index: FrameIndex,
    ) -> LocalBoxFuture<'static, Option<Rc<D::Bitmap>>> {
        self.loader.request(generation, index)
    }

    /// Check if a frame is resident.
    pub fn is_resident(&self, index: FrameIndex) -> bool {
        self.loader.state.borrow().cache.contains(index)
    }

    /// Check if a frame has a decode outstanding.
    pub fn is_inflight(&self, index: FrameIndex) -> bool {
        self.loader.state.borrow().inflight.contains(index)
    }

    /// Resident frame indices in ascending order.
    pub fn resident_indices(&self) -> Vec<FrameIndex> {
        self.loader.state.borrow().cache.indices()
    }

    pub fn stats(&self) -> BufferStats {
        let state = self.loader.state.borrow();
        BufferStats {
            generation: state.generation,
            cursor: self.playback.cursor(),
            frame_count: state.source.len(),
            resident: state.cache.len(),
            inflight: state.inflight.len(),
            capacity: state.cache.capacity(),
        }
    }

    /// Drain the frames that became resident since the last call.
    pub fn take_arrivals(&mut self) -> Vec<FrameIndex> {
        std::mem::take(&mut self.loader.state.borrow_mut().arrived)
    }

    // --- Playback ---------------------------------------------------------

    pub fn play(&mut self, now: Instant) {
        self.playback.play(now);
    }

    pub fn pause(&mut self) {
        self.playback.pause();
    }

    pub fn stop(&mut self) {
        self.playback.stop();
    }

    pub fn toggle_play(&mut self, now: Instant) {
        self.playback.toggle(now);
    }

    pub fn set_fps(&mut self, fps: u32) {
        self.playback.set_fps(fps);
    }

    /// Drive the playback timer. Returns the new cursor if it advanced.
    pub fn tick(&mut self, now: Instant) -> Option<FrameIndex> {
        let cursor = self.playback.tick(now)?;
        self.on_cursor_moved(cursor);
        Some(cursor)
    }

    /// Jump to a frame (slider drag). Pauses playback first.
    pub fn seek(&mut self, index: FrameIndex) -> FrameIndex {
        let cursor = self.playback.seek(index);
        self.on_cursor_moved(cursor);
        cursor
    }

    /// Step by `delta` frames with wrap-around. Pauses playback first.
    pub fn step(&mut self, delta: isize) -> FrameIndex {
        let cursor = self.playback.step(delta);
        self.on_cursor_moved(cursor);
        cursor
    }

    pub fn jump_to_start(&mut self) -> FrameIndex {
        let cursor = self.playback.jump_to_start();
        self.on_cursor_moved(cursor);
        cursor
    }

    pub fn jump_to_end(&mut self) -> FrameIndex {
        let cursor = self.playback.jump_to_end();
        self.on_cursor_moved(cursor);
        cursor
    }

    fn on_cursor_moved(&mut self, cursor: FrameIndex) {
        if !self.open {
            return;
        }
        {
            let mut state = self.loader.state.borrow_mut();
            state.cursor = cursor;
            let frame_count = state.source.len();
            state.cache.evict_outside(cursor, frame_count);
        }
        self.schedule();
    }

    /// Request the current frame, then start a prefetch run for the window.
    fn schedule(&self) {
        let (generation, cursor, frame_count) = {
            let state = self.loader.state.borrow();
            (state.generation, state.cursor, state.source.len())
        };
        if frame_count == 0 {
            return;
        }

        // The loader keeps the decode alive; the handle itself is not needed.
        drop(self.loader.request(generation, cursor));

        let (run, plan) = {
            let mut state = self.loader.state.borrow_mut();
            state.prefetch_run += 1;
            let plan = PrefetchPlan::new(
                cursor,
                self.config.prefetch_radius,
                self.config.prefetch_concurrency,
                frame_count,
                |index| state.cache.contains(index) || state.inflight.contains(index),
            );
            (state.prefetch_run, plan)
        };

        if plan.is_empty() {
            return;
        }

        log::debug!(
            "Prefetch run {} around frame {}: {} frames",
            run,
            cursor,
            plan.len()
        );
        let loader = self.loader.clone();
        if let Err(e) = self
            .loader
            .spawner
            .spawn_local(loader.run_prefetch(generation, run, plan))
        {
            log::error!("Failed to schedule prefetch run {}: {}", run, e);
        }
    }
}

impl<D: FrameDecoder> Drop for FrameBufferSession<D> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.loader.state.try_borrow_mut() {
            state.generation = state.generation.next();
            state.cache.clear();
            state.inflight.clear();
        }
    }
}
