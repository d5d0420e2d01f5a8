//! Playback cursor, play/pause state and the frame timer.
//!
//! The controller does not own a real timer. The presentation layer calls
//! [`PlaybackController::tick`] from its frame loop and the controller advances
//! the cursor once per elapsed period. Disarming the timer is just dropping the
//! deadline, so a paused or closed controller can never fire.

use std::time::Duration;

use web_time::Instant;

use crate::constants::{DEFAULT_FPS, MAX_FPS, MIN_FPS};
use crate::frame_source::FrameIndex;

/// Whether the cursor is advancing on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Paused,
    Playing,
}

/// Armed frame timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PlaybackTimer {
    period: Duration,
    next_due: Instant,
}

/// Tick period for a frame rate.
pub fn tick_period(fps: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(fps.clamp(MIN_FPS, MAX_FPS)))
}

/// Owns the current frame index, the play/pause flag and the frame rate.
#[derive(Debug, Clone)]
pub struct PlaybackController {
    state: PlaybackState,
    cursor: FrameIndex,
    frame_count: usize,
    fps: u32,
    timer: Option<PlaybackTimer>,
}

impl PlaybackController {
    pub fn new(fps: u32) -> Self {
        Self {
            state: PlaybackState::Paused,
            cursor: 0,
            frame_count: 0,
            fps: fps.clamp(MIN_FPS, MAX_FPS),
            timer: None,
        }
    }

    /// Rebind to a source of `frame_count` frames: pause and rewind.
    pub fn reset(&mut self, frame_count: usize) {
        self.pause();
        self.frame_count = frame_count;
        self.cursor = 0;
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn cursor(&self) -> FrameIndex {
        self.cursor
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Current tick period.
    pub fn period(&self) -> Duration {
        tick_period(self.fps)
    }

    /// Start playing. No-op if already playing or there is nothing to play.
    pub fn play(&mut self, now: Instant) {
        if self.is_playing() || self.frame_count == 0 {
            return;
        }
        let period = self.period();
        self.state = PlaybackState::Playing;
        self.timer = Some(PlaybackTimer {
            period,
            next_due: now + period,
        });
        log::debug!("Playback started at frame {} ({} fps)", self.cursor, self.fps);
    }

    /// Pause and disarm the timer.
    pub fn pause(&mut self) {
        if self.timer.take().is_some() {
            log::debug!("Playback paused at frame {}", self.cursor);
        }
        self.state = PlaybackState::Paused;
    }

    /// Stop playback. The cursor stays where it is.
    pub fn stop(&mut self) {
        self.pause();
    }

    /// Toggle between playing and paused.
    pub fn toggle(&mut self, now: Instant) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play(now);
        }
    }

    /// Change the frame rate. While playing, the next deadline is re-derived
    /// from the new period without touching the cursor.
    pub fn set_fps(&mut self, fps: u32) {
        self.fps = fps.clamp(MIN_FPS, MAX_FPS);
        let period = self.period();
        if let Some(timer) = &mut self.timer {
            let last_tick = timer.next_due.checked_sub(timer.period);
            timer.period = period;
            if let Some(last_tick) = last_tick {
                timer.next_due = last_tick + period;
            }
        }
    }

    /// Advance the cursor if the timer is due.
    ///
    /// Returns the new cursor when it moved. At most one frame is advanced per
    /// call; a late tick schedules the next deadline one period from `now`
    /// instead of bursting to catch up.
    pub fn tick(&mut self, now: Instant) -> Option<FrameIndex> {
        let timer = self.timer.as_mut()?;
        if now < timer.next_due || self.frame_count == 0 {
            return None;
        }

        timer.next_due += timer.period;
        if timer.next_due <= now {
            timer.next_due = now + timer.period;
        }

        self.cursor = (self.cursor + 1) % self.frame_count;
        log::trace!("Playback tick -> frame {}", self.cursor);
        Some(self.cursor)
    }

    /// Jump to a frame (slider drag). Pauses first; clamps to the last frame.
    pub fn seek(&mut self, index: FrameIndex) -> FrameIndex {
        self.pause();
        self.cursor = index.min(self.frame_count.saturating_sub(1));
        self.cursor
    }

    /// Step by `delta` frames, wrapping at both ends. Pauses first.
    pub fn step(&mut self, delta: isize) -> FrameIndex {
        self.pause();
        if self.frame_count == 0 {
            return self.cursor;
        }
        let count = self.frame_count as isize;
        let next = (self.cursor as isize + delta).rem_euclid(count);
        self.cursor = next as FrameIndex;
        self.cursor
    }

    /// Jump to the first frame. Pauses first.
    pub fn jump_to_start(&mut self) -> FrameIndex {
        self.seek(0)
    }

    /// Jump to the last frame. Pauses first.
    pub fn jump_to_end(&mut self) -> FrameIndex {
        self.seek(self.frame_count.saturating_sub(1))
    }

    /// Whether the frame timer is armed.
    pub fn timer_armed(&self) -> bool {
        self.timer.is_some()
    }
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new(DEFAULT_FPS)
    }
}
