//! Global constants for the frame scrubber

/// Number of frames eagerly decoded ahead of the cursor (half as many behind it)
pub const DEFAULT_PREFETCH_RADIUS: usize = 60;

/// Half-width of the retention window around the cursor
pub const DEFAULT_MAX_CACHE: usize = 180;

/// Maximum number of decode requests a single prefetch batch issues
pub const DEFAULT_PREFETCH_CONCURRENCY: usize = 6;

/// Default playback rate in frames per second
pub const DEFAULT_FPS: u32 = 10;

/// Lowest selectable playback rate
pub const MIN_FPS: u32 = 1;

/// Highest selectable playback rate
pub const MAX_FPS: u32 = 60;

/// Translucency used when blending tinted masks over the base frame
pub const DEFAULT_MASK_ALPHA: f32 = 0.4;
