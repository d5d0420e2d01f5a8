//! Frame buffering: decoding, caching, prefetching and playback.

mod bitmap;
mod bitmap_cache;
mod decoder;
mod generation;
mod inflight;
#[cfg(not(target_arch = "wasm32"))]
mod native_decoder;
mod playback;
mod prefetch;
mod session;

#[cfg(test)]
mod tests;

pub use bitmap::{FrameBitmap, RgbaBitmap};
pub use bitmap_cache::{BitmapCache, retention_window};
pub use decoder::{DecodeError, DecodeResult, FrameDecoder};
pub use generation::Generation;
pub use inflight::{FrameLoad, InflightDeduplicator};
#[cfg(not(target_arch = "wasm32"))]
pub use native_decoder::NativeDecoderThread;
pub use playback::{PlaybackController, PlaybackState, tick_period};
pub use prefetch::{PrefetchPlan, prefetch_window};
pub use session::{BufferConfig, BufferStats, FrameBufferSession};
