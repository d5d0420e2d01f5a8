//! framescrub - Frame scrubbing with mask overlays and point prompts
//!
//! Buffers, prefetches and plays back long sequences of still frames, maps
//! clicks on a letterboxed display to normalized image coordinates, and
//! composites per-object segmentation masks over the current frame.

pub mod annotation;
pub mod color_utils;
pub mod config;
pub mod constants;
pub mod frame_source;
pub mod masks;
pub mod model;
pub mod overlay;
pub mod state;
pub mod view;
pub mod viewport;

pub use annotation::{AnnotationInputMapper, Prompt, PromptKind, PromptLog};
pub use config::{AppConfig, ConfigError, LogLevel};
pub use frame_source::{FrameIndex, FrameSource, SourceError};
pub use masks::{Mask, MaskSource, MaskStore};
pub use model::{ObjectId, ObjectRegistry, SegmentObject};
pub use overlay::{MaskLayer, OverlayCompositor};
pub use state::{
    BufferConfig, BufferStats, DecodeError, FrameBitmap, FrameBufferSession, FrameDecoder,
    Generation, PlaybackState, RgbaBitmap,
};
pub use view::{PromptMarker, RedrawReason, ScrubView};
pub use viewport::{NormalizedPoint, Viewport, ViewportMapper};
