//! Data models for the frame scrubber.

mod object;

pub use object::{ObjectId, ObjectRegistry, SegmentObject};
