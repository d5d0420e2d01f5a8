//! Decoded frame handles.
//!
//! The buffering layer never looks at pixels. It only needs the frame's
//! dimensions and a way to free backend resources when an entry leaves the
//! cache, so any backend (software buffer, GPU texture, platform bitmap) can
//! plug in by implementing [`FrameBitmap`].

use image::RgbaImage;

/// Opaque decoded image handle.
pub trait FrameBitmap {
    /// Width in pixels.
    fn width(&self) -> u32;

    /// Height in pixels.
    fn height(&self) -> u32;

    /// Free backend resources held by this handle.
    ///
    /// Called exactly once by the cache when the entry is evicted, when the
    /// frame source is replaced, or when a stale decode result is discarded.
    fn release(&self) {}

    /// Pixel dimensions as a `(width, height)` pair.
    fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }
}

/// Software RGBA frame produced by the native decoder.
#[derive(Debug, Clone)]
pub struct RgbaBitmap {
    image: RgbaImage,
}

impl RgbaBitmap {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Borrow the pixel buffer.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

impl FrameBitmap for RgbaBitmap {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn release(&self) {
        log::trace!(
            "Releasing {}x{} RGBA frame",
            self.image.width(),
            self.image.height()
        );
    }
}

impl AsRef<RgbaImage> for RgbaBitmap {
    fn as_ref(&self) -> &RgbaImage {
        &self.image
    }
}

impl From<RgbaImage> for RgbaBitmap {
    fn from(image: RgbaImage) -> Self {
        Self::new(image)
    }
}
