//! Mask overlay compositing.
//!
//! The compositor draws at the frame's native resolution; scaling to the
//! container is left to the presentation layer. Every call starts from a fresh
//! copy of the base frame, so redrawing the same frame and mask set always
//! yields the same pixels.

use image::RgbaImage;

use crate::color_utils::class_color;
use crate::constants::DEFAULT_MASK_ALPHA;
use crate::frame_source::FrameIndex;
use crate::masks::{Mask, MaskSource};
use crate::model::ObjectRegistry;

/// One tinted mask to blend.
#[derive(Debug, Clone, Copy)]
pub struct MaskLayer<'a> {
    pub mask: &'a Mask,
    pub color: [u8; 3],
}

/// Blends tinted masks over a base frame at a fixed translucency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayCompositor {
    alpha: f32,
}

impl Default for OverlayCompositor {
    fn default() -> Self {
        Self::new(DEFAULT_MASK_ALPHA)
    }
}

impl OverlayCompositor {
    /// Create a compositor; `alpha` is clamped to `[0, 1]`.
    pub fn new(alpha: f32) -> Self {
        let alpha = if alpha.is_finite() {
            alpha.clamp(0.0, 1.0)
        } else {
            DEFAULT_MASK_ALPHA
        };
        Self { alpha }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Blend `layers` in order over a copy of `base`.
    ///
    /// Only the region where mask and frame overlap is touched; a mask of a
    /// different size is neither scaled nor an error.
    pub fn compose<'a>(
        &self,
        base: &RgbaImage,
        layers: impl IntoIterator<Item = MaskLayer<'a>>,
    ) -> RgbaImage {
        let mut out = base.clone();
        let keep = 1.0 - self.alpha;

        for layer in layers {
            let width = out.width().min(layer.mask.width());
            let height = out.height().min(layer.mask.height());
            if (width, height) != (out.width(), out.height()) {
                log::trace!(
                    "Mask {}x{} does not match frame {}x{}, blending overlap only",
                    layer.mask.width(),
                    layer.mask.height(),
                    out.width(),
                    out.height()
                );
            }

            for y in 0..height {
                for x in 0..width {
                    if !layer.mask.is_covered(x, y) {
                        continue;
                    }
                    let pixel = out.get_pixel_mut(x, y);
                    for (channel, tint) in pixel.0.iter_mut().zip(layer.color) {
                        let blended = f32::from(*channel) * keep + f32::from(tint) * self.alpha;
                        *channel = blended.round().clamp(0.0, 255.0) as u8;
                    }
                }
            }
        }

        out
    }

    /// Composite the visible objects' masks for `frame`, in creation order,
    /// each tinted by its class color. Objects without a mask contribute nothing.
    pub fn compose_frame(
        &self,
        base: &RgbaImage,
        objects: &ObjectRegistry,
        masks: &impl MaskSource,
        frame: FrameIndex,
    ) -> RgbaImage {
        let Some(frame_masks) = masks.masks_for_frame(frame) else {
            return base.clone();
        };
        let layers = objects.visible().filter_map(|object| {
            frame_masks.get(&object.id).map(|mask| MaskLayer {
                mask,
                color: class_color(&object.class_name),
            })
        });
        self.compose(base, layers)
    }
}
