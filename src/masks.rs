//! Segmentation masks supplied by the inference service.
//!
//! A mask is a per-pixel coverage map at frame resolution. Masks are keyed by
//! (frame, object); a missing entry means "no mask yet", never an error. The
//! store keeps a version counter that is bumped on every mutation so views
//! can tell when to recomposite.

use std::collections::HashMap;

use image::{DynamicImage, GrayImage, Luma, RgbaImage};

use crate::frame_source::FrameIndex;
use crate::model::ObjectId;

/// Coverage value marking a pixel as part of the mask.
const COVERED: u8 = 255;

/// Binary coverage map of one object on one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    coverage: GrayImage,
}

impl Mask {
    /// Any non-zero luma value counts as covered.
    pub fn from_luma(image: &GrayImage) -> Self {
        let coverage = GrayImage::from_fn(image.width(), image.height(), |x, y| {
            Luma([if image.get_pixel(x, y)[0] > 0 { COVERED } else { 0 }])
        });
        Self { coverage }
    }

    /// Non-transparent pixels count as covered.
    pub fn from_rgba(image: &RgbaImage) -> Self {
        let coverage = GrayImage::from_fn(image.width(), image.height(), |x, y| {
            Luma([if image.get_pixel(x, y)[3] > 0 { COVERED } else { 0 }])
        });
        Self { coverage }
    }

    /// Images with an alpha channel use it as coverage, others use luma.
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        if image.color().has_alpha() {
            Self::from_rgba(&image.to_rgba8())
        } else {
            Self::from_luma(&image.to_luma8())
        }
    }

    /// Build a mask from a predicate over pixel coordinates.
    pub fn from_fn(width: u32, height: u32, mut covered: impl FnMut(u32, u32) -> bool) -> Self {
        let coverage = GrayImage::from_fn(width, height, |x, y| {
            Luma([if covered(x, y) { COVERED } else { 0 }])
        });
        Self { coverage }
    }

    pub fn width(&self) -> u32 {
        self.coverage.width()
    }

    pub fn height(&self) -> u32 {
        self.coverage.height()
    }

    /// Check if a pixel is covered. Out-of-range pixels are not.
    pub fn is_covered(&self, x: u32, y: u32) -> bool {
        x < self.width() && y < self.height() && self.coverage.get_pixel(x, y)[0] > 0
    }

    /// Number of covered pixels.
    pub fn area(&self) -> usize {
        self.coverage.pixels().filter(|p| p[0] > 0).count()
    }
}

/// Per-frame mask lookup consumed by the compositor.
pub trait MaskSource {
    /// All masks of a frame, by object. `None` when the frame has none.
    fn masks_for_frame(&self, frame: FrameIndex) -> Option<&HashMap<ObjectId, Mask>>;

    /// Mask of `object_id` on `frame`, if one exists.
    fn mask_for(&self, object_id: ObjectId, frame: FrameIndex) -> Option<&Mask> {
        self.masks_for_frame(frame)?.get(&object_id)
    }

    /// Counter that increases whenever any mask changes.
    fn mask_version(&self) -> u64;
}

/// In-memory mask storage.
#[derive(Debug, Default)]
pub struct MaskStore {
    frames: HashMap<FrameIndex, HashMap<ObjectId, Mask>>,
    version: u64,
}

impl MaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the mask of an object on a frame.
    pub fn save_mask(&mut self, frame: FrameIndex, object_id: ObjectId, mask: Mask) {
        self.frames.entry(frame).or_default().insert(object_id, mask);
        self.bump();
    }

    /// Remove every mask on a frame. Returns how many were removed.
    pub fn clear_frame(&mut self, frame: FrameIndex) -> usize {
        let removed = self.frames.remove(&frame).map_or(0, |masks| masks.len());
        if removed > 0 {
            self.bump();
        }
        removed
    }

    /// Remove an object's masks from every frame.
    pub fn delete_object(&mut self, object_id: ObjectId) -> usize {
        let mut removed = 0;
        for masks in self.frames.values_mut() {
            if masks.remove(&object_id).is_some() {
                removed += 1;
            }
        }
        self.frames.retain(|_, masks| !masks.is_empty());
        if removed > 0 {
            self.bump();
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.frames.is_empty() {
            self.frames.clear();
            self.bump();
        }
    }

    /// Number of stored masks across all frames.
    pub fn len(&self) -> usize {
        self.frames.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn bump(&mut self) {
        self.version += 1;
        log::trace!("Mask version -> {}", self.version);
    }
}

impl MaskSource for MaskStore {
    fn masks_for_frame(&self, frame: FrameIndex) -> Option<&HashMap<ObjectId, Mask>> {
        self.frames.get(&frame)
    }

    fn mask_version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_rgba_alpha_is_coverage() {
        let mut image = RgbaImage::new(4, 2);
        image.put_pixel(1, 0, Rgba([0, 0, 0, 1]));
        image.put_pixel(3, 1, Rgba([255, 255, 255, 255]));
        let mask = Mask::from_rgba(&image);
        assert!(mask.is_covered(1, 0));
        assert!(mask.is_covered(3, 1));
        assert!(!mask.is_covered(0, 0));
        assert!(!mask.is_covered(10, 10));
        assert_eq!(mask.area(), 2);
    }

    #[test]
    fn test_luma_nonzero_is_coverage() {
        let mut image = GrayImage::new(3, 3);
        image.put_pixel(2, 2, Luma([7]));
        let mask = Mask::from_dynamic(&DynamicImage::ImageLuma8(image));
        assert_eq!(mask.area(), 1);
        assert!(mask.is_covered(2, 2));
    }

    #[test]
    fn test_every_mutation_bumps_version() {
        let mut store = MaskStore::new();
        let mask = Mask::from_fn(2, 2, |x, _| x == 0);
        assert_eq!(store.mask_version(), 0);

        store.save_mask(3, 1, mask.clone());
        store.save_mask(4, 1, mask.clone());
        store.save_mask(4, 2, mask);
        assert_eq!(store.mask_version(), 3);
        assert!(store.mask_for(1, 3).is_some());
        assert!(store.mask_for(2, 3).is_none());

        let frame_four = store.masks_for_frame(4).unwrap();
        assert_eq!(frame_four.len(), 2);
        assert!(frame_four.contains_key(&2));
        assert!(store.masks_for_frame(9).is_none());

        assert_eq!(store.delete_object(1), 2);
        assert_eq!(store.mask_version(), 4);
        assert_eq!(store.len(), 1);

        assert_eq!(store.clear_frame(4), 1);
        assert_eq!(store.mask_version(), 5);

        // No-op mutations leave the version alone
        assert_eq!(store.clear_frame(4), 0);
        store.clear();
        assert_eq!(store.mask_version(), 5);
        assert!(store.is_empty());
    }
}
