//! Letterboxed image placement and coordinate mapping.
//!
//! This module contains the aspect-fit math for placing a frame inside its
//! display container, extracted for testability. The mapper is pure: the
//! presentation layer tells it about container resizes and image dimension
//! changes, and it recomputes the placement.

/// A point in normalized image space: fractions of image width and height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPoint {
    /// Create a normalized point, or `None` if either coordinate is outside `[0, 1]`.
    pub fn new(x: f32, y: f32) -> Option<Self> {
        let inside = |v: f32| (0.0..=1.0).contains(&v);
        (inside(x) && inside(y)).then_some(Self { x, y })
    }
}

/// Placement of the image inside its container, in container pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub display_width: f32,
    pub display_height: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    /// Image pixel size the placement was computed for
    pub image_width: u32,
    pub image_height: u32,
}

impl Viewport {
    /// Fit an image into a container while preserving its aspect ratio,
    /// centering it along the unconstrained axis.
    ///
    /// Returns `None` if any dimension is zero or not finite.
    pub fn aspect_fit(
        container_width: f32,
        container_height: f32,
        image_width: u32,
        image_height: u32,
    ) -> Option<Self> {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if !valid(container_width) || !valid(container_height) {
            return None;
        }
        if image_width == 0 || image_height == 0 {
            return None;
        }

        let iw = image_width as f32;
        let ih = image_height as f32;
        let container_aspect = container_width / container_height;
        let image_aspect = iw / ih;

        let (display_width, display_height) = if container_aspect > image_aspect {
            // Height-constrained: bars left and right
            (container_height * image_aspect, container_height)
        } else {
            // Width-constrained: bars top and bottom
            (container_width, container_width / image_aspect)
        };

        Some(Self {
            display_width,
            display_height,
            offset_x: (container_width - display_width) / 2.0,
            offset_y: (container_height - display_height) / 2.0,
            image_width,
            image_height,
        })
    }

    /// Display pixels per image pixel.
    pub fn scale(&self) -> f32 {
        self.display_width / self.image_width as f32
    }

    /// Image pixel → display point.
    pub fn image_to_display(&self, image_x: f32, image_y: f32) -> (f32, f32) {
        let scale = self.scale();
        (
            self.offset_x + image_x * scale,
            self.offset_y + image_y * scale,
        )
    }

    /// Normalized image point → display point.
    pub fn normalized_to_display(&self, point: NormalizedPoint) -> (f32, f32) {
        (
            self.offset_x + point.x * self.display_width,
            self.offset_y + point.y * self.display_height,
        )
    }

    /// Display point → normalized image point.
    ///
    /// Returns `None` for points in the letterbox bars or outside the container.
    pub fn display_to_normalized(&self, display_x: f32, display_y: f32) -> Option<NormalizedPoint> {
        NormalizedPoint::new(
            (display_x - self.offset_x) / self.display_width,
            (display_y - self.offset_y) / self.display_height,
        )
    }

    /// Display point → image pixel coordinates, `None` outside the image.
    pub fn display_to_image(&self, display_x: f32, display_y: f32) -> Option<(f32, f32)> {
        self.display_to_normalized(display_x, display_y)
            .map(|p| (p.x * self.image_width as f32, p.y * self.image_height as f32))
    }
}

/// Keeps the viewport in sync with container and image sizes.
#[derive(Debug, Clone, Default)]
pub struct ViewportMapper {
    container: Option<(f32, f32)>,
    image: Option<(u32, u32)>,
    viewport: Option<Viewport>,
}

impl ViewportMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Container was resized. Returns true if the placement changed.
    pub fn on_container_resized(&mut self, width: f32, height: f32) -> bool {
        if self.container == Some((width, height)) {
            return false;
        }
        self.container = Some((width, height));
        self.recompute()
    }

    /// A frame with these pixel dimensions is about to be shown.
    /// Returns true if the placement changed.
    pub fn on_image_dimensions(&mut self, width: u32, height: u32) -> bool {
        if self.image == Some((width, height)) {
            return false;
        }
        self.image = Some((width, height));
        self.recompute()
    }

    /// Forget the image dimensions (new frame source); mapping is
    /// unavailable until the next frame resolves.
    pub fn reset_image(&mut self) {
        self.image = None;
        self.viewport = None;
    }

    fn recompute(&mut self) -> bool {
        let next = match (self.container, self.image) {
            (Some((cw, ch)), Some((iw, ih))) => Viewport::aspect_fit(cw, ch, iw, ih),
            _ => None,
        };
        let changed = next != self.viewport;
        if changed {
            log::debug!("Viewport recomputed: {:?}", next);
        }
        self.viewport = next;
        changed
    }

    /// Current placement; `None` until both sizes are known.
    pub fn viewport(&self) -> Option<&Viewport> {
        self.viewport.as_ref()
    }

    pub fn container_size(&self) -> Option<(f32, f32)> {
        self.container
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image
    }

    /// Display point → normalized image point. `None` while no viewport is
    /// known or when the point misses the image.
    pub fn to_normalized(&self, display_x: f32, display_y: f32) -> Option<NormalizedPoint> {
        self.viewport?.display_to_normalized(display_x, display_y)
    }

    /// Normalized image point → display point.
    pub fn to_display(&self, point: NormalizedPoint) -> Option<(f32, f32)> {
        self.viewport.map(|v| v.normalized_to_display(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 0.001;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_wide_container_is_height_constrained() {
        let v = Viewport::aspect_fit(200.0, 100.0, 1920, 1080).unwrap();
        assert!(approx_eq(v.display_height, 100.0));
        assert!(approx_eq(v.display_width, 177.778));
        assert!(approx_eq(v.offset_x, 11.111));
        assert_eq!(v.offset_y, 0.0);
    }

    #[test]
    fn test_tall_container_is_width_constrained() {
        let v = Viewport::aspect_fit(100.0, 100.0, 1920, 1080).unwrap();
        assert_eq!(v.display_width, 100.0);
        assert!(approx_eq(v.display_height, 56.25));
        assert_eq!(v.offset_x, 0.0);
        assert!(approx_eq(v.offset_y, 21.875));
    }

    #[test]
    fn test_click_round_trip() {
        let v = Viewport::aspect_fit(200.0, 100.0, 1920, 1080).unwrap();
        let p = v.display_to_normalized(100.0, 50.0).unwrap();
        assert!(approx_eq(p.x, 0.5));
        assert!(approx_eq(p.y, 0.5));

        let (x, y) = v.normalized_to_display(p);
        assert!((x - 100.0).abs() < 1.0);
        assert!((y - 50.0).abs() < 1.0);
    }

    #[test]
    fn test_click_in_letterbox_bar_is_rejected() {
        let v = Viewport::aspect_fit(100.0, 100.0, 1920, 1080).unwrap();
        // Top bar spans y in [0, 21.875)
        assert!(v.display_to_normalized(50.0, 10.0).is_none());
        assert!(v.display_to_normalized(50.0, 95.0).is_none());
        let p = v.display_to_normalized(50.0, 30.0).unwrap();
        assert!(approx_eq(p.y, (30.0 - 21.875) / 56.25));
    }

    #[test]
    fn test_image_pixel_forward_transform() {
        let v = Viewport::aspect_fit(200.0, 100.0, 1920, 1080).unwrap();
        let (x, y) = v.image_to_display(1920.0, 1080.0);
        assert!(approx_eq(x, 200.0 - v.offset_x));
        assert!(approx_eq(y, 100.0));

        let (ix, iy) = v.display_to_image(100.0, 50.0).unwrap();
        assert!((ix - 960.0).abs() < 0.5);
        assert!((iy - 540.0).abs() < 0.5);
    }

    #[test]
    fn test_degenerate_sizes() {
        assert!(Viewport::aspect_fit(0.0, 100.0, 10, 10).is_none());
        assert!(Viewport::aspect_fit(100.0, 100.0, 0, 10).is_none());
        assert!(Viewport::aspect_fit(f32::NAN, 100.0, 10, 10).is_none());
    }

    #[test]
    fn test_mapper_unavailable_until_first_frame() {
        let mut mapper = ViewportMapper::new();
        assert!(!mapper.on_container_resized(200.0, 100.0));
        assert!(mapper.viewport().is_none());
        assert!(mapper.to_normalized(100.0, 50.0).is_none());

        assert!(mapper.on_image_dimensions(1920, 1080));
        assert!(mapper.to_normalized(100.0, 50.0).is_some());
    }

    #[test]
    fn test_mapper_recomputes_on_resize_and_new_resolution() {
        let mut mapper = ViewportMapper::new();
        mapper.on_container_resized(200.0, 100.0);
        mapper.on_image_dimensions(1920, 1080);
        let before = *mapper.viewport().unwrap();

        assert!(!mapper.on_container_resized(200.0, 100.0));
        assert!(mapper.on_container_resized(100.0, 100.0));
        assert_ne!(*mapper.viewport().unwrap(), before);

        assert!(mapper.on_image_dimensions(640, 640));
        let v = mapper.viewport().unwrap();
        assert_eq!((v.display_width, v.display_height), (100.0, 100.0));

        mapper.reset_image();
        assert!(mapper.viewport().is_none());
        assert_eq!(mapper.container_size(), Some((100.0, 100.0)));
    }

    #[test]
    fn test_normalized_point_bounds() {
        assert!(NormalizedPoint::new(0.0, 1.0).is_some());
        assert!(NormalizedPoint::new(-0.01, 0.5).is_none());
        assert!(NormalizedPoint::new(0.5, 1.01).is_none());
        assert!(NormalizedPoint::new(f32::NAN, 0.5).is_none());
    }
}
