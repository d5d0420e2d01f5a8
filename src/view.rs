//! Presentation-facing scrub view.
//!
//! `ScrubView` ties the buffering session, the viewport mapper, the click
//! mapper and the compositor together behind explicit entry points. Redraws
//! are driven by dirty signals (cursor change, frame arrival, mask version
//! change, visibility change, resize) rather than by polling state.

use image::RgbaImage;
use web_time::Instant;

use crate::annotation::{AnnotationInputMapper, Prompt, PromptKind, PromptLog};
use crate::config::OverlaySettings;
use crate::frame_source::{FrameIndex, FrameSource};
use crate::masks::MaskSource;
use crate::model::{ObjectId, ObjectRegistry};
use crate::overlay::OverlayCompositor;
use crate::state::{BufferConfig, FrameBitmap, FrameBufferSession, FrameDecoder, Generation};
use crate::viewport::ViewportMapper;

/// Why the current composite is out of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawReason {
    FrameChanged,
    FrameArrived,
    MasksChanged,
    VisibilityChanged,
    Resized,
}

/// A prompt marker positioned in container pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PromptMarker {
    pub x: f32,
    pub y: f32,
    pub kind: PromptKind,
    pub object_id: ObjectId,
}

pub struct ScrubView<D: FrameDecoder> {
    session: FrameBufferSession<D>,
    mapper: ViewportMapper,
    input: AnnotationInputMapper,
    compositor: OverlayCompositor,
    prompts: PromptLog,
    show_prompts: bool,
    dirty: Option<RedrawReason>,
    seen_mask_version: Option<u64>,
}

impl<D: FrameDecoder + 'static> ScrubView<D> {
    pub fn new(session: FrameBufferSession<D>, compositor: OverlayCompositor) -> Self {
        Self {
            session,
            mapper: ViewportMapper::new(),
            input: AnnotationInputMapper::new(),
            compositor,
            prompts: PromptLog::new(),
            show_prompts: true,
            dirty: None,
            seen_mask_version: None,
        }
    }

    /// Build a view with the compositor and marker visibility from config.
    pub fn from_settings(session: FrameBufferSession<D>, settings: &OverlaySettings) -> Self {
        let mut view = Self::new(session, OverlayCompositor::new(settings.mask_alpha));
        view.show_prompts = settings.show_prompts;
        view
    }

    /// Bind a new frame source. Prompts and the image size of the previous
    /// source are dropped along with its frames.
    pub fn open(&mut self, source: FrameSource) -> Generation {
        let generation = self.session.open(source);
        self.mapper.reset_image();
        self.prompts.clear();
        self.seen_mask_version = None;
        self.mark_dirty(RedrawReason::FrameChanged);
        generation
    }

    pub fn close(&mut self) {
        self.session.close();
        self.mapper.reset_image();
        self.prompts.clear();
        self.dirty = None;
    }

    pub fn session(&self) -> &FrameBufferSession<D> {
        &self.session
    }

    pub fn config(&self) -> &BufferConfig {
        self.session.config()
    }

    pub fn current_frame(&self) -> FrameIndex {
        self.session.current_frame()
    }

    /// True once the current frame can be drawn.
    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    pub fn viewport_mapper(&self) -> &ViewportMapper {
        &self.mapper
    }

    pub fn pending_redraw(&self) -> Option<RedrawReason> {
        self.dirty
    }

    fn mark_dirty(&mut self, reason: RedrawReason) {
        if self.dirty.is_none() {
            log::trace!("Redraw needed: {:?}", reason);
            self.dirty = Some(reason);
        }
    }

    // --- Navigation -------------------------------------------------------

    pub fn play(&mut self, now: Instant) {
        self.session.play(now);
    }

    pub fn pause(&mut self) {
        self.session.pause();
    }

    pub fn toggle_play(&mut self, now: Instant) {
        self.session.toggle_play(now);
    }

    pub fn set_fps(&mut self, fps: u32) {
        self.session.set_fps(fps);
    }

    pub fn seek(&mut self, index: FrameIndex) -> FrameIndex {
        let cursor = self.session.seek(index);
        self.on_frame_changed();
        cursor
    }

    pub fn step(&mut self, delta: isize) -> FrameIndex {
        let cursor = self.session.step(delta);
        self.on_frame_changed();
        cursor
    }

    pub fn jump_to_start(&mut self) -> FrameIndex {
        let cursor = self.session.jump_to_start();
        self.on_frame_changed();
        cursor
    }

    pub fn jump_to_end(&mut self) -> FrameIndex {
        let cursor = self.session.jump_to_end();
        self.on_frame_changed();
        cursor
    }

    fn on_frame_changed(&mut self) {
        self.mark_dirty(RedrawReason::FrameChanged);
        self.sync_image_dimensions();
    }

    /// Drive playback and pick up finished decodes. Returns true if a redraw
    /// is pending afterwards.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.session.tick(now).is_some() {
            self.on_frame_changed();
        }

        let current = self.current_frame();
        if self.session.take_arrivals().contains(&current) {
            self.mark_dirty(RedrawReason::FrameArrived);
            self.sync_image_dimensions();
        }
        self.dirty.is_some()
    }

    /// Track the current frame's pixel size so the viewport follows
    /// resolution changes.
    fn sync_image_dimensions(&mut self) {
        if let Some(bitmap) = self.session.current_bitmap() {
            let (width, height) = bitmap.dimensions();
            if self.mapper.on_image_dimensions(width, height) {
                self.mark_dirty(RedrawReason::Resized);
            }
        }
    }

    // --- Presentation events ----------------------------------------------

    /// The container was resized. Prompt markers need repositioning.
    pub fn on_container_resized(&mut self, width: f32, height: f32) -> bool {
        let changed = self.mapper.on_container_resized(width, height);
        if changed {
            self.mark_dirty(RedrawReason::Resized);
        }
        changed
    }

    /// An object's visibility was toggled in the registry.
    pub fn on_visibility_changed(&mut self) {
        self.mark_dirty(RedrawReason::VisibilityChanged);
    }

    /// Compare the mask source's version with the last composited one.
    pub fn sync_masks(&mut self, masks: &impl MaskSource) -> bool {
        let version = masks.mask_version();
        if self.seen_mask_version == Some(version) {
            return false;
        }
        self.mark_dirty(RedrawReason::MasksChanged);
        true
    }

    // --- Annotation -------------------------------------------------------

    pub fn set_tool(&mut self, tool: PromptKind) {
        self.input.set_tool(tool);
    }

    pub fn set_active_object(&mut self, object: Option<ObjectId>) {
        self.input.set_active_object(object);
    }

    pub fn input(&self) -> &AnnotationInputMapper {
        &self.input
    }

    /// Handle a click in container pixels. Returns the prompt to forward to
    /// segmentation, or `None` if the click is ignored.
    pub fn on_pointer_click(&mut self, display_x: f32, display_y: f32) -> Option<Prompt> {
        let prompt = self
            .input
            .map_click(&self.mapper, display_x, display_y, self.current_frame())?;
        log::debug!(
            "{} prompt for object {} on frame {} at ({:.3}, {:.3})",
            prompt.kind.name(),
            prompt.object_id,
            prompt.frame_index,
            prompt.x,
            prompt.y
        );
        self.prompts.push(prompt);
        Some(prompt)
    }

    /// Hide or show prompt markers. Recorded prompts are kept either way.
    pub fn set_show_prompts(&mut self, show: bool) {
        self.show_prompts = show;
    }

    pub fn shows_prompts(&self) -> bool {
        self.show_prompts
    }

    pub fn prompts(&self) -> &PromptLog {
        &self.prompts
    }

    /// Remove the most recent prompt.
    pub fn undo_prompt(&mut self) -> Option<Prompt> {
        self.prompts.pop()
    }

    /// Remove the current frame's prompts.
    pub fn clear_frame_prompts(&mut self) -> usize {
        let frame = self.current_frame();
        self.prompts.clear_frame(frame)
    }

    /// Prompts of the current frame mapped to container pixels. Empty while
    /// markers are hidden.
    pub fn prompt_markers(&self) -> Vec<PromptMarker> {
        if !self.show_prompts {
            return Vec::new();
        }
        self.prompts
            .for_frame(self.current_frame())
            .filter_map(|prompt| {
                let (x, y) = self.mapper.to_display(prompt.point())?;
                Some(PromptMarker {
                    x,
                    y,
                    kind: prompt.kind,
                    object_id: prompt.object_id,
                })
            })
            .collect()
    }
}

impl<D> ScrubView<D>
where
    D: FrameDecoder + 'static,
    D::Bitmap: AsRef<RgbaImage>,
{
    /// Composite the current frame if anything changed since the last draw.
    ///
    /// Returns `None` when nothing is dirty or the current frame is not
    /// resident yet; in the latter case the redraw stays pending.
    pub fn take_redraw(
        &mut self,
        objects: &ObjectRegistry,
        masks: &impl MaskSource,
    ) -> Option<RgbaImage> {
        self.sync_masks(masks);
        let reason = self.dirty?;
        let bitmap = self.session.current_bitmap()?;

        let frame = self.current_frame();
        let image: &RgbaImage = (*bitmap).as_ref();
        self.mapper.on_image_dimensions(image.width(), image.height());
        let composite = self.compositor.compose_frame(image, objects, masks, frame);

        log::trace!("Redrew frame {} ({:?})", frame, reason);
        self.dirty = None;
        self.seen_mask_version = Some(masks.mask_version());
        Some(composite)
    }
}
