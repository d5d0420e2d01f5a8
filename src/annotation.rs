//! Point prompts and click-to-prompt translation.
//!
//! This module provides:
//! - Prompt types (normalized position, polarity, target object, frame)
//! - The input mapper turning pointer events into prompts
//! - The ordered prompt log of a session

use serde::{Deserialize, Serialize};

use crate::frame_source::FrameIndex;
use crate::model::ObjectId;
use crate::viewport::{NormalizedPoint, ViewportMapper};

// ============================================================================
// Prompt Types
// ============================================================================

/// Polarity of a point prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    /// The point belongs to the object
    #[default]
    Positive,
    /// The point does not belong to the object
    Negative,
}

impl PromptKind {
    /// Get the display name for this prompt kind.
    pub fn name(&self) -> &'static str {
        match self {
            PromptKind::Positive => "Positive",
            PromptKind::Negative => "Negative",
        }
    }

    /// Marker color (RGB) used when drawing prompts of this kind.
    pub fn marker_color(&self) -> [u8; 3] {
        match self {
            PromptKind::Positive => [34, 197, 94],
            PromptKind::Negative => [239, 68, 68],
        }
    }
}

/// A single point annotation. Coordinates are always within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub kind: PromptKind,
    pub object_id: ObjectId,
    pub frame_index: FrameIndex,
}

impl Prompt {
    pub fn new(
        point: NormalizedPoint,
        kind: PromptKind,
        object_id: ObjectId,
        frame_index: FrameIndex,
    ) -> Self {
        Self {
            x: point.x,
            y: point.y,
            kind,
            object_id,
            frame_index,
        }
    }

    pub fn point(&self) -> NormalizedPoint {
        NormalizedPoint {
            x: self.x,
            y: self.y,
        }
    }
}

// ============================================================================
// Input Mapping
// ============================================================================

/// Active tool and target object for incoming clicks.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotationInputMapper {
    tool: PromptKind,
    active_object: Option<ObjectId>,
}

impl AnnotationInputMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(&self) -> PromptKind {
        self.tool
    }

    pub fn set_tool(&mut self, tool: PromptKind) {
        self.tool = tool;
    }

    pub fn active_object(&self) -> Option<ObjectId> {
        self.active_object
    }

    pub fn set_active_object(&mut self, object: Option<ObjectId>) {
        self.active_object = object;
    }

    /// Translate a click in container pixels into a prompt.
    ///
    /// Returns `None` when no viewport is known yet (first frame not decoded),
    /// when the click lands outside the image, or when no object is active.
    pub fn map_click(
        &self,
        mapper: &ViewportMapper,
        display_x: f32,
        display_y: f32,
        frame_index: FrameIndex,
    ) -> Option<Prompt> {
        if mapper.viewport().is_none() {
            log::debug!("Ignoring click: no frame dimensions known yet");
            return None;
        }
        let Some(point) = mapper.to_normalized(display_x, display_y) else {
            log::trace!("Click ({}, {}) outside image bounds", display_x, display_y);
            return None;
        };
        let Some(object_id) = self.active_object else {
            log::debug!("Ignoring click: no active object");
            return None;
        };
        Some(Prompt::new(point, self.tool, object_id, frame_index))
    }
}

// ============================================================================
// Prompt Log
// ============================================================================

/// Prompts collected during a session, in the order they were made.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptLog {
    prompts: Vec<Prompt>,
}

impl PromptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, prompt: Prompt) {
        self.prompts.push(prompt);
    }

    /// Remove the most recent prompt (undo).
    pub fn pop(&mut self) -> Option<Prompt> {
        self.prompts.pop()
    }

    /// All prompts in order.
    pub fn all(&self) -> &[Prompt] {
        &self.prompts
    }

    /// Prompts on one frame, in order.
    pub fn for_frame(&self, frame_index: FrameIndex) -> impl Iterator<Item = &Prompt> + '_ {
        self.prompts
            .iter()
            .filter(move |p| p.frame_index == frame_index)
    }

    /// Prompts targeting one object on one frame, in order.
    pub fn for_object(
        &self,
        object_id: ObjectId,
        frame_index: FrameIndex,
    ) -> impl Iterator<Item = &Prompt> + '_ {
        self.for_frame(frame_index)
            .filter(move |p| p.object_id == object_id)
    }

    /// Drop every prompt on a frame. Returns how many were removed.
    pub fn clear_frame(&mut self, frame_index: FrameIndex) -> usize {
        let before = self.prompts.len();
        self.prompts.retain(|p| p.frame_index != frame_index);
        before - self.prompts.len()
    }

    /// Drop every prompt of an object (e.g. after it was deleted).
    pub fn remove_object(&mut self, object_id: ObjectId) -> usize {
        let before = self.prompts.len();
        self.prompts.retain(|p| p.object_id != object_id);
        before - self.prompts.len()
    }

    pub fn clear(&mut self) {
        self.prompts.clear();
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}
