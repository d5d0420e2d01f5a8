//! Segmentation object registry.
//!
//! Objects are kept in creation order, which is also the order masks are
//! composited in. Hiding an object removes it from compositing without
//! touching its masks or prompts.

use serde::{Deserialize, Serialize};

/// Identifier of a tracked object.
pub type ObjectId = u32;

/// A tracked object with its class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentObject {
    pub id: ObjectId,
    /// Display name
    pub name: String,
    /// Class identifier (model label space)
    pub class_id: u32,
    /// Class name, used to pick the tint color
    pub class_name: String,
    /// Whether masks for this object are drawn
    pub visible: bool,
}

/// Ordered list of objects plus the current selection.
#[derive(Debug, Clone, Default)]
pub struct ObjectRegistry {
    objects: Vec<SegmentObject>,
    selected: Option<ObjectId>,
    next_id: ObjectId,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object and select it. Ids are sequential and never reused.
    pub fn create(&mut self, name: &str, class_id: u32, class_name: &str) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.push(SegmentObject {
            id,
            name: name.to_string(),
            class_id,
            class_name: class_name.to_string(),
            visible: true,
        });
        self.selected = Some(id);
        log::debug!("Created object {} '{}' ({})", id, name, class_name);
        id
    }

    /// Remove an object. Clears the selection if it pointed at it.
    pub fn delete(&mut self, id: ObjectId) -> Option<SegmentObject> {
        let position = self.objects.iter().position(|o| o.id == id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(self.objects.remove(position))
    }

    /// Flip visibility. Returns the new visibility, or `None` for unknown ids.
    pub fn toggle_visibility(&mut self, id: ObjectId) -> Option<bool> {
        let object = self.objects.iter_mut().find(|o| o.id == id)?;
        object.visible = !object.visible;
        Some(object.visible)
    }

    /// Select an object (or clear the selection with `None`).
    pub fn select(&mut self, id: Option<ObjectId>) -> bool {
        match id {
            Some(id) if !self.objects.iter().any(|o| o.id == id) => false,
            _ => {
                self.selected = id;
                true
            }
        }
    }

    pub fn selected(&self) -> Option<ObjectId> {
        self.selected
    }

    pub fn get(&self, id: ObjectId) -> Option<&SegmentObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    /// All objects in creation order.
    pub fn objects(&self) -> &[SegmentObject] {
        &self.objects
    }

    /// Visible objects in creation order.
    pub fn visible(&self) -> impl Iterator<Item = &SegmentObject> + '_ {
        self.objects.iter().filter(|o| o.visible)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
