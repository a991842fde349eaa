//! Drag handling for field markers
//!
//! The host owns the actual gesture recognition and marker elements. The
//! controller keeps track of which fields are bound in the current render
//! cycle and turns move deltas into position store updates.

use std::collections::HashSet;

use pop_pdf::FieldPosition;

use crate::store::{FieldId, PositionStore};

/// Gesture service and marker view provided by the host application
pub trait OverlayHost {
    /// Make the marker matching `selector` draggable. Calling this again for
    /// the same selector replaces the previous binding.
    fn bind_draggable(&mut self, field_id: &str, selector: &str);

    /// Apply a CSS transform to the field's marker
    fn set_transform(&mut self, field_id: &str, transform: &str);
}

/// Gesture phases delivered by the host
#[derive(Debug, Clone, PartialEq)]
pub enum DragEvent {
    Start { field_id: FieldId },
    Move { field_id: FieldId, dx: f64, dy: f64 },
    End { field_id: FieldId },
}

impl DragEvent {
    pub fn field_id(&self) -> &str {
        match self {
            DragEvent::Start { field_id }
            | DragEvent::Move { field_id, .. }
            | DragEvent::End { field_id } => field_id,
        }
    }
}

/// Class selector for a field's marker
pub fn marker_selector(field_id: &str) -> String {
    format!(".{}", field_id)
}

/// CSS transform placing a marker at `pos`
pub fn translate_css(pos: FieldPosition) -> String {
    format!("translate({}px, {}px)", pos.x, pos.y)
}

#[derive(Debug, Default)]
pub struct DragController {
    bound: HashSet<FieldId>,
    dragging: HashSet<FieldId>,
    cycle: u64,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every binding from the previous render cycle
    pub fn begin_cycle(&mut self) -> u64 {
        self.bound.clear();
        self.dragging.clear();
        self.cycle += 1;
        self.cycle
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Bind a field for this cycle. Returns false if it was already bound,
    /// in which case the host is not asked again.
    pub fn bind<H: OverlayHost + ?Sized>(&mut self, field_id: &str, host: &mut H) -> bool {
        if self.bound.contains(field_id) {
            return false;
        }
        host.bind_draggable(field_id, &marker_selector(field_id));
        self.bound.insert(field_id.to_string());
        true
    }

    pub fn is_bound(&self, field_id: &str) -> bool {
        self.bound.contains(field_id)
    }

    pub fn is_dragging(&self, field_id: &str) -> bool {
        self.dragging.contains(field_id)
    }

    /// Handle one gesture event. Returns true when a move changed the store.
    ///
    /// Events for fields not bound in the current cycle are ignored.
    pub fn handle<H: OverlayHost + ?Sized>(
        &mut self,
        event: &DragEvent,
        store: &mut PositionStore,
        host: &mut H,
    ) -> bool {
        let field_id = event.field_id();
        if !self.bound.contains(field_id) {
            tracing::debug!(field = field_id, "ignoring drag event for unbound field");
            return false;
        }

        match event {
            DragEvent::Start { .. } => {
                tracing::debug!(field = field_id, "drag start");
                self.dragging.insert(field_id.to_string());
                false
            }
            DragEvent::Move { dx, dy, .. } => match store.apply_delta(field_id, *dx, *dy) {
                Some(pos) => {
                    host.set_transform(field_id, &translate_css(pos));
                    true
                }
                None => false,
            },
            DragEvent::End { .. } => {
                self.dragging.remove(field_id);
                if let Some(pos) = store.get(field_id) {
                    tracing::debug!(field = field_id, x = pos.x, y = pos.y, "drag end");
                }
                false
            }
        }
    }
}
