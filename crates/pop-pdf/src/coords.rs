//! Coordinate transformation between rendered pixels and PDF user space
//!
//! Pixel space has its origin at the top-left of the rendered surface with y
//! growing downward. PDF user space has its origin at the bottom-left of the
//! page box with y growing upward and does not depend on the render scale.

use serde::{Deserialize, Serialize};

use crate::viewport::{Rotation, ViewportDescriptor};

/// Marker position on the rendered surface (pixels, top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldPosition {
    pub x: f64,
    pub y: f64,
}

impl FieldPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Position in PDF user space (points, bottom-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentPosition {
    pub x: f64,
    pub y: f64,
}

impl DocumentPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Unrotated pixel frame size for a viewport
fn unrotated_size(viewport: &ViewportDescriptor) -> (f64, f64) {
    if viewport.rotation.is_quarter_turn() {
        (viewport.pixel_height, viewport.pixel_width)
    } else {
        (viewport.pixel_width, viewport.pixel_height)
    }
}

/// Convert a pixel position (top-left origin) to PDF coordinates (bottom-left origin)
///
/// `baseline_offset` is subtracted from the resulting y so that text drawn at
/// the returned point has its baseline near the marker's top edge instead of
/// its bottom edge.
///
/// A degenerate viewport (empty page box or zero-sized surface) maps every
/// position to itself.
pub fn to_document_space(
    pos: FieldPosition,
    viewport: &ViewportDescriptor,
    baseline_offset: f64,
) -> DocumentPosition {
    if viewport.is_degenerate() {
        return DocumentPosition::new(pos.x, pos.y);
    }

    let [box_x, box_y, box_width, box_height] = viewport.document_box;
    let (pw, ph) = (viewport.pixel_width, viewport.pixel_height);
    let (frame_width, frame_height) = unrotated_size(viewport);

    // Undo the display rotation so (ux, vy) is in the unrotated pixel frame
    let (ux, vy) = match viewport.rotation {
        Rotation::Deg0 => (pos.x, pos.y),
        Rotation::Deg90 => (pos.y, pw - pos.x),
        Rotation::Deg180 => (pw - pos.x, ph - pos.y),
        Rotation::Deg270 => (ph - pos.y, pos.x),
    };

    let x = box_x + (ux * box_width / frame_width);
    let y = box_y + (box_height - (vy * box_height / frame_height)) - baseline_offset;

    DocumentPosition::new(x, y)
}

/// Convert PDF coordinates back to a pixel position on the rendered surface
pub fn to_pixel_space(
    pos: DocumentPosition,
    viewport: &ViewportDescriptor,
    baseline_offset: f64,
) -> FieldPosition {
    if viewport.is_degenerate() {
        return FieldPosition::new(pos.x, pos.y);
    }

    let [box_x, box_y, box_width, box_height] = viewport.document_box;
    let (pw, ph) = (viewport.pixel_width, viewport.pixel_height);
    let (frame_width, frame_height) = unrotated_size(viewport);

    let ux = (pos.x - box_x) * frame_width / box_width;
    let vy = (box_height - (pos.y + baseline_offset - box_y)) * frame_height / box_height;

    match viewport.rotation {
        Rotation::Deg0 => FieldPosition::new(ux, vy),
        Rotation::Deg90 => FieldPosition::new(pw - vy, ux),
        Rotation::Deg180 => FieldPosition::new(pw - ux, ph - vy),
        Rotation::Deg270 => FieldPosition::new(vy, ph - ux),
    }
}
