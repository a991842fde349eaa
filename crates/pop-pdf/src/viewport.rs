//! Viewport descriptors for rendered pages
//!
//! A viewport records how a page was rasterized: the pixel size of the
//! rendering surface, the page box in PDF user space, and the scale and
//! rotation that produced it.

use serde::{Deserialize, Serialize};

/// Page rotation, clockwise, in quarter turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Parse a rotation in degrees. Negative and >= 360 values are normalized.
    /// Returns `None` when the angle is not a multiple of 90.
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> i64 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Combine two rotations (e.g. a requested rotation and the page /Rotate entry)
    pub fn compose(self, other: Rotation) -> Rotation {
        Rotation::from_degrees(self.degrees() + other.degrees()).unwrap_or_default()
    }

    /// Whether the rendered width and height are swapped relative to the page box
    pub fn is_quarter_turn(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// How a page was rendered
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportDescriptor {
    /// Rendered width in pixels (after rotation)
    pub pixel_width: f64,
    /// Rendered height in pixels (after rotation)
    pub pixel_height: f64,
    /// Page box in PDF user space as [x0, y0, width, height]
    pub document_box: [f64; 4],
    pub scale: f64,
    pub rotation: Rotation,
}

impl ViewportDescriptor {
    /// Build the viewport for a page box rendered at `scale` and `rotation`
    pub fn new(document_box: [f64; 4], scale: f64, rotation: Rotation) -> Self {
        let width = document_box[2].abs() * scale;
        let height = document_box[3].abs() * scale;
        let (pixel_width, pixel_height) = if rotation.is_quarter_turn() {
            (height, width)
        } else {
            (width, height)
        };

        Self {
            pixel_width,
            pixel_height,
            document_box,
            scale,
            rotation,
        }
    }

    /// A degenerate viewport cannot map between the two spaces
    pub fn is_degenerate(&self) -> bool {
        let [_, _, width, height] = self.document_box;
        width == 0.0
            || height == 0.0
            || !width.is_finite()
            || !height.is_finite()
            || self.pixel_width <= 0.0
            || self.pixel_height <= 0.0
    }

    /// Integer surface size for this viewport, truncated like a canvas assignment
    pub fn surface_size(&self) -> (u32, u32) {
        (
            self.pixel_width.max(0.0).floor() as u32,
            self.pixel_height.max(0.0).floor() as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_normalizes_degrees() {
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(45), None);
    }

    #[test]
    fn test_rotation_compose_wraps() {
        assert_eq!(Rotation::Deg270.compose(Rotation::Deg180), Rotation::Deg90);
        assert_eq!(Rotation::Deg0.compose(Rotation::Deg0), Rotation::Deg0);
    }

    #[test]
    fn test_viewport_scales_letter_page() {
        let vp = ViewportDescriptor::new([0.0, 0.0, 612.0, 792.0], 1.5, Rotation::Deg0);
        assert_eq!(vp.pixel_width, 918.0);
        assert_eq!(vp.pixel_height, 1188.0);
        assert_eq!(vp.surface_size(), (918, 1188));
    }

    #[test]
    fn test_quarter_turn_swaps_dimensions() {
        let vp = ViewportDescriptor::new([0.0, 0.0, 300.0, 400.0], 2.0, Rotation::Deg90);
        assert_eq!(vp.pixel_width, 800.0);
        assert_eq!(vp.pixel_height, 600.0);
    }

    #[test]
    fn test_zero_box_is_degenerate() {
        let vp = ViewportDescriptor::new([0.0, 0.0, 0.0, 400.0], 1.0, Rotation::Deg0);
        assert!(vp.is_degenerate());
        let vp = ViewportDescriptor::new([0.0, 0.0, 300.0, 400.0], 1.0, Rotation::Deg0);
        assert!(!vp.is_degenerate());
    }
}
