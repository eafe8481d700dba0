use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in image coordinates.
///
/// Stored as top-left corner plus size (TLWH). Tracking itself works on
/// center/size pairs; use [`Rect::from_center`] and [`Rect::center`] to move
/// between the two.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Top-left x coordinate
    pub x: f32,
    /// Top-left y coordinate
    pub y: f32,
    /// Width of the bounding box
    pub width: f32,
    /// Height of the bounding box
    pub height: f32,
}

impl Rect {
    /// Create a new Rect from top-left coordinates and dimensions (TLWH format).
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a Rect from its center point and dimensions.
    #[inline]
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            x: cx - width / 2.0,
            y: cy - height / 2.0,
            width,
            height,
        }
    }

    /// Convert to TLWH format: (x, y, width, height).
    #[inline]
    pub fn to_tlwh(&self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    /// Get the center point of the bounding box.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Intersection over Union with another box. Zero when the union is empty.
    pub fn iou(&self, other: &Rect) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter_area = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }
}

/// Smallest side a tracked box may shrink to.
pub const MIN_BOX_SIDE: f32 = 10.0;

/// Clip a center-format box to an image of `(height, width)`.
///
/// The center is kept inside the image and each side is limited to
/// `[MIN_BOX_SIDE, image side]`; the floor wins on images smaller than it.
pub fn clip_center_box(
    cx: f32,
    cy: f32,
    width: f32,
    height: f32,
    boundary: (usize, usize),
) -> (f32, f32, f32, f32) {
    let (img_h, img_w) = (boundary.0 as f32, boundary.1 as f32);
    (
        cx.min(img_w).max(0.0),
        cy.min(img_h).max(0.0),
        width.min(img_w).max(MIN_BOX_SIDE),
        height.min(img_h).max(MIN_BOX_SIDE),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_center() {
        let rect = Rect::from_center(25.0, 40.0, 30.0, 40.0);
        assert_eq!(rect.to_tlwh(), [10.0, 20.0, 30.0, 40.0]);
        assert_eq!(rect.center(), (25.0, 40.0));
    }

    #[test]
    fn test_iou() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);

        // Intersection: 5x5 = 25
        // Union: 100 + 100 - 25 = 175
        let iou = a.iou(&b);
        assert!((iou - 25.0 / 175.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 20.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_zero_size() {
        let a = Rect::new(5.0, 5.0, 0.0, 0.0);
        assert_eq!(a.iou(&a), 0.0);
    }

    #[test]
    fn test_clip_center_box() {
        let (cx, cy, w, h) = clip_center_box(-5.0, 130.0, 2.0, 500.0, (100, 120));
        assert_eq!((cx, cy), (0.0, 100.0));
        assert_eq!(w, MIN_BOX_SIDE);
        assert_eq!(h, 100.0);
    }

    #[test]
    fn test_clip_keeps_floor_on_tiny_image() {
        let (_, _, w, h) = clip_center_box(2.0, 2.0, 3.0, 3.0, (4, 4));
        assert_eq!((w, h), (MIN_BOX_SIDE, MIN_BOX_SIDE));
    }
}
