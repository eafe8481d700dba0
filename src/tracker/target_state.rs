//! Mutable per-session estimate of the tracked target.

use nalgebra::Vector2;

use crate::tracker::rect::Rect;

/// Position/size estimate plus the counters the decision loop carries
/// between frames.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetState {
    /// Box center in image coordinates.
    pub center: Vector2<f32>,
    /// Box width and height; both stay positive.
    pub size: Vector2<f32>,
    /// 1 on the init frame, incremented on every `track` call. Wraps on
    /// overflow; only its residue modulo the refresh interval matters.
    pub frame_num: u32,
    /// Consecutive frames the classifier reported `not_found`.
    pub lost_count: u32,
    /// Background fill used for out-of-image crop pixels.
    pub channel_average: [f32; 3],
}

impl TargetState {
    /// Build from an initial TLWH box. The center uses the pixel-inclusive
    /// convention `x + (w - 1) / 2`.
    pub fn from_init_box(bbox: &Rect, channel_average: [f32; 3]) -> Self {
        Self {
            center: Vector2::new(
                bbox.x + (bbox.width - 1.0) / 2.0,
                bbox.y + (bbox.height - 1.0) / 2.0,
            ),
            size: Vector2::new(bbox.width, bbox.height),
            frame_num: 1,
            lost_count: 0,
            channel_average,
        }
    }

    pub fn advance_frame(&mut self) {
        self.frame_num = self.frame_num.wrapping_add(1);
    }

    /// Count a `not_found` frame, or reset the streak on any other outcome.
    pub fn record_lost(&mut self, lost: bool) {
        self.lost_count = if lost {
            self.lost_count.saturating_add(1)
        } else {
            0
        };
    }

    /// Side of the square context region around the target,
    /// `sqrt((w + p) * (h + p))` with `p = context_amount * (w + h)`.
    pub fn context_size(&self, context_amount: f32) -> f32 {
        let pad = context_amount * self.size.sum();
        ((self.size.x + pad) * (self.size.y + pad)).sqrt()
    }

    pub fn bbox(&self) -> Rect {
        Rect::from_center(self.center.x, self.center.y, self.size.x, self.size.y)
    }
}
