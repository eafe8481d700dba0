//! Anchor grid tiled over the score map.

use crate::error::TrackError;
use crate::tracker::config::TrackerConfig;

/// Reference box in search-crop coordinates, relative to the crop center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

/// Base anchor shapes, one per (ratio, scale) pair, ratio-major.
///
/// Each base anchor starts from a `stride x stride` area reshaped to the
/// ratio with integer truncation, then multiplied by the scale.
pub fn base_anchors(stride: u32, ratios: &[f32], scales: &[f32]) -> Vec<(f32, f32)> {
    let size = (stride * stride) as f32;
    let mut shapes = Vec::with_capacity(ratios.len() * scales.len());
    for &ratio in ratios {
        let ws = (size / ratio).sqrt().trunc();
        let hs = (ws * ratio).trunc();
        for &scale in scales {
            shapes.push((ws * scale, hs * scale));
        }
    }
    shapes
}

/// Tile the base anchors over a `score_size x score_size` grid.
///
/// Layout is `[variant][row][col]` flattened, the same order in which the
/// evaluator lays out its per-anchor output channels.
pub fn generate(score_size: usize, stride: u32, ratios: &[f32], scales: &[f32]) -> Vec<Anchor> {
    let shapes = base_anchors(stride, ratios, scales);
    let stride = stride as f32;
    let origin = -((score_size / 2) as f32) * stride;

    let mut anchors = Vec::with_capacity(shapes.len() * score_size * score_size);
    for &(w, h) in &shapes {
        for row in 0..score_size {
            for col in 0..score_size {
                anchors.push(Anchor {
                    cx: origin + stride * col as f32,
                    cy: origin + stride * row as f32,
                    w,
                    h,
                });
            }
        }
    }
    anchors
}

/// Fixed anchor set for one tracker instance.
#[derive(Debug, Clone)]
pub struct AnchorGrid {
    anchors: Vec<Anchor>,
    score_size: usize,
    anchor_num: usize,
}

impl AnchorGrid {
    pub fn new(config: &TrackerConfig) -> Result<Self, TrackError> {
        let score_size = config.score_size();
        let anchor_num = config.anchor_num();
        if score_size == 0 || anchor_num == 0 {
            return Err(TrackError::Configuration(format!(
                "empty anchor grid ({anchor_num} variants on a {score_size}x{score_size} grid)"
            )));
        }

        let anchors = generate(score_size, config.stride, &config.ratios, &config.scales);
        Ok(Self {
            anchors,
            score_size,
            anchor_num,
        })
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn score_size(&self) -> usize {
        self.score_size
    }

    pub fn anchor_num(&self) -> usize {
        self.anchor_num
    }

    /// Cells per anchor variant.
    pub fn cells(&self) -> usize {
        self.score_size * self.score_size
    }
}
