//! Penalty scoring, classifier blending and cosine-window selection.

use ndarray::{Array1, Array2, Axis, Zip};

use crate::tracker::anchor::AnchorGrid;
use crate::tracker::config::TrackerConfig;

#[inline]
pub fn scale_change(r: f32) -> f32 {
    r.max(1.0 / r)
}

/// Aspect-invariant size measure.
#[inline]
pub fn size_penalty(w: f32, h: f32) -> f32 {
    let pad = (w + h) * 0.5;
    ((w + pad) * (h + pad)).sqrt()
}

/// Symmetric Hann window of length `n`.
pub fn hanning(n: usize) -> Array1<f32> {
    if n <= 1 {
        return Array1::ones(n);
    }
    let denom = (n - 1) as f32;
    Array1::from_iter(
        (0..n).map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / denom).cos()),
    )
}

/// Per-frame candidate set for one template.
#[derive(Debug, Clone)]
pub struct CandidateBatch {
    /// Decoded boxes `(4, N)` in crop space.
    pub boxes: Array2<f32>,
    /// Foreground probabilities.
    pub scores: Array1<f32>,
    pub penalty: Array1<f32>,
    /// Penalized, optionally classifier-blended scores.
    pub pscore: Array1<f32>,
}

/// Best anchor of a batch after window smoothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub index: usize,
    /// `cx, cy, w, h` in crop space.
    pub bbox: [f32; 4],
    pub score: f32,
    pub penalty: f32,
    /// Size smoothing rate `penalty * score * LR`.
    pub lr: f32,
}

#[derive(Debug, Clone)]
pub struct ScoreFusion {
    window: Array1<f32>,
    score_size: usize,
    anchor_num: usize,
    penalty_k: f32,
    window_influence: f32,
    lr: f32,
    coee_class: f32,
}

impl ScoreFusion {
    pub fn new(config: &TrackerConfig, grid: &AnchorGrid) -> Self {
        let hann = hanning(grid.score_size());
        let mut window = Array1::zeros(grid.len());
        let cells = grid.cells();
        for variant in 0..grid.anchor_num() {
            for row in 0..grid.score_size() {
                for col in 0..grid.score_size() {
                    window[variant * cells + row * grid.score_size() + col] = hann[row] * hann[col];
                }
            }
        }

        Self {
            window,
            score_size: grid.score_size(),
            anchor_num: grid.anchor_num(),
            penalty_k: config.penalty_k,
            window_influence: config.window_influence,
            lr: config.lr,
            coee_class: config.coee_class,
        }
    }

    /// Scale/aspect penalty against the prior size.
    ///
    /// `prior` is the target size in image space and `scale_z` maps it into
    /// crop space.
    pub fn penalize(
        &self,
        boxes: Array2<f32>,
        scores: Array1<f32>,
        prior: (f32, f32),
        scale_z: f32,
    ) -> CandidateBatch {
        let prior_sz = size_penalty(prior.0 * scale_z, prior.1 * scale_z);
        let prior_ratio = prior.0 / prior.1;
        let penalty_k = self.penalty_k;

        let widths = boxes.index_axis(Axis(0), 2);
        let heights = boxes.index_axis(Axis(0), 3);
        let penalty = Zip::from(&widths).and(&heights).map_collect(|&w, &h| {
            let s_c = scale_change(size_penalty(w, h) / prior_sz);
            let r_c = scale_change(prior_ratio / (w / h));
            (-(r_c * s_c - 1.0) * penalty_k).exp()
        });
        let pscore = &penalty * &scores;

        CandidateBatch {
            boxes,
            scores,
            penalty,
            pscore,
        }
    }

    /// Blend a normalized confidence map (`S * S` cells) into the batch,
    /// broadcast across anchor variants.
    pub fn fuse_confidence(&self, batch: &mut CandidateBatch, confidence: &Array1<f32>) {
        let cells = self.score_size * self.score_size;
        debug_assert_eq!(confidence.len(), cells);
        let coee = self.coee_class;
        for variant in 0..self.anchor_num {
            let start = variant * cells;
            let mut slice = batch.pscore.slice_mut(ndarray::s![start..start + cells]);
            Zip::from(&mut slice)
                .and(confidence)
                .for_each(|p, &c| *p = *p * (1.0 - coee) + c * coee);
        }
    }

    /// Apply the cosine window and pick the best anchor.
    pub fn select(&self, batch: &CandidateBatch) -> Candidate {
        let influence = self.window_influence;
        let smoothed = Zip::from(&batch.pscore)
            .and(&self.window)
            .map_collect(|&p, &w| p * (1.0 - influence) + w * influence);

        let index = argmax(&smoothed);
        let score = batch.scores[index];
        let penalty = batch.penalty[index];
        Candidate {
            index,
            bbox: [
                batch.boxes[[0, index]],
                batch.boxes[[1, index]],
                batch.boxes[[2, index]],
                batch.boxes[[3, index]],
            ],
            score,
            penalty,
            lr: penalty * score * self.lr,
        }
    }
}

/// First index of the maximum; NaN entries never win.
fn argmax(values: &Array1<f32>) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

/// Resize a classifier confidence map to `size x size` and min-max
/// normalize it into `[0, 1]`, flattened row-major.
///
/// Resampling is bilinear with half-pixel centers, not the bicubic filter
/// PIL's `Image.resize` defaults to, so values between source cells differ
/// slightly from a Python pipeline. A flat map normalizes to all zeros.
pub fn normalize_confidence(map: &Array2<f32>, size: usize) -> Array1<f32> {
    let resized = resize_bilinear(map, size);
    let min = resized.fold(f32::INFINITY, |m, &v| m.min(v));
    let max = resized.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    let range = max - min;
    if range.is_nan() || range <= f32::EPSILON {
        return Array1::zeros(size * size);
    }
    resized.iter().map(|&v| (v - min) / range).collect()
}

fn resize_bilinear(map: &Array2<f32>, size: usize) -> Array2<f32> {
    let (src_h, src_w) = map.dim();
    if src_h == 0 || src_w == 0 {
        return Array2::zeros((size, size));
    }
    if (src_h, src_w) == (size, size) {
        return map.clone();
    }

    let scale_y = src_h as f32 / size as f32;
    let scale_x = src_w as f32 / size as f32;
    Array2::from_shape_fn((size, size), |(row, col)| {
        let sy = ((row as f32 + 0.5) * scale_y - 0.5).clamp(0.0, (src_h - 1) as f32);
        let sx = ((col as f32 + 0.5) * scale_x - 0.5).clamp(0.0, (src_w - 1) as f32);
        let (y0, x0) = (sy.floor() as usize, sx.floor() as usize);
        let (y1, x1) = ((y0 + 1).min(src_h - 1), (x0 + 1).min(src_w - 1));
        let (fy, fx) = (sy - y0 as f32, sx - x0 as f32);

        let top = map[[y0, x0]] * (1.0 - fx) + map[[y0, x1]] * fx;
        let bottom = map[[y1, x0]] * (1.0 - fx) + map[[y1, x1]] * fx;
        top * (1.0 - fy) + bottom * fy
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fusion() -> (ScoreFusion, AnchorGrid) {
        let config = TrackerConfig {
            ratios: vec![1.0],
            scales: vec![8.0],
            instance_size: 159,
            base_size: 0,
            ..TrackerConfig::default()
        };
        let grid = AnchorGrid::new(&config).unwrap();
        (ScoreFusion::new(&config, &grid), grid)
    }

    fn single_box(w: f32, h: f32) -> Array2<f32> {
        Array2::from_shape_vec((4, 1), vec![0.0, 0.0, w, h]).unwrap()
    }

    #[test]
    fn test_hanning_matches_numpy() {
        let w = hanning(5);
        let expected = [0.0, 0.5, 1.0, 0.5, 0.0];
        for (a, b) in w.iter().zip(expected) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_penalty_is_one_on_matching_prior() {
        let (fusion, _) = fusion();
        let batch = fusion.penalize(single_box(40.0, 20.0), Array1::from_elem(1, 0.7), (80.0, 40.0), 0.5);
        assert!((batch.penalty[0] - 1.0).abs() < 1e-6);
        assert!((batch.pscore[0] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_penalty_decreases_with_divergence() {
        let (fusion, _) = fusion();
        let mut last = 1.0 + 1e-6;
        for k in [1.0_f32, 1.2, 1.5, 2.0, 3.0] {
            let batch = fusion.penalize(single_box(30.0 * k, 30.0), Array1::ones(1), (30.0, 30.0), 1.0);
            assert!(batch.penalty[0] < last);
            last = batch.penalty[0];
        }

        let mut last = 1.0 + 1e-6;
        for k in [1.0_f32, 1.3, 2.0, 4.0] {
            let batch = fusion.penalize(single_box(30.0 * k, 30.0 * k), Array1::ones(1), (30.0, 30.0), 1.0);
            assert!(batch.penalty[0] < last);
            last = batch.penalty[0];
        }
    }

    #[test]
    fn test_window_favors_center() {
        let (fusion, grid) = fusion();
        let n = grid.len();
        let batch = CandidateBatch {
            boxes: Array2::ones((4, n)),
            scores: Array1::from_elem(n, 0.5),
            penalty: Array1::ones(n),
            pscore: Array1::from_elem(n, 0.5),
        };
        let best = fusion.select(&batch);
        assert_eq!(best.index, n / 2);
        assert!((best.lr - 0.5 * 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_fuse_confidence_broadcasts() {
        let config = TrackerConfig {
            ratios: vec![0.5, 2.0],
            scales: vec![8.0],
            instance_size: 143,
            base_size: 0,
            coee_class: 0.5,
            ..TrackerConfig::default()
        };
        let grid = AnchorGrid::new(&config).unwrap();
        let fusion = ScoreFusion::new(&config, &grid);
        let n = grid.len();
        let mut batch = CandidateBatch {
            boxes: Array2::ones((4, n)),
            scores: Array1::zeros(n),
            penalty: Array1::ones(n),
            pscore: Array1::zeros(n),
        };
        let mut confidence = Array1::zeros(grid.cells());
        confidence[3] = 1.0;
        fusion.fuse_confidence(&mut batch, &confidence);

        assert_eq!(batch.pscore[3], 0.5);
        assert_eq!(batch.pscore[grid.cells() + 3], 0.5);
        assert_eq!(batch.pscore[4], 0.0);
    }

    #[test]
    fn test_normalize_confidence() {
        let map = Array2::from_shape_vec((2, 2), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let norm = normalize_confidence(&map, 4);
        assert_eq!(norm.len(), 16);
        assert!((norm[0] - 0.0).abs() < 1e-6);
        assert!((norm[15] - 1.0).abs() < 1e-6);
        assert!(norm.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_normalize_flat_map_is_zero() {
        let map = Array2::from_elem((3, 3), 0.4);
        let norm = normalize_confidence(&map, 5);
        assert!(norm.iter().all(|&v| v == 0.0));
    }
}
