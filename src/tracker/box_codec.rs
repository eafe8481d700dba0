//! Decoding of raw evaluator head outputs into candidate boxes and scores.

use ndarray::{Array1, Array2, Array3, Axis};

use crate::error::TrackError;
use crate::tracker::anchor::AnchorGrid;

fn check_shape(
    what: &'static str,
    tensor: &Array3<f32>,
    channels: usize,
    grid: &AnchorGrid,
) -> Result<(), TrackError> {
    let expected = [channels * grid.anchor_num(), grid.score_size(), grid.score_size()];
    if tensor.shape() != expected {
        return Err(TrackError::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            got: tensor.shape().to_vec(),
        });
    }
    Ok(())
}

/// Decode regression deltas `(4A, S, S)` into boxes `(4, N)` in crop space.
///
/// Rows are `cx, cy, w, h`; columns follow the anchor order.
pub fn decode_boxes(loc: &Array3<f32>, grid: &AnchorGrid) -> Result<Array2<f32>, TrackError> {
    check_shape("regression output", loc, 4, grid)?;
    let deltas = loc
        .to_shape((4, grid.len()))
        .map_err(|e| TrackError::Evaluator(e.to_string()))?;

    let mut boxes = Array2::zeros((4, grid.len()));
    for (i, anchor) in grid.anchors().iter().enumerate() {
        boxes[[0, i]] = deltas[[0, i]] * anchor.w + anchor.cx;
        boxes[[1, i]] = deltas[[1, i]] * anchor.h + anchor.cy;
        boxes[[2, i]] = deltas[[2, i]].exp() * anchor.w;
        boxes[[3, i]] = deltas[[3, i]].exp() * anchor.h;
    }
    Ok(boxes)
}

/// Decode classification logits `(2A, S, S)` into foreground probabilities.
pub fn decode_scores(cls: &Array3<f32>, grid: &AnchorGrid) -> Result<Array1<f32>, TrackError> {
    check_shape("classification output", cls, 2, grid)?;
    let logits = cls
        .to_shape((2, grid.len()))
        .map_err(|e| TrackError::Evaluator(e.to_string()))?;

    let background = logits.index_axis(Axis(0), 0);
    let foreground = logits.index_axis(Axis(0), 1);
    Ok(ndarray::Zip::from(&background)
        .and(&foreground)
        .map_collect(|&bg, &fg| foreground_probability(bg, fg)))
}

/// Two-class softmax, foreground entry.
#[inline]
pub fn foreground_probability(bg: f32, fg: f32) -> f32 {
    let max = bg.max(fg);
    let e_bg = (bg - max).exp();
    let e_fg = (fg - max).exp();
    e_fg / (e_bg + e_fg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::config::TrackerConfig;

    fn small_grid() -> AnchorGrid {
        let config = TrackerConfig {
            ratios: vec![0.5, 1.0],
            scales: vec![8.0],
            exemplar_size: 127,
            instance_size: 143,
            base_size: 0,
            ..TrackerConfig::default()
        };
        AnchorGrid::new(&config).unwrap()
    }

    #[test]
    fn test_decode_recovers_encoded_box() {
        let grid = small_grid();
        let n = grid.len();
        let idx = n - 2;
        let anchor = grid.anchors()[idx];

        let target = [3.5_f32, -7.25, 51.0, 77.0];
        let mut loc = Array3::<f32>::zeros((4 * grid.anchor_num(), grid.score_size(), grid.score_size()));
        {
            let mut flat = loc.view_mut().into_shape_with_order((4, n)).unwrap();
            flat[[0, idx]] = (target[0] - anchor.cx) / anchor.w;
            flat[[1, idx]] = (target[1] - anchor.cy) / anchor.h;
            flat[[2, idx]] = (target[2] / anchor.w).ln();
            flat[[3, idx]] = (target[3] / anchor.h).ln();
        }

        let boxes = decode_boxes(&loc, &grid).unwrap();
        for k in 0..4 {
            assert!((boxes[[k, idx]] - target[k]).abs() < 1e-3);
        }
    }

    #[test]
    fn test_zero_delta_returns_anchor() {
        let grid = small_grid();
        let loc = Array3::zeros((4 * grid.anchor_num(), grid.score_size(), grid.score_size()));
        let boxes = decode_boxes(&loc, &grid).unwrap();
        let anchor = grid.anchors()[4];
        assert_eq!(
            [boxes[[0, 4]], boxes[[1, 4]], boxes[[2, 4]], boxes[[3, 4]]],
            [anchor.cx, anchor.cy, anchor.w, anchor.h]
        );
    }

    #[test]
    fn test_scores_bounded_and_monotonic() {
        for bg in [-50.0_f32, -1.0, 0.0, 3.0, 80.0] {
            let mut last = 0.0;
            for fg in [-100.0_f32, -5.0, -0.5, 0.0, 0.5, 5.0, 100.0] {
                let p = foreground_probability(bg, fg);
                assert!((0.0..=1.0).contains(&p));
                assert!(p >= last);
                last = p;
            }
        }
    }

    #[test]
    fn test_scores_read_foreground_channels() {
        let grid = small_grid();
        let (a, s) = (grid.anchor_num(), grid.score_size());
        let mut cls = Array3::<f32>::zeros((2 * a, s, s));
        // channel a + 1 is the foreground logit of the second variant
        cls[[a + 1, 0, 0]] = 10.0;
        let scores = decode_scores(&cls, &grid).unwrap();
        assert_eq!(scores.len(), grid.len());
        assert!(scores[grid.cells()] > 0.99);
        assert!((scores[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_shape_mismatch() {
        let grid = small_grid();
        let cls = Array3::<f32>::zeros((3, grid.score_size(), grid.score_size()));
        let err = decode_scores(&cls, &grid).unwrap_err();
        assert!(matches!(err, TrackError::ShapeMismatch { .. }));
    }
}
