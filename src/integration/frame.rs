//! Video frames and sub-window extraction.

use nalgebra::Vector2;
use ndarray::{Array3, Axis};

use crate::error::TrackError;

/// A video frame the tracker can crop template and search regions from.
pub trait Frame {
    /// Crop type handed to the evaluator and classifier.
    type Crop: Clone;

    /// `(height, width)` in pixels.
    fn dims(&self) -> (usize, usize);

    /// Per-channel mean color, used as crop padding.
    fn channel_average(&self) -> [f32; 3];

    /// Extract the square region of side `original_size` centered on
    /// `center`, resampled to `model_size x model_size`. Pixels outside the
    /// image take the `fill` color.
    fn subwindow(
        &self,
        center: Vector2<f32>,
        model_size: u32,
        original_size: f32,
        fill: [f32; 3],
    ) -> Self::Crop;
}

/// HWC 8-bit three-channel frame producing CHW `f32` crops.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    image: Array3<u8>,
}

impl ImageFrame {
    pub fn new(image: Array3<u8>) -> Result<Self, TrackError> {
        let (h, w, c) = image.dim();
        if c != 3 || h == 0 || w == 0 {
            return Err(TrackError::ShapeMismatch {
                what: "frame",
                expected: vec![h.max(1), w.max(1), 3],
                got: vec![h, w, c],
            });
        }
        Ok(Self { image })
    }

    #[inline]
    fn pixel(&self, y: i64, x: i64, ch: usize, fill: &[f32; 3]) -> f32 {
        let (h, w, _) = self.image.dim();
        if y < 0 || x < 0 || y >= h as i64 || x >= w as i64 {
            fill[ch]
        } else {
            self.image[[y as usize, x as usize, ch]] as f32
        }
    }
}

impl Frame for ImageFrame {
    type Crop = Array3<f32>;

    fn dims(&self) -> (usize, usize) {
        let (h, w, _) = self.image.dim();
        (h, w)
    }

    fn channel_average(&self) -> [f32; 3] {
        let (h, w, _) = self.image.dim();
        let count = (h * w) as f64;
        let mut avg = [0.0f32; 3];
        for (ch, plane) in self.image.axis_iter(Axis(2)).enumerate() {
            let sum: f64 = plane.iter().map(|&v| v as f64).sum();
            avg[ch] = (sum / count) as f32;
        }
        avg
    }

    fn subwindow(
        &self,
        center: Vector2<f32>,
        model_size: u32,
        original_size: f32,
        fill: [f32; 3],
    ) -> Array3<f32> {
        let sz = original_size.round().max(1.0);
        let c = (sz + 1.0) / 2.0;
        let xmin = (center.x - c + 0.5).floor();
        let ymin = (center.y - c + 0.5).floor();

        let model = model_size.max(1) as usize;
        let scale = sz / model as f32;
        let source = |i: usize| ((i as f32 + 0.5) * scale - 0.5).clamp(0.0, sz - 1.0);

        Array3::from_shape_fn((3, model, model), |(ch, i, j)| {
            let sy = ymin + source(i);
            let sx = xmin + source(j);
            let (y0, x0) = (sy.floor(), sx.floor());
            let (fy, fx) = (sy - y0, sx - x0);
            let (y0, x0) = (y0 as i64, x0 as i64);

            let top = self.pixel(y0, x0, ch, &fill) * (1.0 - fx)
                + self.pixel(y0, x0 + 1, ch, &fill) * fx;
            let bottom = self.pixel(y0 + 1, x0, ch, &fill) * (1.0 - fx)
                + self.pixel(y0 + 1, x0 + 1, ch, &fill) * fx;
            top * (1.0 - fy) + bottom * fy
        })
    }
}
