//! Folding multi-layer search features into the single map handed to the
//! appearance classifier.

use ndarray::{Array3, Axis, concatenate};

use crate::error::TrackError;

/// How per-layer search features are combined.
#[derive(Debug, Clone, PartialEq)]
pub enum FusionMode {
    Average,
    /// One weight per layer.
    WeightedAverage(Vec<f32>),
    /// Stack layers along the channel axis.
    Concatenate,
    /// Use a single layer, 1-based.
    SelectLayer(usize),
}

impl FusionMode {
    /// Check the mode against the number of layers the backbone produces.
    pub fn validate(&self, layers: usize) -> Result<(), TrackError> {
        match self {
            Self::WeightedAverage(weights) if weights.len() != layers => {
                Err(TrackError::Configuration(format!(
                    "{} fusion weights for {} feature layers",
                    weights.len(),
                    layers
                )))
            }
            Self::SelectLayer(index) if *index == 0 || *index > layers => {
                Err(TrackError::Configuration(format!(
                    "feature layer {index} out of range 1..={layers}"
                )))
            }
            _ if layers == 0 => Err(TrackError::Configuration(
                "no feature layers to fuse".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Combine `(C, H, W)` feature maps into one.
    pub fn fuse(&self, layers: &[Array3<f32>]) -> Result<Array3<f32>, TrackError> {
        self.validate(layers.len())?;
        let first = &layers[0];

        match self {
            Self::SelectLayer(index) => Ok(layers[index - 1].clone()),
            Self::Concatenate => {
                let views: Vec<_> = layers.iter().map(|l| l.view()).collect();
                concatenate(Axis(0), &views).map_err(|_| TrackError::ShapeMismatch {
                    what: "concatenated feature layers",
                    expected: first.shape()[1..].to_vec(),
                    got: layers
                        .iter()
                        .find(|l| l.shape()[1..] != first.shape()[1..])
                        .map(|l| l.shape()[1..].to_vec())
                        .unwrap_or_default(),
                })
            }
            Self::Average => {
                let weight = 1.0 / layers.len() as f32;
                weighted_sum(layers, std::iter::repeat(weight))
            }
            Self::WeightedAverage(weights) => weighted_sum(layers, weights.iter().copied()),
        }
    }
}

fn weighted_sum(
    layers: &[Array3<f32>],
    weights: impl Iterator<Item = f32>,
) -> Result<Array3<f32>, TrackError> {
    let mut acc = Array3::<f32>::zeros(layers[0].raw_dim());
    for (layer, weight) in layers.iter().zip(weights) {
        if layer.shape() != acc.shape() {
            return Err(TrackError::ShapeMismatch {
                what: "fused feature layer",
                expected: acc.shape().to_vec(),
                got: layer.shape().to_vec(),
            });
        }
        acc.scaled_add(weight, layer);
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layers() -> Vec<Array3<f32>> {
        vec![
            Array3::from_elem((2, 3, 3), 1.0),
            Array3::from_elem((2, 3, 3), 3.0),
        ]
    }

    #[test]
    fn test_average() {
        let fused = FusionMode::Average.fuse(&layers()).unwrap();
        assert!(fused.iter().all(|&v| (v - 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_weighted_average() {
        let fused = FusionMode::WeightedAverage(vec![0.25, 0.75]).fuse(&layers()).unwrap();
        assert!(fused.iter().all(|&v| (v - 2.5).abs() < 1e-6));
    }

    #[test]
    fn test_concatenate_and_select() {
        let fused = FusionMode::Concatenate.fuse(&layers()).unwrap();
        assert_eq!(fused.dim(), (4, 3, 3));
        assert_eq!(fused[[3, 0, 0]], 3.0);

        let picked = FusionMode::SelectLayer(2).fuse(&layers()).unwrap();
        assert_eq!(picked[[0, 0, 0]], 3.0);
    }

    #[test]
    fn test_invalid_modes() {
        assert!(FusionMode::SelectLayer(0).validate(2).is_err());
        assert!(FusionMode::SelectLayer(3).validate(2).is_err());
        assert!(FusionMode::WeightedAverage(vec![1.0]).validate(2).is_err());
        assert!(FusionMode::Average.fuse(&[]).is_err());
    }

    #[test]
    fn test_mismatched_layers() {
        let bad = vec![Array3::zeros((2, 3, 3)), Array3::zeros((2, 4, 4))];
        assert!(matches!(
            FusionMode::Average.fuse(&bad),
            Err(TrackError::ShapeMismatch { .. })
        ));
    }
}
