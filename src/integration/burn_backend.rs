//! Burn inference backend for the Siamese evaluator.
//!
//! This module provides a `BurnEvaluator` that implements `Evaluator`
//! for running SiamRPN style networks built with the Burn framework.
//!
//! # Example
//!
//! ```ignore
//! use siamrpn_tracker::integration::{BurnEvaluator, FusionMode, SiameseModel};
//! use burn::backend::NdArray;
//!
//! // Implement SiameseModel for your network
//! struct MySiamRpn { /* ... */ }
//!
//! impl SiameseModel<NdArray> for MySiamRpn {
//!     // template / search / head
//! }
//!
//! let model = MySiamRpn::load("model.bin");
//! let evaluator = BurnEvaluator::new(model, Default::default(), FusionMode::Average);
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use ndarray::Array3;
use thiserror::Error;

use super::{Evaluator, EvaluatorOutput, FusionMode, HeadOutput};
use crate::error::TrackError;

/// Error type for Burn evaluation failures.
#[derive(Debug, Clone, Error)]
pub enum BurnEvaluatorError {
    #[error("evaluate() called before a template was encoded")]
    TemplateNotEncoded,
    #[error("expected a batch of one, got tensor of shape {0:?}")]
    InvalidBatch(Vec<usize>),
    #[error("tensor data error: {0}")]
    Data(String),
    #[error(transparent)]
    Fusion(#[from] TrackError),
}

/// Trait for Burn-based Siamese networks.
///
/// Implement this trait for your specific model architecture.
pub trait SiameseModel<B: Backend> {
    /// Encode a template crop of shape [1, 3, exemplar, exemplar].
    fn template(&self, z: Tensor<B, 4>) -> Tensor<B, 4>;

    /// Encode a search crop of shape [1, 3, instance, instance] into
    /// per-layer features.
    fn search(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>>;

    /// Run the RPN head, returning `(cls, loc)` of shapes
    /// [1, 2A, S, S] and [1, 4A, S, S].
    fn head(&self, zf: &Tensor<B, 4>, xf: &[Tensor<B, 4>]) -> (Tensor<B, 4>, Tensor<B, 4>);
}

/// Burn-based evaluator implementing `Evaluator` for CHW `f32` crops.
pub struct BurnEvaluator<B: Backend, M: SiameseModel<B>> {
    model: M,
    device: B::Device,
    fusion: FusionMode,
    template: Option<Tensor<B, 4>>,
    short_term: Option<Tensor<B, 4>>,
    features: Option<Array3<f32>>,
}

impl<B: Backend, M: SiameseModel<B>> BurnEvaluator<B, M> {
    pub fn new(model: M, device: B::Device, fusion: FusionMode) -> Self {
        Self {
            model,
            device,
            fusion,
            template: None,
            short_term: None,
            features: None,
        }
    }

    /// Search features of the last evaluated crop, fused for the
    /// appearance classifier.
    pub fn classifier_features(&self) -> Option<&Array3<f32>> {
        self.features.as_ref()
    }

    fn to_tensor(&self, crop: &Array3<f32>) -> Tensor<B, 4> {
        let (c, h, w) = crop.dim();
        let data: Vec<f32> = crop.iter().copied().collect();
        Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape([1, c, h, w])
    }
}

/// Drop the batch axis of a [1, C, H, W] tensor.
fn to_array<B: Backend>(tensor: Tensor<B, 4>) -> Result<Array3<f32>, BurnEvaluatorError> {
    let [n, c, h, w] = tensor.dims();
    if n != 1 {
        return Err(BurnEvaluatorError::InvalidBatch(vec![n, c, h, w]));
    }
    let data = tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| BurnEvaluatorError::Data(format!("{e:?}")))?;
    Array3::from_shape_vec((c, h, w), data).map_err(|e| BurnEvaluatorError::Data(e.to_string()))
}

impl<B: Backend, M: SiameseModel<B>> Evaluator for BurnEvaluator<B, M> {
    type Crop = Array3<f32>;
    type Error = BurnEvaluatorError;

    fn encode_template(&mut self, crop: &Array3<f32>) -> Result<(), Self::Error> {
        let z = self.to_tensor(crop);
        self.template = Some(self.model.template(z));
        Ok(())
    }

    fn encode_short_term_template(&mut self, crop: &Array3<f32>) -> Result<(), Self::Error> {
        let z = self.to_tensor(crop);
        self.short_term = Some(self.model.template(z));
        Ok(())
    }

    fn evaluate(&mut self, search: &Array3<f32>) -> Result<EvaluatorOutput, Self::Error> {
        let zf = self
            .template
            .as_ref()
            .ok_or(BurnEvaluatorError::TemplateNotEncoded)?;

        let xf = self.model.search(self.to_tensor(search));
        let layers = xf
            .iter()
            .cloned()
            .map(to_array)
            .collect::<Result<Vec<_>, _>>()?;
        self.features = Some(self.fusion.fuse(&layers)?);

        let (cls, loc) = self.model.head(zf, &xf);
        let long_term = HeadOutput {
            cls: to_array(cls)?,
            loc: to_array(loc)?,
        };

        let short_term = match self.short_term.as_ref() {
            Some(zf_st) => {
                let (cls, loc) = self.model.head(zf_st, &xf);
                Some(HeadOutput {
                    cls: to_array(cls)?,
                    loc: to_array(loc)?,
                })
            }
            None => None,
        };

        Ok(EvaluatorOutput {
            long_term,
            short_term,
        })
    }
}
