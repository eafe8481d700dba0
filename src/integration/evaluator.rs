//! Contract of the feature-extraction / RPN network.

use ndarray::Array3;

/// Raw RPN head output for one template.
///
/// `cls` is `(2A, S, S)` and `loc` is `(4A, S, S)`; channel `k * A + a`
/// holds class (or coordinate) `k` of anchor variant `a`.
#[derive(Debug, Clone)]
pub struct HeadOutput {
    pub cls: Array3<f32>,
    pub loc: Array3<f32>,
}

/// Result of evaluating one search crop against the encoded templates.
#[derive(Debug, Clone)]
pub struct EvaluatorOutput {
    pub long_term: HeadOutput,
    /// Present once a short-term template has been encoded.
    pub short_term: Option<HeadOutput>,
}

/// Trait for Siamese evaluation backends.
///
/// Implement this trait to drive the tracker with any network runtime.
///
/// # Example
///
/// ```ignore
/// use siamrpn_tracker::{Evaluator, EvaluatorOutput};
///
/// struct MyNetwork { /* weights, encoded templates */ }
///
/// impl Evaluator for MyNetwork {
///     type Crop = ndarray::Array3<f32>;
///     type Error = std::io::Error;
///
///     fn encode_template(&mut self, crop: &Self::Crop) -> Result<(), Self::Error> { Ok(()) }
///     fn encode_short_term_template(&mut self, crop: &Self::Crop) -> Result<(), Self::Error> { Ok(()) }
///     fn evaluate(&mut self, search: &Self::Crop) -> Result<EvaluatorOutput, Self::Error> {
///         todo!()
///     }
/// }
/// ```
pub trait Evaluator {
    /// Preprocessed image crop accepted by the network.
    type Crop: Clone;
    /// Error type for evaluation failures.
    type Error: std::fmt::Display;

    /// Encode the long-term template. Called once per session.
    fn encode_template(&mut self, crop: &Self::Crop) -> Result<(), Self::Error>;

    /// Encode a new short-term template, replacing only that slot.
    fn encode_short_term_template(&mut self, crop: &Self::Crop) -> Result<(), Self::Error>;

    /// Run the RPN head on a search crop against the encoded template(s).
    fn evaluate(&mut self, search: &Self::Crop) -> Result<EvaluatorOutput, Self::Error>;
}
